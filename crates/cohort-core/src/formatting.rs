/// Render `value` with `decimals` fraction digits and `,` between thousands.
///
/// ```
/// use cohort_core::formatting::format_number;
///
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let fixed = format!("{:.*}", decimals as usize, value.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

    let mut out = String::with_capacity(fixed.len() + whole.len() / 3 + 1);
    // No sign when the value rounds to zero.
    if value < 0.0 && fixed.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        out.push('-');
    }
    out.push_str(&group_thousands(whole));
    if !fraction.is_empty() {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

/// Format an aggregated cell for display; empty cells render as `"-"`.
///
/// Whole numbers (counts, integer sums) are printed without decimals.
///
/// # Examples
///
/// ```
/// use cohort_core::formatting::format_cell;
///
/// assert_eq!(format_cell(Some(2.0), 2), "2");
/// assert_eq!(format_cell(Some(1234.567), 2), "1,234.57");
/// assert_eq!(format_cell(None, 2), "-");
/// ```
pub fn format_cell(value: Option<f64>, decimals: u32) -> String {
    match value {
        None => "-".to_string(),
        Some(v) if !v.is_finite() => v.to_string(),
        Some(v) if v.fract() == 0.0 => format_number(v, 0),
        Some(v) => format_number(v, decimals),
    }
}

/// Insert `,` every three digits from the right of an unsigned digit string.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number_rounding() {
        assert_eq!(format_number(2.676, 2), "2.68");
        assert_eq!(format_number(999.999, 2), "1,000.00");
        assert_eq!(format_number(-0.001, 2), "0.00");
        assert_eq!(format_number(0.0, 2), "0.00");
        assert_eq!(format_number(1234.5, 1), "1,234.5");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("1"), "1");
        assert_eq!(group_thousands("1000"), "1,000");
        assert_eq!(group_thousands("123456789"), "123,456,789");
    }

    #[test]
    fn test_format_cell() {
        assert_eq!(format_cell(Some(3.0), 2), "3");
        assert_eq!(format_cell(Some(2.5), 2), "2.50");
        assert_eq!(format_cell(Some(-1500.0), 2), "-1,500");
        assert_eq!(format_cell(None, 1), "-");
    }
}
