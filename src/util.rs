// Parsing and formatting helpers.
//
// Report text is built from the format_* functions below so the currency,
// percentage and count conventions live in one place.
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a campaign date. Accepts plain ISO dates, ISO timestamps (the time
/// is dropped) and the two slash layouts found in spreadsheet exports.
pub fn parse_date_safe(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .map(|dt| dt.date())
        })
}

pub fn average(v: &[f64]) -> f64 {
    // Returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus `1,234,567.89`-style thousands separators.
    if !n.is_finite() {
        return n.to_string();
    }
    let neg = n.is_sign_negative();
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let mut res = group_thousands(int_part);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    } else if decimals > 0 {
        res.push('.');
        res.push_str(&"0".repeat(decimals));
    }
    if neg && s.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", res)
    } else {
        res
    }
}

/// Insert a comma every three digits, counting from the right.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `$1,234.56`; negative amounts keep the sign after the symbol (`$-50.00`).
pub fn format_currency(n: f64) -> String {
    format!("${}", format_number(n, 2))
}

pub fn format_percent(n: f64) -> String {
    format!("{:.2}%", n)
}

pub fn format_ratio(n: f64) -> String {
    format!("{:.2}", n)
}

/// Counts stored as floats (sums of impressions etc.), rounded to whole units.
pub fn format_count(n: f64) -> String {
    format_number(n, 0)
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// Axis label for money axes: `$12K`.
pub fn format_thousands_axis(n: f64) -> String {
    format!("${:.0}K", n / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(350.0), "$350.00");
        assert_eq!(format_currency(1234567.891), "$1,234,567.89");
        assert_eq!(format_currency(-50.0), "$-50.00");
        assert_eq!(format_currency(0.0), "$0.00");
    }

    #[test]
    fn test_format_count_and_percent() {
        assert_eq!(format_count(1234567.4), "1,234,567");
        assert_eq!(format_count(999.0), "999");
        assert_eq!(format_int(2500usize), "2,500");
        assert_eq!(format_percent(3.14159), "3.14%");
        assert_eq!(format_ratio(2.5), "2.50");
    }

    #[test]
    fn test_negative_zero_has_no_sign() {
        assert_eq!(format_number(-0.001, 2), "0.00");
        assert_eq!(format_number(-0.0, 0), "0");
    }

    #[test]
    fn test_format_number_beyond_i64() {
        assert_eq!(format_number(1e20, 0), "100,000,000,000,000,000,000");
        assert_eq!(format_number(-2.5e19, 2), "-25,000,000,000,000,000,000.00");
        assert_eq!(format_number(123.0, 0), "123");
        assert_eq!(format_number(f64::NAN, 2), "NaN");
        assert_eq!(format_number(f64::INFINITY, 2), "inf");
    }

    #[test]
    fn test_thousands_axis() {
        assert_eq!(format_thousands_axis(45_000.0), "$45K");
        assert_eq!(format_thousands_axis(-12_400.0), "$-12K");
    }

    #[test]
    fn test_parse_date_safe() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(parse_date_safe("2024-03-07"), Some(expected));
        assert_eq!(parse_date_safe(" 2024/03/07 "), Some(expected));
        assert_eq!(parse_date_safe("07/03/2024"), Some(expected));
        assert_eq!(parse_date_safe("2024-03-07 10:30:00"), Some(expected));
        assert_eq!(parse_date_safe("marzo"), None);
        assert_eq!(parse_date_safe(""), None);
    }

    #[test]
    fn test_average() {
        assert_eq!(average(&[]), 0.0);
        assert_eq!(average(&[1.0, 2.0, 3.0]), 2.0);
    }
}
