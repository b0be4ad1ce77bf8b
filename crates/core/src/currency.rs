//! Ringgit formatting shared by every display and export surface.
//!
//! Formatting is locale-fixed: `RM` symbol, comma grouping, exactly two
//! fraction digits. Parsing is lenient, the way form fields are read:
//! anything it cannot read becomes zero. Callers that must surface a
//! malformed amount use [`try_parse_currency`] instead.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::pricing::to_output;

pub const CURRENCY_CODE: &str = "MYR";
pub const CURRENCY_SYMBOL: &str = "RM";

pub fn format_currency(amount: Decimal) -> String {
    let rounded = to_output(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let digits = rounded.abs().to_string();
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}{CURRENCY_SYMBOL}{grouped}.{fraction}")
}

/// Reads the leading number after dropping the currency symbol, whitespace
/// and grouping commas. Unreadable input yields zero.
pub fn parse_currency(text: &str) -> Decimal {
    let cleaned = strip_formatting(text);
    numeric_prefix(&cleaned).and_then(parse_decimal).unwrap_or(Decimal::ZERO)
}

/// Strict variant of [`parse_currency`]. Accepts an optional sign, an optional
/// leading `RM`, digits with commas only between groups of three, and an
/// optional fraction. Anything else is rejected.
pub fn try_parse_currency(text: &str) -> Option<Decimal> {
    let text = text.trim();
    let (sign, rest) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.strip_prefix('+').unwrap_or(text)),
    };
    let rest = rest.strip_prefix(CURRENCY_SYMBOL).map(str::trim_start).unwrap_or(rest);

    let (whole, fraction) = match rest.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (rest, None),
    };
    let whole = ungroup_digits(whole)?;
    match fraction {
        Some(fraction) if fraction.is_empty() || !is_digits(fraction) => return None,
        None if whole.is_empty() => return None,
        _ => {}
    }

    let whole = if whole.is_empty() { "0".to_string() } else { whole };
    let normalized = match fraction {
        Some(fraction) => format!("{sign}{whole}.{fraction}"),
        None => format!("{sign}{whole}"),
    };
    Decimal::from_str(&normalized).ok()
}

fn ungroup_digits(whole: &str) -> Option<String> {
    if !whole.contains(',') {
        return is_digits(whole).then(|| whole.to_string());
    }

    let mut groups = whole.split(',');
    let head = groups.next()?;
    if head.is_empty() || head.len() > 3 || !is_digits(head) {
        return None;
    }
    let mut digits = head.to_string();
    for group in groups {
        if group.len() != 3 || !is_digits(group) {
            return None;
        }
        digits.push_str(group);
    }
    Some(digits)
}

fn is_digits(text: &str) -> bool {
    text.bytes().all(|byte| byte.is_ascii_digit())
}

fn strip_formatting(text: &str) -> String {
    text.chars().filter(|ch| !matches!(ch, 'R' | 'M' | ',') && !ch.is_whitespace()).collect()
}

fn numeric_prefix(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end += 1;
    }

    let mut digits = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        let mut fraction_end = end + 1;
        while fraction_end < bytes.len() && bytes[fraction_end].is_ascii_digit() {
            fraction_end += 1;
            digits += 1;
        }
        end = fraction_end;
    }

    (digits > 0).then(|| &text[..end])
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let (sign, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw.strip_prefix('+').unwrap_or(raw)),
    };
    let unsigned = unsigned.strip_suffix('.').unwrap_or(unsigned);
    let normalized = if unsigned.starts_with('.') {
        format!("{sign}0{unsigned}")
    } else {
        format!("{sign}{unsigned}")
    };
    Decimal::from_str(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{format_currency, parse_currency, try_parse_currency};

    #[test]
    fn formats_with_symbol_grouping_and_two_fraction_digits() {
        assert_eq!(format_currency(Decimal::new(12345, 1)), "RM1,234.50");
        assert_eq!(format_currency(Decimal::ZERO), "RM0.00");
        assert_eq!(format_currency(Decimal::new(15950, 2)), "RM159.50");
        assert_eq!(format_currency(Decimal::new(1_234_567_891, 3)), "RM1,234,567.89");
        assert_eq!(format_currency(Decimal::new(100_000_000, 2)), "RM1,000,000.00");
        assert_eq!(format_currency(Decimal::new(-12, 0)), "-RM12.00");
    }

    #[test]
    fn formatting_rounds_half_up() {
        assert_eq!(format_currency(Decimal::new(10_005, 3)), "RM10.01");
        assert_eq!(format_currency(Decimal::new(-4, 3)), "RM0.00");
    }

    #[test]
    fn formatting_is_stable_for_equal_amounts() {
        assert_eq!(format_currency(Decimal::new(15, 1)), format_currency(Decimal::new(150, 2)));
    }

    #[test]
    fn parse_reads_back_formatted_amounts() {
        let formatted = format_currency(Decimal::new(12345, 1));
        assert_eq!(parse_currency(&formatted), Decimal::new(12345, 1));
        assert_eq!(parse_currency("-RM12.00"), Decimal::new(-12, 0));
        assert_eq!(parse_currency(" RM 6,000 "), Decimal::from(6_000));
        assert_eq!(parse_currency(".75"), Decimal::new(75, 2));
    }

    #[test]
    fn parse_is_lenient_and_falls_back_to_zero() {
        assert_eq!(parse_currency("not a number"), Decimal::ZERO);
        assert_eq!(parse_currency(""), Decimal::ZERO);
        assert_eq!(parse_currency("RM"), Decimal::ZERO);
        assert_eq!(parse_currency("12abc"), Decimal::from(12));
    }

    #[test]
    fn strict_parse_rejects_trailing_garbage() {
        assert_eq!(try_parse_currency("RM1,250.00"), Some(Decimal::new(125_000, 2)));
        assert_eq!(try_parse_currency("12abc"), None);
        assert_eq!(try_parse_currency("abc"), None);
    }

    #[test]
    fn strict_parse_only_allows_a_leading_symbol_and_proper_grouping() {
        assert_eq!(try_parse_currency("5M"), None);
        assert_eq!(try_parse_currency("2RM50"), None);
        assert_eq!(try_parse_currency("1,2345"), None);
        assert_eq!(try_parse_currency(",100"), None);
        assert_eq!(try_parse_currency("12."), None);
        assert_eq!(try_parse_currency("RM"), None);
        assert_eq!(try_parse_currency(""), None);

        assert_eq!(try_parse_currency("-RM12.00"), Some(Decimal::new(-1200, 2)));
        assert_eq!(try_parse_currency(" RM 6,000 "), Some(Decimal::from(6_000)));
        assert_eq!(try_parse_currency("1234567.5"), Some(Decimal::new(12_345_675, 1)));
        assert_eq!(try_parse_currency(".75"), Some(Decimal::new(75, 2)));
    }
}
