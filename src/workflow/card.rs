//! Card number validation, brand detection and display formatting
//!
//! All functions here are pure: invalid input yields `false`/`None`, never a
//! panic.

use chrono::Datelike;

use crate::models::CardBrand;

fn digits(raw: &str) -> Vec<u32> {
    raw.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn digit_string(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Luhn check over the digits of `raw`; length must be 13..=19
pub fn validate_card_number(raw: &str) -> bool {
    let digits = digits(raw);
    if !(13..=19).contains(&digits.len()) {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

/// Visa if the number starts with 4, Mastercard for 51–55 and 22–27
pub fn detect_card_type(raw: &str) -> Option<CardBrand> {
    let digits = digits(raw);
    match digits.as_slice() {
        [4, ..] => Some(CardBrand::Visa),
        [first, second, ..] => match first * 10 + second {
            51..=55 | 22..=27 => Some(CardBrand::Mastercard),
            _ => None,
        },
        _ => None,
    }
}

/// Group digits in blocks of four, capped at 19 output characters
pub fn format_card_number(raw: &str) -> String {
    let digits = digit_string(raw);
    let mut formatted = String::with_capacity(19);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && i % 4 == 0 {
            formatted.push(' ');
        }
        formatted.push(c);
    }
    formatted.truncate(19);
    formatted
}

/// Last four digits, or fewer if the input is shorter
pub fn last_four(raw: &str) -> String {
    let digits = digit_string(raw);
    let start = digits.len().saturating_sub(4);
    digits[start..].to_string()
}

/// Display form that only reveals the last four digits
pub fn mask_card_number(raw: &str) -> String {
    format!("**** **** **** {}", last_four(raw))
}

/// Month 1–12, year not before `today`'s year, and not an already elapsed
/// month of the current year.
pub fn validate_expiry(month: u32, year: i32, today: chrono::NaiveDate) -> bool {
    if !(1..=12).contains(&month) {
        return false;
    }
    if year < today.year() {
        return false;
    }
    !(year == today.year() && month < today.month())
}

/// CVV is 3 or 4 ASCII digits
pub fn validate_cvv(cvv: &str) -> bool {
    (3..=4).contains(&cvv.len()) && cvv.chars().all(|c| c.is_ascii_digit())
}
