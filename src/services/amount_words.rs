//! Rupee amounts spelled out for statements, using Indian digit grouping
//! (thousand, lakh, crore).

use rust_decimal::{prelude::ToPrimitive, Decimal};

const ONES: [&str; 20] = [
    "Zero", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten",
    "Eleven", "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen", "Eighteen",
    "Nineteen",
];

const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

const HUNDRED: u128 = 100;
const THOUSAND: u128 = 1_000;
const LAKH: u128 = 100_000;
const CRORE: u128 = 10_000_000;

pub fn amount_in_words(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let magnitude = rounded.abs();
    let whole = magnitude.trunc();
    // A Decimal mantissa is 96 bits, so every magnitude fits in u128.
    let rupees = whole.to_u128().unwrap_or_default();
    let paisa = ((magnitude - whole) * Decimal::ONE_HUNDRED)
        .to_u128()
        .unwrap_or_default();

    let body = match (rupees, paisa) {
        (0, 0) => return "Zero Rupees Only".to_string(),
        (0, paisa) => format!("{} Paisa Only", number_in_words(paisa)),
        (rupees, 0) => format!("{} Rupees Only", number_in_words(rupees)),
        (rupees, paisa) => format!(
            "{} Rupees and {} Paisa Only",
            number_in_words(rupees),
            number_in_words(paisa)
        ),
    };

    if rounded.is_sign_negative() {
        format!("Minus {body}")
    } else {
        body
    }
}

pub fn number_in_words(number: u128) -> String {
    match number {
        0..=19 => ONES[number as usize].to_string(),
        20..=99 => {
            let tens = TENS[(number / 10) as usize];
            match number % 10 {
                0 => tens.to_string(),
                units => format!("{tens} {}", ONES[units as usize]),
            }
        }
        100..=999 => compose(number, HUNDRED, "Hundred"),
        1_000..=99_999 => compose(number, THOUSAND, "Thousand"),
        100_000..=9_999_999 => compose(number, LAKH, "Lakh"),
        _ => compose(number, CRORE, "Crore"),
    }
}

fn compose(number: u128, unit: u128, label: &str) -> String {
    let head = number_in_words(number / unit);
    match number % unit {
        0 => format!("{head} {label}"),
        rest => format!("{head} {label} {}", number_in_words(rest)),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use std::str::FromStr;

    use super::{amount_in_words, number_in_words};

    fn words(raw: &str) -> String {
        amount_in_words(Decimal::from_str(raw).expect("decimal"))
    }

    #[test]
    fn zero_amount() {
        assert_eq!(words("0"), "Zero Rupees Only");
        assert_eq!(words("0.00"), "Zero Rupees Only");
    }

    #[test]
    fn rupees_and_paisa() {
        assert_eq!(
            words("1250.50"),
            "One Thousand Two Hundred Fifty Rupees and Fifty Paisa Only"
        );
        assert_eq!(words("0.75"), "Seventy Five Paisa Only");
        assert_eq!(words("19"), "Nineteen Rupees Only");
    }

    #[test]
    fn lakh_grouping_beyond_ninety_nine_thousand() {
        assert_eq!(
            number_in_words(99_999),
            "Ninety Nine Thousand Nine Hundred Ninety Nine"
        );
        assert_eq!(number_in_words(100_000), "One Lakh");
        assert_eq!(
            words("1234567.89"),
            "Twelve Lakh Thirty Four Thousand Five Hundred Sixty Seven Rupees and Eighty Nine Paisa Only"
        );
    }

    #[test]
    fn crores_compose_recursively() {
        assert_eq!(number_in_words(10_000_000), "One Crore");
        assert_eq!(
            number_in_words(1_250_000_000),
            "One Hundred Twenty Five Crore"
        );
        assert_eq!(number_in_words(10_000_101), "One Crore One Hundred One");
    }

    #[test]
    fn amounts_beyond_u64_are_still_spelled_out() {
        // 2 * 10^19 does not fit in a u64.
        assert_eq!(words("20000000000000000000"), "Two Lakh Crore Crore Rupees Only");
        assert_ne!(words("79228162514264337593543950335"), "Zero Rupees Only");
    }

    #[test]
    fn rounds_to_paisa_before_spelling() {
        assert_eq!(words("10.999"), "Eleven Rupees Only");
        assert_eq!(words("-5.50"), "Minus Five Rupees and Fifty Paisa Only");
    }
}
