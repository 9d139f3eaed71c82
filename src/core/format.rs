//! Fiat amount rendering

use rust_decimal::{Decimal, RoundingStrategy};

/// Text shown in place of a fiat value when no rate is available.
pub const NO_DATA: &str = "No data";

pub const DEFAULT_PRECISION: u32 = 2;

/// Minor-unit precision for currencies that differ from two digits (ISO 4217).
const CCY_PRECISIONS: &[(&str, u32)] = &[
    ("BHD", 3),
    ("BIF", 0),
    ("BYR", 0),
    ("CLF", 4),
    ("CLP", 0),
    ("CVE", 0),
    ("DJF", 0),
    ("GNF", 0),
    ("IQD", 3),
    ("ISK", 0),
    ("JOD", 3),
    ("JPY", 0),
    ("KMF", 0),
    ("KRW", 0),
    ("KWD", 3),
    ("LYD", 3),
    ("MGA", 1),
    ("MRO", 1),
    ("OMR", 3),
    ("PYG", 0),
    ("RWF", 0),
    ("TND", 3),
    ("UGX", 0),
    ("UYI", 0),
    ("VND", 0),
    ("VUV", 0),
    ("XAF", 0),
    ("XAU", 4),
    ("XOF", 0),
    ("XPF", 0),
];

pub fn precision_for(ccy: &str) -> Option<u32> {
    CCY_PRECISIONS
        .iter()
        .find(|(code, _)| *code == ccy)
        .map(|(_, prec)| *prec)
}

/// Renders `amount` with the minor-unit precision of `ccy`, falling back to
/// `default_prec` for currencies outside the table.
///
/// Half-way values round to even. With `is_diff` the result always carries a
/// sign.
pub fn ccy_amount_str(
    amount: Decimal,
    ccy: &str,
    commas: bool,
    default_prec: u32,
    is_diff: bool,
) -> String {
    let prec = precision_for(ccy).unwrap_or(default_prec);
    let mut rounded = amount.round_dp_with_strategy(prec, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(prec);

    let sign = if is_diff {
        if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            "+"
        }
    } else if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };

    let digits = rounded.abs().to_string();
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (digits.as_str(), None),
    };
    let int_part = if commas {
        group_thousands(int_part)
    } else {
        int_part.to_string()
    };

    match frac_part {
        Some(frac) => format!("{sign}{int_part}.{frac}"),
        None => format!("{sign}{int_part}"),
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
