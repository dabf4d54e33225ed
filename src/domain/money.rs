use std::fmt;

/// Money is stored as an integer count of the currency's minor unit.
/// For USD, 1 unit = 100 minor units, so $50.00 = 5000. For JPY, 1 unit = 1.
pub type Amount = i64;

/// Format a minor-unit amount with the given number of decimal places.
/// Example: (5000, 2) -> "50.00", (-1234, 2) -> "-12.34", (500, 0) -> "500"
pub fn format_amount(amount: Amount, exponent: u32) -> String {
    if exponent == 0 {
        return amount.to_string();
    }

    let sign = if amount < 0 { "-" } else { "" };
    let scale = 10u64.pow(exponent);
    let abs = amount.unsigned_abs();
    format!(
        "{}{}.{:0width$}",
        sign,
        abs / scale,
        abs % scale,
        width = exponent as usize
    )
}

/// Parse a decimal string into minor units for a currency with the given exponent.
/// Example: ("50.00", 2) -> 5000, ("12.5", 2) -> 1250, ("100", 0) -> 100
///
/// Extra fractional digits are rejected rather than truncated: an amount the
/// currency cannot represent is an input error.
pub fn parse_amount(input: &str, exponent: u32) -> Result<Amount, ParseAmountError> {
    let input = input.trim();
    let negative = input.starts_with('-');
    let input = input.trim_start_matches('-');

    let (units_str, fraction_str) = match input.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (input, ""),
    };

    if units_str.is_empty() && fraction_str.is_empty() {
        return Err(ParseAmountError::InvalidFormat);
    }
    if !fraction_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseAmountError::InvalidFormat);
    }
    if fraction_str.len() > exponent as usize {
        return Err(ParseAmountError::TooPrecise { exponent });
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        parse_digits(units_str)?
    };

    // "5" with exponent 2 means 50 minor units
    let fraction: i64 = if fraction_str.is_empty() {
        0
    } else {
        parse_digits(fraction_str)? * 10i64.pow(exponent - fraction_str.len() as u32)
    };

    let amount = units
        .checked_mul(10i64.pow(exponent))
        .and_then(|scaled| scaled.checked_add(fraction))
        .ok_or(ParseAmountError::Overflow)?;

    Ok(if negative { -amount } else { amount })
}

fn parse_digits(digits: &str) -> Result<i64, ParseAmountError> {
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseAmountError::InvalidFormat);
    }
    digits.parse().map_err(|_| ParseAmountError::Overflow)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    InvalidFormat,
    TooPrecise { exponent: u32 },
    Overflow,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::InvalidFormat => write!(f, "invalid money format"),
            ParseAmountError::TooPrecise { exponent } => {
                write!(f, "currency allows at most {} decimal places", exponent)
            }
            ParseAmountError::Overflow => write!(f, "amount is too large"),
        }
    }
}

impl std::error::Error for ParseAmountError {}
