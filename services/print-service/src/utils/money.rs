use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;

/// Paise to a NUMERIC(10,2) rupee value for binding.
pub fn to_numeric(paise: i64) -> BigDecimal {
    BigDecimal::new(BigInt::from(paise), 2)
}

// Human readable amount for logs and API payloads
pub fn format_rupees(paise: i64) -> String {
    let sign = if paise < 0 { "-" } else { "" };
    let abs = paise.unsigned_abs();
    format!("{}₹{}.{:02}", sign, abs / 100, abs % 100)
}
