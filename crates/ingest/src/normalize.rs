//! Normalization of messy source values into canonical forms
//!
//! Payment-processor exports arrive with Brazilian locale formatting
//! (`R$ 1.234,56`), percent suffixes, and CNPJs mangled by spreadsheet
//! round-trips (scientific notation, stripped leading zeros).

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Storage format for sale timestamps (sortable, strftime-friendly)
pub const SQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a locale-formatted monetary string into a `Decimal`.
///
/// Strips `R$`/`%` and whitespace, drops `.` thousands separators, and
/// treats `,` as the decimal point. Unparseable input yields zero.
pub fn clean_value(raw: &str) -> Decimal {
    let stripped = raw.trim().replace("R$", "").replace('%', "");
    let normalized = stripped.trim().replace('.', "").replace(',', ".");
    Decimal::from_str(&normalized).unwrap_or(Decimal::ZERO)
}

/// Parse a monetary value that may arrive as a JSON string or number
pub fn clean_json_value(value: &serde_json::Value) -> Decimal {
    match value {
        serde_json::Value::String(s) => clean_value(s),
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

/// Normalize a CNPJ of any input shape into a 14-digit zero-padded string.
///
/// Repairs scientific-notation corruption from spreadsheet exports
/// (`1,23456789012E13`), strips punctuation, and left-pads with zeros.
/// Returns `None` when no digits remain.
pub fn clean_cnpj(raw: &str) -> Option<String> {
    let mut s = raw.trim().to_string();
    if s.is_empty() {
        return None;
    }

    // Spreadsheets export long CNPJs as floats; recover the integer form
    if s.to_uppercase().contains('E') {
        if let Ok(f) = s.replace(',', ".").parse::<f64>() {
            s = format!("{f:.0}");
        }
    }

    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    Some(format!("{digits:0>14}"))
}

/// `dd/mm/YYYY` (Bionio payment dates) — midnight assumed
pub fn parse_date_br(s: &str) -> Option<NaiveDateTime> {
    NaiveDate::parse_from_str(s.trim(), "%d/%m/%Y")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// `dd/mm/YYYY HH:MM:SS` (Rovema Pay sale timestamps)
pub fn parse_datetime_br(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), "%d/%m/%Y %H:%M:%S").ok()
}

/// `YYYY-mm-dd HH:MM:SS` (ELIQ API timestamps)
pub fn parse_datetime_iso(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S").ok()
}

/// Format a timestamp for the sales table
pub fn to_sql_datetime(dt: &NaiveDateTime) -> String {
    dt.format(SQL_DATETIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_clean_value_brazilian_format() {
        assert_eq!(clean_value("R$ 1.234,56"), dec!(1234.56));
        assert_eq!(clean_value("1.234.567,89"), dec!(1234567.89));
        assert_eq!(clean_value("12,34"), dec!(12.34));
    }

    #[test]
    fn test_clean_value_percent_and_whitespace() {
        assert_eq!(clean_value(" 2,5% "), dec!(2.5));
        assert_eq!(clean_value("R$0,00"), dec!(0));
    }

    #[test]
    fn test_clean_value_negative() {
        assert_eq!(clean_value("-12,34"), dec!(-12.34));
    }

    #[test]
    fn test_clean_value_garbage_is_zero() {
        assert_eq!(clean_value(""), Decimal::ZERO);
        assert_eq!(clean_value("abc"), Decimal::ZERO);
        assert_eq!(clean_value("R$"), Decimal::ZERO);
    }

    #[test]
    fn test_clean_cnpj_punctuation() {
        assert_eq!(
            clean_cnpj("12.345.678/0001-95").as_deref(),
            Some("12345678000195")
        );
    }

    #[test]
    fn test_clean_cnpj_zero_pads_short_input() {
        // Leading zeros stripped by a spreadsheet
        assert_eq!(clean_cnpj("345678000195").as_deref(), Some("00345678000195"));
        assert_eq!(clean_cnpj("1").as_deref(), Some("00000000000001"));
    }

    #[test]
    fn test_clean_cnpj_scientific_notation() {
        // 1.2345678000195E13 == 12345678000195
        assert_eq!(
            clean_cnpj("1.2345678000195E13").as_deref(),
            Some("12345678000195")
        );
        // Comma decimal separator variant
        assert_eq!(
            clean_cnpj("1,2345678000195E13").as_deref(),
            Some("12345678000195")
        );
    }

    #[test]
    fn test_clean_cnpj_empty_is_none() {
        assert_eq!(clean_cnpj(""), None);
        assert_eq!(clean_cnpj("   "), None);
        assert_eq!(clean_cnpj("n/a"), None);
    }

    #[test]
    fn test_parse_date_br() {
        let dt = parse_date_br("25/12/2024").unwrap();
        assert_eq!(to_sql_datetime(&dt), "2024-12-25 00:00:00");
        assert!(parse_date_br("2024-12-25").is_none());
        assert!(parse_date_br("31/02/2024").is_none());
    }

    #[test]
    fn test_parse_datetime_br() {
        let dt = parse_datetime_br("05/03/2025 14:30:00").unwrap();
        assert_eq!(to_sql_datetime(&dt), "2025-03-05 14:30:00");
    }

    #[test]
    fn test_parse_datetime_iso() {
        let dt = parse_datetime_iso("2025-03-05 14:30:00").unwrap();
        assert_eq!(to_sql_datetime(&dt), "2025-03-05 14:30:00");
        assert!(parse_datetime_iso("05/03/2025 14:30:00").is_none());
    }

    #[test]
    fn test_clean_json_value() {
        assert_eq!(clean_json_value(&serde_json::json!("1.234,56")), dec!(1234.56));
        assert_eq!(clean_json_value(&serde_json::json!(42.5)), dec!(42.5));
        assert_eq!(clean_json_value(&serde_json::json!(null)), Decimal::ZERO);
    }
}
