//! Common regex patterns for invoice review and output naming.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // ISO 4217 alphabetic currency code (CAD, USD, EUR)
    pub static ref ISO_CURRENCY: Regex = Regex::new(r"^[A-Z]{3}$").unwrap();

    // Calendar date in YYYY-MM-DD form
    pub static ref ISO_DATE: Regex = Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap();

    // Anything that must not appear in an output file name
    pub static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]").unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_currency() {
        assert!(ISO_CURRENCY.is_match("CAD"));
        assert!(!ISO_CURRENCY.is_match("cad"));
        assert!(!ISO_CURRENCY.is_match("$"));
        assert!(!ISO_CURRENCY.is_match("USDT"));
    }

    #[test]
    fn test_iso_date() {
        assert!(ISO_DATE.is_match("2024-03-15"));
        assert!(!ISO_DATE.is_match("15.03.2024"));
        assert!(!ISO_DATE.is_match("March 15, 2024"));
    }

    #[test]
    fn test_unsafe_filename_chars() {
        assert_eq!(UNSAFE_FILENAME_CHARS.replace_all("FV/2024/01", "_"), "FV_2024_01");
        assert_eq!(UNSAFE_FILENAME_CHARS.replace_all("INV-100", "_"), "INV-100");
    }
}
