//! NPWP (taxpayer registration number) field extraction.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NpwpFields {
    pub npwp_number: Option<String>,
    pub name: Option<String>,
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{2}\.\d{3}\.\d{3}\.\d-\d{3}\.\d{3})\b").unwrap())
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^\s*Nama\s*[:\-]?\s*(.+)$").unwrap())
}

pub fn parse(ocr_text: &str) -> NpwpFields {
    let mut fields = NpwpFields::default();

    if let Some(c) = number_re().captures(ocr_text) {
        fields.npwp_number = Some(c[1].to_string());
    }
    if let Some(c) = name_re().captures(ocr_text) {
        fields.name = Some(c[1].trim().to_string());
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_npwp() {
        let text = "NPWP\n01.234.567.8-901.000\nNama: PT MAJU BERSAMA\n";
        let fields = parse(text);
        assert_eq!(fields.npwp_number.as_deref(), Some("01.234.567.8-901.000"));
        assert_eq!(fields.name.as_deref(), Some("PT MAJU BERSAMA"));
    }

    #[test]
    fn rejects_malformed_number_format() {
        let fields = parse("NPWP 0123456789\nNama: PT X");
        assert!(fields.npwp_number.is_none());
    }

    #[test]
    fn empty_input_yields_all_none() {
        let fields = parse("");
        assert!(fields.npwp_number.is_none());
        assert!(fields.name.is_none());
    }
}
