//! KTP (national ID card) field extraction — best-effort regex over raw
//! OCR text. No field is required; unrecognised fields are simply absent.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KtpFields {
    pub nik: Option<String>,
    pub name: Option<String>,
    pub birth_place: Option<String>,
    pub birth_date: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub religion: Option<String>,
    pub marital_status: Option<String>,
}

fn nik_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bNIK\s*[:\-]?\s*(\d{16})\b").unwrap())
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^\s*Nama\s*[:\-]?\s*(.+)$").unwrap())
}

fn birth_place_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^\s*Tempat/Tgl\s*Lahir\s*[:\-]?\s*([^,\n]+),\s*(\d{2}-\d{2}-\d{4})")
            .unwrap()
    })
}

fn standalone_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{2}-\d{2}-\d{4})\b").unwrap())
}

fn address_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^\s*Alamat\s*[:\-]?\s*(.+)$").unwrap())
}

fn gender_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(LAKI-LAKI|PEREMPUAN|MALE|FEMALE)\b").unwrap()
    })
}

fn religion_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^\s*Agama\s*[:\-]?\s*(.+)$").unwrap())
}

fn marital_status_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^\s*Status\s*Perkawinan\s*[:\-]?\s*(.+)$").unwrap())
}

pub fn parse(ocr_text: &str) -> KtpFields {
    let mut fields = KtpFields::default();

    if let Some(c) = nik_re().captures(ocr_text) {
        fields.nik = Some(c[1].to_string());
    }
    if let Some(c) = name_re().captures(ocr_text) {
        fields.name = Some(clean_line(&c[1]));
    }
    if let Some(c) = birth_place_date_re().captures(ocr_text) {
        fields.birth_place = Some(clean_line(&c[1]));
        fields.birth_date = Some(c[2].to_string());
    } else if let Some(c) = standalone_date_re().captures(ocr_text) {
        fields.birth_date = Some(c[1].to_string());
    }
    if let Some(c) = address_re().captures(ocr_text) {
        fields.address = Some(clean_line(&c[1]));
    }
    if let Some(c) = gender_re().captures(ocr_text) {
        fields.gender = Some(c[1].to_uppercase());
    }
    if let Some(c) = religion_re().captures(ocr_text) {
        fields.religion = Some(clean_line(&c[1]));
    }
    if let Some(c) = marital_status_re().captures(ocr_text) {
        fields.marital_status = Some(clean_line(&c[1]));
    }

    fields
}

fn clean_line(raw: &str) -> String {
    raw.trim().trim_end_matches(['.', ',']).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_ktp() {
        let text = "\
            PROVINSI DKI JAKARTA\n\
            NIK: 3201234567890123\n\
            Nama: BUDI SANTOSO\n\
            Tempat/Tgl Lahir: JAKARTA, 15-08-1990\n\
            Alamat: JL. MERDEKA NO. 123\n\
            Agama: ISLAM\n\
            Status Perkawinan: KAWIN\n\
            LAKI-LAKI\n";

        let fields = parse(text);
        assert_eq!(fields.nik.as_deref(), Some("3201234567890123"));
        assert_eq!(fields.name.as_deref(), Some("BUDI SANTOSO"));
        assert_eq!(fields.birth_place.as_deref(), Some("JAKARTA"));
        assert_eq!(fields.birth_date.as_deref(), Some("15-08-1990"));
        assert_eq!(fields.address.as_deref(), Some("JL. MERDEKA NO. 123"));
        assert_eq!(fields.religion.as_deref(), Some("ISLAM"));
        assert_eq!(fields.marital_status.as_deref(), Some("KAWIN"));
        assert_eq!(fields.gender.as_deref(), Some("LAKI-LAKI"));
    }

    #[test]
    fn empty_input_yields_all_none() {
        let fields = parse("");
        assert!(fields.nik.is_none());
        assert!(fields.name.is_none());
        assert!(fields.address.is_none());
    }

    #[test]
    fn garbage_input_is_total_and_empty() {
        let fields = parse("asdkjaslkdj 1234 !!! \n\n random noise");
        assert!(fields.nik.is_none());
        assert!(fields.name.is_none());
    }

    #[test]
    fn nik_requires_exactly_sixteen_digits() {
        let fields = parse("NIK: 12345");
        assert!(fields.nik.is_none());
    }
}
