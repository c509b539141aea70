//! Field extractors for raw OCR text.
//!
//! Each parser is a total function: every input, including the empty
//! string, produces a valid record, possibly with every field absent.
//! There is nothing here to fail on — the orchestrator (Decision Router /
//! Worker Pool) is responsible for rejecting unknown `doc_type`s before a
//! parser is ever invoked.

pub mod ktp;
pub mod npwp;

pub use ktp::KtpFields;
pub use npwp::NpwpFields;

use crate::db::DocumentType;

#[derive(Debug, Clone)]
pub enum ParsedFields {
    Ktp(KtpFields),
    Npwp(NpwpFields),
}

pub fn parse(doc_type: DocumentType, ocr_text: &str) -> ParsedFields {
    match doc_type {
        DocumentType::Ktp => ParsedFields::Ktp(ktp::parse(ocr_text)),
        DocumentType::Npwp => ParsedFields::Npwp(npwp::parse(ocr_text)),
    }
}

/// Serializes to the shape persisted in `documents.result_json`.
pub fn to_json(fields: &ParsedFields) -> serde_json::Value {
    match fields {
        ParsedFields::Ktp(f) => serde_json::to_value(f).unwrap_or(serde_json::Value::Null),
        ParsedFields::Npwp(f) => serde_json::to_value(f).unwrap_or(serde_json::Value::Null),
    }
}

/// Inverse of `to_json`, used by the explicit-evaluation pathway to
/// rebuild parsed fields from an already-`completed` document without
/// re-running OCR or parsing.
pub fn from_json(doc_type: DocumentType, value: &serde_json::Value) -> anyhow::Result<ParsedFields> {
    match doc_type {
        DocumentType::Ktp => Ok(ParsedFields::Ktp(serde_json::from_value(value.clone())?)),
        DocumentType::Npwp => Ok(ParsedFields::Npwp(serde_json::from_value(value.clone())?)),
    }
}
