//! Scoring Engine — deterministic, pure function of
//! `(docType, parsedFields, ocrText)`. The dual decision pathway is the
//! hardest piece of the verification design: the conservative post-OCR
//! policy never rejects automatically, while the explicit-evaluation
//! policy can. Keeping the two thresholds separate is a product decision,
//! not an oversight — do not unify them.

use crate::config::POST_OCR_AUTO_APPROVE_THRESHOLD;
use crate::parsers::{KtpFields, NpwpFields, ParsedFields};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreResult {
    pub score: i32,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOcrDecision {
    AutoApproved,
    PendingManualReview,
}

impl PostOcrDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AutoApproved => "auto_approved",
            Self::PendingManualReview => "pending_manual_review",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplicitDecision {
    AutoApprove,
    AutoReject,
    NeedsReview,
}

impl ExplicitDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AutoApprove => "auto_approve",
            Self::AutoReject => "auto_reject",
            Self::NeedsReview => "needs_review",
        }
    }
}

/// OCR-confidence component (0-100).
pub fn ocr_confidence(ocr_text: &str) -> i32 {
    let total = ocr_text.chars().count();
    if total < 50 {
        return 20;
    }

    let alnum_or_ws = ocr_text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .count();
    let mut score = 50.0 + 30.0 * (alnum_or_ws as f64 / total as f64);

    let long_lines = ocr_text.lines().filter(|l| l.len() > 5).count();
    if long_lines >= 3 {
        score += 15.0;
    }
    if total > 200 {
        score += 5.0;
    }

    score.round().min(100.0) as i32
}

pub fn score(doc_type_fields: &ParsedFields, ocr_text: &str) -> ScoreResult {
    match doc_type_fields {
        ParsedFields::Ktp(fields) => score_ktp(fields, ocr_text),
        ParsedFields::Npwp(fields) => score_npwp(fields, ocr_text),
    }
}

fn score_ktp(fields: &KtpFields, ocr_text: &str) -> ScoreResult {
    let mut total = 0i32;
    let mut reasons = Vec::new();

    let nik_valid = fields
        .nik
        .as_deref()
        .is_some_and(|n| n.len() == 16 && n.chars().all(|c| c.is_ascii_digit()));
    if nik_valid {
        total += 30;
        reasons.push("NIK valid (+30)".to_string());
    } else {
        reasons.push("NIK missing or invalid (0)".to_string());
    }

    let name_ok = fields.name.as_deref().is_some_and(|n| n.trim().chars().count() >= 3);
    if name_ok {
        total += 20;
        reasons.push("name present (+20)".to_string());
    } else {
        reasons.push("name missing (0)".to_string());
    }

    if fields.birth_date.is_some() {
        total += 15;
        reasons.push("birth date present (+15)".to_string());
    } else {
        reasons.push("birth date missing (0)".to_string());
    }

    let address_ok = fields.address.as_deref().is_some_and(|a| a.trim().chars().count() >= 10);
    if address_ok {
        total += 15;
        reasons.push("address present (+15)".to_string());
    } else {
        reasons.push("address missing (0)".to_string());
    }

    let confidence = ocr_confidence(ocr_text);
    let confidence_points = confidence * 20 / 100;
    total += confidence_points;
    reasons.push(format!(
        "OCR confidence {confidence} (+{confidence_points})"
    ));

    let total = total.clamp(0, 100);
    reasons.push(decision_reason(total));
    ScoreResult { score: total, reasons }
}

fn score_npwp(fields: &NpwpFields, ocr_text: &str) -> ScoreResult {
    let mut total = 0i32;
    let mut reasons = Vec::new();

    let number_valid = fields
        .npwp_number
        .as_deref()
        .is_some_and(|n| NPWP_FORMAT.is_match(n));
    if number_valid {
        total += 40;
        reasons.push("NPWP number valid (+40)".to_string());
    } else {
        reasons.push("NPWP number missing or invalid (0)".to_string());
    }

    let name_ok = fields.name.as_deref().is_some_and(|n| n.trim().chars().count() >= 3);
    if name_ok {
        total += 30;
        reasons.push("name present (+30)".to_string());
    } else {
        reasons.push("name missing (0)".to_string());
    }

    let confidence = ocr_confidence(ocr_text);
    let confidence_points = confidence * 30 / 100;
    total += confidence_points;
    reasons.push(format!(
        "OCR confidence {confidence} (+{confidence_points})"
    ));

    let total = total.clamp(0, 100);
    reasons.push(decision_reason(total));
    ScoreResult { score: total, reasons }
}

fn decision_reason(total_score: i32) -> String {
    if total_score >= POST_OCR_AUTO_APPROVE_THRESHOLD {
        format!("Score {total_score} meets auto-approve threshold")
    } else {
        format!("Score {total_score} requires manual review")
    }
}

static NPWP_FORMAT_PATTERN: &str = r"^\d{2}\.\d{3}\.\d{3}\.\d-\d{3}\.\d{3}$";

use std::sync::OnceLock;
struct LazyRegex(OnceLock<regex::Regex>);
impl LazyRegex {
    fn is_match(&self, haystack: &str) -> bool {
        self.0
            .get_or_init(|| regex::Regex::new(NPWP_FORMAT_PATTERN).unwrap())
            .is_match(haystack)
    }
}
static NPWP_FORMAT: LazyRegex = LazyRegex(OnceLock::new());

/// Automatic, post-OCR policy (conservative): invoked by the Worker Pool
/// right after scoring. Never auto-rejects — `score < 75` always
/// escalates.
pub fn post_ocr_decision(score: i32) -> PostOcrDecision {
    if score >= POST_OCR_AUTO_APPROVE_THRESHOLD {
        PostOcrDecision::AutoApproved
    } else {
        PostOcrDecision::PendingManualReview
    }
}

/// Explicit-evaluation policy: invoked on a client-initiated evaluation
/// request against a `completed` document, using the configurable
/// thresholds.
pub fn explicit_decision(score: i32, threshold_auto_approve: i32, threshold_auto_reject: i32) -> ExplicitDecision {
    if score >= threshold_auto_approve {
        ExplicitDecision::AutoApprove
    } else if score <= threshold_auto_reject {
        ExplicitDecision::AutoReject
    } else {
        ExplicitDecision::NeedsReview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::KtpFields;

    fn long_ocr_text() -> String {
        let mut s = String::new();
        for _ in 0..6 {
            s.push_str("NOMOR INDUK KEPENDUDUKAN REPUBLIK INDONESIA\n");
        }
        s
    }

    #[test]
    fn ocr_confidence_short_text_is_twenty() {
        assert_eq!(ocr_confidence("short"), 20);
    }

    #[test]
    fn ocr_confidence_long_clean_text_is_high() {
        let text = long_ocr_text();
        assert!(ocr_confidence(&text) > 80);
    }

    #[test]
    fn ktp_score_deterministic_across_calls() {
        let fields = ParsedFields::Ktp(KtpFields {
            nik: Some("3201234567890123".to_string()),
            name: Some("BUDI SANTOSO".to_string()),
            birth_date: Some("15-08-1990".to_string()),
            address: Some("JL. MERDEKA NO. 123".to_string()),
            ..Default::default()
        });
        let text = long_ocr_text();
        let a = score(&fields, &text);
        let b = score(&fields, &text);
        assert_eq!(a, b);
    }

    #[test]
    fn ktp_full_fields_with_strong_ocr_crosses_auto_approve() {
        let fields = KtpFields {
            nik: Some("3201234567890123".to_string()),
            name: Some("BUDI SANTOSO".to_string()),
            birth_date: Some("15-08-1990".to_string()),
            address: Some("JL. MERDEKA NO. 123, JAKARTA".to_string()),
            ..Default::default()
        };
        let result = score(&ParsedFields::Ktp(fields), &long_ocr_text());
        assert!(result.score >= 75, "score was {}", result.score);
        assert_eq!(post_ocr_decision(result.score), PostOcrDecision::AutoApproved);
    }

    #[test]
    fn post_ocr_never_auto_rejects() {
        // Worst possible score still only escalates, never rejects.
        assert_eq!(post_ocr_decision(0), PostOcrDecision::PendingManualReview);
    }

    #[test]
    fn post_ocr_boundary_exactly_75_is_auto_approved() {
        assert_eq!(post_ocr_decision(75), PostOcrDecision::AutoApproved);
    }

    #[test]
    fn post_ocr_boundary_74_is_pending_review() {
        assert_eq!(post_ocr_decision(74), PostOcrDecision::PendingManualReview);
    }

    #[test]
    fn explicit_boundaries() {
        assert_eq!(explicit_decision(85, 85, 35), ExplicitDecision::AutoApprove);
        assert_eq!(explicit_decision(35, 85, 35), ExplicitDecision::AutoReject);
        assert_eq!(explicit_decision(36, 85, 35), ExplicitDecision::NeedsReview);
    }

    #[test]
    fn npwp_valid_number_and_name_scores_high_component() {
        let fields = NpwpFields {
            npwp_number: Some("01.234.567.8-901.000".to_string()),
            name: Some("PT MAJU BERSAMA".to_string()),
        };
        let result = score(&ParsedFields::Npwp(fields), &long_ocr_text());
        assert!(result.score >= 70);
    }
}
