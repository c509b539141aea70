//! PII masking for log fields: "NIK middle digits, NPWP last
//! block, email local-part partial, phone middle digits, auth
//! tokens/secrets fully redacted." Applied at the call site before a
//! value is interpolated into a `tracing` field — these are formatting
//! helpers, not a validation layer.

const REDACTED: &str = "***REDACTED***";

/// `3201234567890123` -> `3201********0123`. Anything not exactly 16
/// ASCII digits is treated as already-invalid input and redacted whole.
pub fn mask_nik(nik: &str) -> String {
    if nik.len() != 16 || !nik.chars().all(|c| c.is_ascii_digit()) {
        return REDACTED.to_string();
    }
    format!("{}********{}", &nik[..4], &nik[12..])
}

/// `01.234.567.8-901.000` -> `01.234.567.8-***.***` (masks the last
/// two dot-delimited blocks, which together identify the registered
/// branch/location).
pub fn mask_npwp(npwp: &str) -> String {
    let parts: Vec<&str> = npwp.rsplitn(2, '-').collect();
    match parts.as_slice() {
        [tail, head] => {
            let masked_tail: String = tail
                .split('.')
                .map(|segment| "*".repeat(segment.len()))
                .collect::<Vec<_>>()
                .join(".");
            format!("{head}-{masked_tail}")
        }
        _ => REDACTED.to_string(),
    }
}

/// `budi.santoso@example.com` -> `bu***@example.com`.
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return REDACTED.to_string();
    };
    let visible: String = local.chars().take(2).collect();
    format!("{visible}***@{domain}")
}

/// `+6281234567890` -> `+6281****7890` — keeps a distinguishing prefix
/// and suffix, masks the middle.
pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().collect();
    if digits.len() < 8 {
        return REDACTED.to_string();
    }
    let prefix_len = digits.len().saturating_sub(4).min(5);
    let prefix: String = digits[..prefix_len].iter().collect();
    let suffix: String = digits[digits.len() - 4..].iter().collect();
    format!("{prefix}****{suffix}")
}

/// Tokens, API keys, HMAC secrets — never partially shown.
pub fn redact_secret(_value: &str) -> &'static str {
    REDACTED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_nik_middle_digits() {
        assert_eq!(mask_nik("3201234567890123"), "3201********0123");
    }

    #[test]
    fn invalid_nik_is_fully_redacted() {
        assert_eq!(mask_nik("not-a-nik"), REDACTED);
    }

    #[test]
    fn masks_npwp_last_block() {
        assert_eq!(mask_npwp("01.234.567.8-901.000"), "01.234.567.8-***.***");
    }

    #[test]
    fn masks_email_local_part() {
        assert_eq!(mask_email("budi.santoso@example.com"), "bu***@example.com");
    }

    #[test]
    fn masks_phone_middle_digits() {
        let masked = mask_phone("+6281234567890");
        assert!(masked.starts_with("+6281"));
        assert!(masked.ends_with("7890"));
        assert!(masked.contains("****"));
    }

    #[test]
    fn short_phone_is_fully_redacted() {
        assert_eq!(mask_phone("123"), REDACTED);
    }

    #[test]
    fn secrets_are_always_fully_redacted() {
        assert_eq!(redact_secret("sk-super-secret"), REDACTED);
    }
}
