//! CEP (Brazilian postal code) shape validation and normalization.
//!
//! Nominatim hands back free-form postcode strings; ViaCEP only accepts
//! 8-digit codes. The accepted shape is "5 digits, optional hyphen,
//! 3 digits". Everything here is pure string work — malformed values are
//! treated as absent by callers, never forwarded downstream.

/// Number of digits in a normalized CEP.
pub const CEP_DIGITS: usize = 8;

/// Returns `true` if `raw` matches the accepted CEP shape:
/// exactly 5 digits, an optional single hyphen, then exactly 3 digits.
pub fn is_valid_cep(raw: &str) -> bool {
    let bytes: Vec<char> = raw.chars().collect();
    match bytes.len() {
        8 => bytes.iter().all(|c| c.is_ascii_digit()),
        9 => {
            bytes[5] == '-'
                && bytes[..5].iter().all(|c| c.is_ascii_digit())
                && bytes[6..].iter().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

/// Validates `raw` and strips the optional hyphen, yielding the 8-digit
/// form ViaCEP expects. Returns `None` for anything malformed.
pub fn normalize_cep(raw: &str) -> Option<String> {
    if !is_valid_cep(raw) {
        return None;
    }
    Some(raw.chars().filter(|c| c.is_ascii_digit()).collect())
}

/// Renders an 8-digit CEP in the conventional `#####-###` display form.
/// Inputs that are not exactly 8 digits are returned unchanged.
pub fn display_cep(digits: &str) -> String {
    if digits.len() == CEP_DIGITS && digits.chars().all(|c| c.is_ascii_digit()) {
        format!("{}-{}", &digits[..5], &digits[5..])
    } else {
        digits.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
