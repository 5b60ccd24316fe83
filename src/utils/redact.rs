//! Redaction of sensitive data in log payloads.
//!
//! Two rules, applied recursively to JSON values before anything is logged:
//! a field whose name is on the sensitive list is masked regardless of its
//! value, and any string value containing a contiguous 13-16 digit run is
//! masked regardless of its field name (card numbers survive being renamed).
//! Masked values keep at most their 4 trailing characters.

use serde_json::Value;

/// Sanitizes sensitive fields and card-number-shaped values for logging.
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = if is_sensitive_field(key) {
                    mask_value(val)
                } else {
                    sanitize_json(val)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        Value::String(s) if contains_pan_like_run(s) => mask_str(s),
        _ => value.clone(),
    }
}

fn is_sensitive_field(key: &str) -> bool {
    let key = key.to_lowercase();
    matches!(
        key.as_str(),
        "card_number"
            | "cardnumber"
            | "card_no"
            | "pan"
            | "cvv"
            | "cvv2"
            | "cvc"
            | "security_code"
            | "iban"
            | "account_number"
            | "token"
            | "secret"
            | "api_key"
            | "authorization"
            | "password"
    ) || key.ends_with("_token")
        || key.ends_with("_secret")
        || key.ends_with("_key")
}

/// True if the string contains a contiguous run of 13 to 16 ASCII digits.
fn contains_pan_like_run(s: &str) -> bool {
    let mut run = 0usize;
    for c in s.chars() {
        if c.is_ascii_digit() {
            run += 1;
        } else {
            if (13..=16).contains(&run) {
                return true;
            }
            run = 0;
        }
    }
    (13..=16).contains(&run)
}

fn mask_value(value: &Value) -> Value {
    match value {
        Value::String(s) => mask_str(s),
        // Non-string sensitive values (numeric card fields, nested blobs)
        // are dropped entirely rather than partially shown.
        _ => Value::String("****".to_string()),
    }
}

fn mask_str(s: &str) -> Value {
    if s.len() > 4 {
        let tail: String = s.chars().skip(s.chars().count().saturating_sub(4)).collect();
        Value::String(format!("****{tail}"))
    } else {
        Value::String("****".to_string())
    }
}
