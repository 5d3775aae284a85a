//! Détection heuristique des échecs d'autorisation du portail
//!
//! Les portails n'ont pas de code lisible par une machine pour un token expiré ou inconnu.
//! La condition apparaît sous forme d'un message du type `"Authorization failed. 75"`,
//! d'une expression `unauthorized` / `invalid token`, ou d'un HTTP 401, n'importe où dans
//! la réponse ou dans l'erreur levée.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static AUTHORIZATION_FAILED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)authorization\s*failed\.?\s*\d*").expect("valid regex"));

const FAILURE_PHRASES: &[&str] = &["authorization", "unauthorized", "auth failed", "invalid token"];

/// Vrai quand `value` (un corps de réponse ou la vue JSON d'une erreur) signale
/// un échec d'autorisation
pub fn is_authorization_failure(value: &Value) -> bool {
    if value.is_null() {
        return false;
    }

    if AUTHORIZATION_FAILED.is_match(&value.to_string()) {
        return true;
    }

    if value.get("status").and_then(Value::as_u64) == Some(401) {
        return true;
    }

    let js = value.get("js");
    let messages = [
        value.get("message"),
        js.and_then(|js| js.get("error")),
        js.and_then(|js| js.get("msg")),
    ];

    messages
        .into_iter()
        .flatten()
        .filter_map(message_text)
        .any(|msg| FAILURE_PHRASES.iter().any(|p| msg.contains(p)))
}

fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_lowercase()),
        Value::Null => None,
        other => Some(other.to_string().to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbered_authorization_failed() {
        assert!(is_authorization_failure(
            &json!({ "js": { "error": "Authorization failed. 75" } })
        ));
        assert!(is_authorization_failure(&json!("AUTHORIZATION FAILED")));
    }

    #[test]
    fn test_phrases() {
        assert!(is_authorization_failure(&json!({ "message": "Unauthorized" })));
        assert!(is_authorization_failure(&json!({ "js": { "msg": "Invalid token" } })));
        assert!(is_authorization_failure(&json!({ "js": { "error": "auth failed" } })));
    }

    #[test]
    fn test_http_401() {
        assert!(is_authorization_failure(&json!({ "message": "HTTP Error", "status": 401 })));
        assert!(!is_authorization_failure(&json!({ "message": "HTTP Error", "status": 500 })));
    }

    #[test]
    fn test_regular_payloads() {
        assert!(!is_authorization_failure(&Value::Null));
        assert!(!is_authorization_failure(&json!({ "js": true })));
        assert!(!is_authorization_failure(
            &json!({ "js": { "data": [{ "id": "10000", "name": "Acme TV" }], "total_items": 1 } })
        ));
        assert!(!is_authorization_failure(&json!({ "js": { "error": "" } })));
    }
}
