use serde::Deserialize;
use serde_json::Value;

/// Parameters Azure OpenAI rejects outright; they are dropped before
/// forwarding.
const UNSUPPORTED_PARAMS: &[&str] = &["chat_template_kwargs", "enable_thinking"];

#[derive(Deserialize)]
struct ModelField {
    model: String,
}

/// Pull the `model` string out of a raw JSON request body.
pub fn extract_model(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ModelField>(body)
        .ok()
        .map(|f| f.model)
}

/// Rewrite a request body for Azure OpenAI.
///
/// `max_tokens` becomes `max_completion_tokens` unless the caller already
/// sent the new name, and unsupported parameters are removed. Bodies that do
/// not parse as a JSON object pass through untouched.
pub fn transform_body(body: Vec<u8>) -> Vec<u8> {
    let Ok(Value::Object(mut data)) = serde_json::from_slice::<Value>(&body) else {
        return body;
    };

    let mut modified = false;

    if let Some(max_tokens) = data.get("max_tokens").cloned() {
        if !data.contains_key("max_completion_tokens") {
            data.remove("max_tokens");
            data.insert("max_completion_tokens".into(), max_tokens);
            tracing::debug!("renamed max_tokens to max_completion_tokens");
            modified = true;
        }
    }

    for param in UNSUPPORTED_PARAMS {
        if data.remove(*param).is_some() {
            tracing::debug!(%param, "removed unsupported parameter");
            modified = true;
        }
    }

    if !modified {
        return body;
    }
    serde_json::to_vec(&Value::Object(data)).unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roundtrip(v: serde_json::Value) -> serde_json::Value {
        let out = transform_body(serde_json::to_vec(&v).unwrap());
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn extracts_model() {
        let body = br#"{"model":"gpt-4","messages":[]}"#;
        assert_eq!(extract_model(body).as_deref(), Some("gpt-4"));
        assert_eq!(extract_model(b"{}"), None);
        assert_eq!(extract_model(b"not json"), None);
    }

    #[test]
    fn renames_max_tokens() {
        let out = roundtrip(json!({"model": "gpt-4", "max_tokens": 128}));
        assert_eq!(out["max_completion_tokens"], 128);
        assert!(out.get("max_tokens").is_none());
    }

    #[test]
    fn keeps_existing_max_completion_tokens() {
        let out = roundtrip(json!({"max_tokens": 128, "max_completion_tokens": 64}));
        assert_eq!(out["max_completion_tokens"], 64);
        assert_eq!(out["max_tokens"], 128);
    }

    #[test]
    fn strips_unsupported_params() {
        let out = roundtrip(json!({
            "model": "gpt-4",
            "chat_template_kwargs": {"enable_thinking": true},
            "enable_thinking": true
        }));
        assert!(out.get("chat_template_kwargs").is_none());
        assert!(out.get("enable_thinking").is_none());
        assert_eq!(out["model"], "gpt-4");
    }

    #[test]
    fn untouched_body_passes_through_verbatim() {
        let body = br#"{"model":"gpt-4",  "messages": []}"#.to_vec();
        assert_eq!(transform_body(body.clone()), body);
    }

    #[test]
    fn non_json_passes_through() {
        let body = b"plain text".to_vec();
        assert_eq!(transform_body(body.clone()), body);
    }
}
