use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Classification, RelevanceVerdict};

/// Body for Ollama's `/api/generate`.
#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub format: String,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

pub fn build_request(model: String, topic: &str, text: &str) -> GenerateRequest {
    GenerateRequest {
        model,
        prompt: build_prompt(topic, text),
        format: "json".into(),
        stream: false,
    }
}

pub fn build_prompt(topic: &str, text: &str) -> String {
    format!(
        "I'm looking for posts about {topic}. Given the following post, decide whether it is \
         related to {topic}. Respond only with a JSON object of the form \
         {{\"relevant\": \"yes\" or \"no\", \"reason\": \"<one short sentence>\"}}.\n\n\
         Post: \"{text}\"\n\nAnswer:"
    )
}

/// Reads whatever the model put in `response` as a verdict.
///
/// Accepts a bare `yes`/`no` token, a JSON object with a `relevant` field,
/// or either of those wrapped once more as a JSON string. Anything else is
/// indeterminate.
pub fn interpret_response(raw: &str) -> Classification {
    interpret(raw, true)
}

fn interpret(raw: &str, allow_nested: bool) -> Classification {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Classification::indeterminate("empty model response");
    }

    if let Some(verdict) = read_token(trimmed) {
        return Classification::new(verdict, format!("model answered {trimmed:?}"));
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(err) => {
            return Classification::indeterminate(format!("unparseable model output: {err}"));
        }
    };

    match value {
        Value::Object(map) => {
            let field = map.get("relevant").or_else(|| map.get("relevance"));
            let Some(field) = field else {
                return Classification::indeterminate("model output has no relevance field");
            };
            let reason = map
                .get("reason")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("relevant = {field}"));
            Classification::new(read_field(field), reason)
        }
        Value::String(inner) if allow_nested => interpret(&inner, false),
        Value::Bool(flag) => {
            Classification::new(verdict_from_bool(flag), "model answered a bare boolean")
        }
        other => Classification::indeterminate(format!(
            "unexpected model output shape: {}",
            shape_of(&other)
        )),
    }
}

fn read_token(text: &str) -> Option<RelevanceVerdict> {
    let token = text
        .trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace())
        .trim_end_matches('.')
        .to_ascii_lowercase();
    match token.as_str() {
        "yes" | "true" => Some(RelevanceVerdict::Relevant),
        "no" | "false" => Some(RelevanceVerdict::NotRelevant),
        _ => None,
    }
}

fn read_field(field: &Value) -> RelevanceVerdict {
    match field {
        Value::Bool(flag) => verdict_from_bool(*flag),
        Value::String(s) if matches!(s.trim().to_lowercase().as_str(), "yes" | "true") => {
            RelevanceVerdict::Relevant
        }
        _ => RelevanceVerdict::NotRelevant,
    }
}

fn verdict_from_bool(flag: bool) -> RelevanceVerdict {
    if flag {
        RelevanceVerdict::Relevant
    } else {
        RelevanceVerdict::NotRelevant
    }
}

fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_asks_for_json_without_streaming() {
        let request = build_request("llama3.1".into(), "Excelsior Rotterdam", "Excelsior 2-0");
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["model"], "llama3.1");
        assert_eq!(body["format"], "json");
        assert_eq!(body["stream"], false);
        let prompt = body["prompt"].as_str().unwrap();
        assert!(prompt.contains("Post: \"Excelsior 2-0\""));
        assert!(prompt.contains("posts about Excelsior Rotterdam"));
    }

    #[test]
    fn plain_tokens() {
        assert_eq!(interpret_response("yes").verdict, RelevanceVerdict::Relevant);
        assert_eq!(interpret_response(" YES.\n").verdict, RelevanceVerdict::Relevant);
        assert_eq!(interpret_response("\"no\"").verdict, RelevanceVerdict::NotRelevant);
        assert_eq!(interpret_response("maybe").verdict, RelevanceVerdict::Indeterminate);
        assert_eq!(interpret_response("   ").verdict, RelevanceVerdict::Indeterminate);
    }

    #[test]
    fn json_object_with_reason() {
        let c = interpret_response(r#"{"relevant": "Yes", "reason": "mentions the Woudestein"}"#);
        assert_eq!(c.verdict, RelevanceVerdict::Relevant);
        assert_eq!(c.reason, "mentions the Woudestein");

        let c = interpret_response(r#"{"relevant": "no", "reason": "about a car model"}"#);
        assert_eq!(c.verdict, RelevanceVerdict::NotRelevant);
    }

    #[test]
    fn other_field_values_are_not_relevant() {
        let c = interpret_response(r#"{"relevant": "probably"}"#);
        assert_eq!(c.verdict, RelevanceVerdict::NotRelevant);
        let c = interpret_response(r#"{"relevant": 1}"#);
        assert_eq!(c.verdict, RelevanceVerdict::NotRelevant);
        let c = interpret_response(r#"{"relevance": true}"#);
        assert_eq!(c.verdict, RelevanceVerdict::Relevant);
    }

    #[test]
    fn double_encoded_answer_is_decoded_once() {
        let inner = r#"{"relevant":"yes","reason":"club news"}"#;
        let outer = serde_json::to_string(inner).unwrap();
        let c = interpret_response(&outer);
        assert_eq!(c.verdict, RelevanceVerdict::Relevant);
        assert_eq!(c.reason, "club news");

        let triple = serde_json::to_string(&outer).unwrap();
        assert_eq!(
            interpret_response(&triple).verdict,
            RelevanceVerdict::Indeterminate
        );
    }

    #[test]
    fn malformed_output_is_indeterminate() {
        let c = interpret_response(r#"{"relevant": "yes""#);
        assert_eq!(c.verdict, RelevanceVerdict::Indeterminate);
        assert!(c.reason.starts_with("unparseable model output"));

        let c = interpret_response(r#"{"answer": "yes"}"#);
        assert_eq!(c.verdict, RelevanceVerdict::Indeterminate);

        let c = interpret_response("[\"yes\"]");
        assert_eq!(c.verdict, RelevanceVerdict::Indeterminate);
    }
}
