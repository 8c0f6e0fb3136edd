// src/extractors/json_recovery.rs
use crate::utils::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static CODE_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json|JSON)?").expect("Failed to compile CODE_FENCE_RE"));

/// Pulls the JSON object out of prose-wrapped model output.
///
/// Takes everything from the first `{` to the last `}`, drops any code-fence
/// markers and decodes the rest. Malformed structure is reported, not patched.
pub fn recover_json(text: &str) -> Result<Value, ExtractError> {
    let start = text.find('{').ok_or(ExtractError::MissingDelimiters)?;
    let end = text.rfind('}').ok_or(ExtractError::MissingDelimiters)?;
    if end < start {
        return Err(ExtractError::MissingDelimiters);
    }

    let payload = CODE_FENCE_RE
        .replace_all(&text[start..=end], "")
        .trim()
        .to_string();

    serde_json::from_str(&payload).map_err(|source| ExtractError::Decode { source, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_prose_and_fences() {
        let text = "Here is the data:\n```json\n{\"quarter\":\"Q2 FY25\",\"date\":\"2024-09-30\"}\n```";
        let value = recover_json(text).unwrap();
        assert_eq!(value, json!({"quarter": "Q2 FY25", "date": "2024-09-30"}));
    }

    #[test]
    fn keeps_nested_objects_intact() {
        let text = "Sure! {\"metrics\": {\"core_financials\": {\"revenue\": {\"value\": 12.5, \"unit\": \"INR Cr\"}}}} Hope this helps.";
        let value = recover_json(text).unwrap();
        assert_eq!(value["metrics"]["core_financials"]["revenue"]["value"], json!(12.5));
    }

    #[test]
    fn no_braces_is_missing_delimiters() {
        assert!(matches!(
            recover_json("I could not read the document."),
            Err(ExtractError::MissingDelimiters)
        ));
        assert!(matches!(
            recover_json("} backwards {"),
            Err(ExtractError::MissingDelimiters)
        ));
    }

    #[test]
    fn broken_json_is_a_decode_error_with_payload() {
        let text = "```json\n{\"quarter\": \"Q2\", \"date\": }\n```";
        match recover_json(text) {
            Err(ExtractError::Decode { payload, .. }) => {
                assert_eq!(payload, "{\"quarter\": \"Q2\", \"date\": }");
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }
}
