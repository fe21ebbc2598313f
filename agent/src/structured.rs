use crate::{Error, Result};
use serde_json::Value;

/// One named field the model must emit in its final answer.
#[derive(Clone)]
pub struct ResponseField {
    pub name: String,
    pub description: String,
}

impl ResponseField {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

/// An ordered set of response fields with strict extraction from model text.
pub struct ResponseFormat {
    fields: Vec<ResponseField>,
}

impl ResponseFormat {
    pub fn new(fields: Vec<ResponseField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[ResponseField] {
        &self.fields
    }

    /// Instructions appended to the prompt telling the model the exact output
    /// shape.
    pub fn format_instructions(&self) -> String {
        let mut s = String::from(
            "The output should be a markdown code snippet formatted in the following schema, \
             including the leading and trailing \"```json\" and \"```\":\n\n```json\n{\n",
        );
        for field in &self.fields {
            s.push_str(&format!(
                "\t\"{}\": string  // {}\n",
                field.name, field.description
            ));
        }
        s.push_str("}\n```");
        s
    }

    /// Strictly parses the final model text: every declared field must be
    /// present. Extra fields are kept.
    pub fn parse(&self, text: &str) -> Result<serde_json::Map<String, Value>> {
        let json = extract_json(text)?;

        let value: Value = serde_json::from_str(&json)?;
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(Error::ParseError(format!(
                    "expected a JSON object, got {}",
                    kind(&other)
                )));
            }
        };

        for field in &self.fields {
            if !map.contains_key(&field.name) {
                return Err(Error::ParseError(format!(
                    "field `{}` missing from model output",
                    field.name
                )));
            }
        }

        Ok(map)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Extracts the first JSON object from text that may contain surrounding
/// prose or a fenced code block.
pub fn extract_json(text: &str) -> Result<String> {
    let trimmed = text.trim();

    if trimmed.starts_with('{') && serde_json::from_str::<Value>(trimmed).is_ok() {
        return Ok(trimmed.to_string());
    }

    if let Some(json) = extract_from_fence(trimmed) {
        if serde_json::from_str::<Value>(&json).is_ok() {
            return Ok(json);
        }
    }

    if let Some(json) = extract_first_object(trimmed) {
        if serde_json::from_str::<Value>(&json).is_ok() {
            return Ok(json);
        }
    }

    Err(Error::ParseError(format!(
        "no valid JSON object found in model output (length={})",
        text.len()
    )))
}

fn extract_from_fence(text: &str) -> Option<String> {
    let start_markers = ["```json\n", "```json\r\n", "```\n", "```\r\n"];

    for marker in &start_markers {
        if let Some(start) = text.find(marker) {
            let json_start = start + marker.len();
            if let Some(end) = text[json_start..].find("```") {
                return Some(text[json_start..json_start + end].trim().to_string());
            }
        }
    }

    None
}

/// Finds the first balanced `{ ... }`, ignoring braces inside strings.
fn extract_first_object(text: &str) -> Option<String> {
    let mut depth = 0;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => {
                escape_next = true;
            }
            '"' => {
                in_string = !in_string;
            }
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        return Some(text[s..=i].to_string());
                    }
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> ResponseFormat {
        ResponseFormat::new(vec![
            ResponseField::new("altitude", "Orbital altitude in kilometers"),
            ResponseField::new("altitude_source", "Source URL for altitude information"),
        ])
    }

    #[test]
    fn test_format_instructions() {
        let instructions = format().format_instructions();
        assert!(instructions.starts_with("The output should be a markdown code snippet"));
        assert!(instructions.contains("\"altitude\": string  // Orbital altitude in kilometers"));
        assert!(instructions.contains("```json"));
    }

    #[test]
    fn test_parse_clean_json() {
        let map = format()
            .parse(r#"{"altitude": "540", "altitude_source": "http://x"}"#)
            .unwrap();
        assert_eq!(map["altitude"], "540");
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "Here is the data:\n```json\n{\"altitude\": \"540\", \"altitude_source\": \"http://x\"}\n```\nDone.";
        let map = format().parse(text).unwrap();
        assert_eq!(map["altitude_source"], "http://x");
    }

    #[test]
    fn test_parse_embedded_json() {
        let text = "The answer is {\"altitude\": \"540\", \"altitude_source\": \"http://x\"} as found.";
        let map = format().parse(text).unwrap();
        assert_eq!(map["altitude"], "540");
    }

    #[test]
    fn test_parse_keeps_extra_fields() {
        let map = format()
            .parse(r#"{"altitude": "540", "altitude_source": "http://x", "note": "extra"}"#)
            .unwrap();
        assert_eq!(map["note"], "extra");
    }

    #[test]
    fn test_parse_missing_field() {
        let err = format().parse(r#"{"altitude": "540"}"#).unwrap_err();
        assert!(err.to_string().contains("altitude_source"));
    }

    #[test]
    fn test_parse_not_an_object() {
        assert!(format().parse("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_parse_no_json() {
        assert!(format().parse("I could not find anything.").is_err());
    }

    #[test]
    fn test_braces_inside_strings() {
        let text = r#"note {"altitude": "540 {approx}", "altitude_source": "http://x"} end"#;
        let map = format().parse(text).unwrap();
        assert_eq!(map["altitude"], "540 {approx}");
    }
}
