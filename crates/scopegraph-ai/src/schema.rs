//! Structured LLM adapter (C8): renders a prompt from `{system_prompt,
//! user_task, output_schema, data}`, derives the structured-output
//! instructions from the schema itself, and parses the response strictly
//! against it.

use std::collections::HashMap;
use std::sync::Arc;

use scopegraph_core::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::provider::LlmProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub nested: Option<Box<OutputSchema>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSchema {
    pub root: String,
    pub fields: Vec<SchemaField>,
}

impl OutputSchema {
    /// Turns the schema into the natural-language instructions a model
    /// needs to produce conforming JSON — the "adapter derives instructions
    /// from the schema" requirement.
    pub fn derive_instructions(&self) -> String {
        let mut lines = vec![format!("Respond with a single JSON object named `{}` with exactly these fields:", self.root)];
        for field in &self.fields {
            let marker = if field.required { "required" } else { "optional" };
            lines.push(format!("- {} ({}, {}): {}", field.name, type_name(field.field_type), marker, field.description));
            if let Some(nested) = &field.nested {
                for inner in &nested.fields {
                    lines.push(format!("  - {}.{}: {}", field.name, inner.name, inner.description));
                }
            }
        }
        lines.push("Return only the JSON object, with no surrounding prose or markdown fences.".to_string());
        lines.join("\n")
    }

    fn required_fields(&self) -> impl Iterator<Item = &SchemaField> {
        self.fields.iter().filter(|f| f.required)
    }
}

fn type_name(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String => "string",
        FieldType::Number => "number",
        FieldType::Boolean => "boolean",
        FieldType::Array => "array",
        FieldType::Object => "object",
    }
}

/// A minimal template supporting `{{var}}` substitution, `{{#if var}}...{{/if}}`
/// conditionals, and `{{#each arr}}...{{/each}}` iteration over a
/// `data: serde_json::Value` context — just enough for the four-part
/// `{system_prompt, user_task, output_schema, data}` prompt shape.
pub struct PromptTemplate {
    source: String,
}

impl PromptTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }

    pub fn render(&self, vars: &HashMap<String, Value>) -> String {
        render_block(&self.source, vars)
    }
}

fn render_block(source: &str, vars: &HashMap<String, Value>) -> String {
    let mut out = String::new();
    let mut rest = source;
    loop {
        let Some(start) = rest.find("{{") else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            break;
        };
        let tag = after[..end].trim();
        rest = &after[end + 2..];

        if let Some(cond) = tag.strip_prefix("#if ") {
            let (body, remainder) = split_block(rest, "#if", "/if");
            if is_truthy(vars.get(cond.trim())) {
                out.push_str(&render_block(body, vars));
            }
            rest = remainder;
        } else if let Some(each) = tag.strip_prefix("#each ") {
            let (body, remainder) = split_block(rest, "#each", "/each");
            if let Some(Value::Array(items)) = vars.get(each.trim()) {
                for item in items {
                    let mut scoped = vars.clone();
                    scoped.insert("this".to_string(), item.clone());
                    out.push_str(&render_block(body, &scoped));
                }
            }
            rest = remainder;
        } else {
            out.push_str(&value_to_string(vars.get(tag)));
        }
    }
    out
}

/// Finds the matching `{{/tag}}` for a just-opened `{{#tag ...}}`, honoring
/// nesting of the same tag kind, and returns `(body, after_close)`.
fn split_block<'a>(rest: &'a str, open_tag: &str, close_tag: &str) -> (&'a str, &'a str) {
    let open_marker = format!("{{{{{open_tag}");
    let close_marker = format!("{{{{{close_tag}}}}}");
    let mut depth = 1usize;
    let mut cursor = 0usize;
    while let Some(next_close) = rest[cursor..].find(&close_marker) {
        let close_at = cursor + next_close;
        let next_open = rest[cursor..close_at].find(&open_marker);
        match next_open {
            Some(open_at) if cursor + open_at < close_at => {
                depth += 1;
                cursor = cursor + open_at + open_marker.len();
            }
            _ => {
                depth -= 1;
                if depth == 0 {
                    let body = &rest[..close_at];
                    let after = &rest[close_at + close_marker.len()..];
                    return (body, after);
                }
                cursor = close_at + close_marker.len();
            }
        }
    }
    (rest, "")
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn value_to_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Sits on top of a provider: renders the four-part prompt, sends it, and
/// parses the reply strictly against the declared schema.
pub struct StructuredLlmAdapter {
    provider: Arc<dyn LlmProvider>,
}

impl StructuredLlmAdapter {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub async fn generate_structured(
        &self,
        system_prompt: &str,
        user_task: &str,
        schema: &OutputSchema,
        data: Value,
    ) -> Result<Value, CoreError> {
        let prompt = format!(
            "{system_prompt}\n\n{user_task}\n\n{instructions}\n\nData:\n{data}",
            instructions = schema.derive_instructions(),
            data = serde_json::to_string_pretty(&data).unwrap_or_default(),
        );
        let raw = self.provider.generate(&prompt).await?;
        parse_structured_response(&raw, schema)
    }
}

/// Strict parse against `schema`: a missing required field is not a parse
/// failure, it's the "empty-summary marker" the caller surfaces as a
/// diagnostic (§4.8).
pub fn parse_structured_response(raw: &str, schema: &OutputSchema) -> Result<Value, CoreError> {
    let json_str = extract_json_object(raw).ok_or_else(|| CoreError::EmptySummary { entity: schema.root.clone() })?;
    let parsed: Value =
        serde_json::from_str(json_str).map_err(|e| CoreError::EmptySummary { entity: format!("{}: {e}", schema.root) })?;

    let object = parsed.as_object().ok_or_else(|| CoreError::EmptySummary { entity: schema.root.clone() })?;
    for field in schema.required_fields() {
        if !object.contains_key(&field.name) || object[&field.name].is_null() {
            return Err(CoreError::EmptySummary { entity: format!("{}.{}", schema.root, field.name) });
        }
    }
    Ok(parsed)
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> OutputSchema {
        OutputSchema {
            root: "summary".to_string(),
            fields: vec![
                SchemaField { name: "text".to_string(), field_type: FieldType::String, description: "one sentence".to_string(), required: true, nested: None },
                SchemaField { name: "confidence".to_string(), field_type: FieldType::Number, description: "0-1".to_string(), required: false, nested: None },
            ],
        }
    }

    #[test]
    fn instructions_name_every_field_and_its_requiredness() {
        let instructions = schema().derive_instructions();
        assert!(instructions.contains("text (string, required)"));
        assert!(instructions.contains("confidence (number, optional)"));
    }

    #[test]
    fn parse_rejects_missing_required_field() {
        let err = parse_structured_response(r#"{"confidence": 0.9}"#, &schema()).unwrap_err();
        assert!(matches!(err, CoreError::EmptySummary { .. }));
    }

    #[test]
    fn parse_extracts_json_from_surrounding_prose() {
        let raw = "Sure, here you go:\n```json\n{\"text\": \"it parses scopes\"}\n```";
        let parsed = parse_structured_response(raw, &schema()).unwrap();
        assert_eq!(parsed["text"], "it parses scopes");
    }

    #[test]
    fn template_substitutes_conditionals_and_loops() {
        let template = PromptTemplate::new("Hello {{name}}{{#if urgent}} (urgent){{/if}}. Items: {{#each items}}{{this}}, {{/each}}");
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), Value::String("Widget".to_string()));
        vars.insert("urgent".to_string(), Value::Bool(true));
        vars.insert("items".to_string(), Value::Array(vec![Value::String("a".into()), Value::String("b".into())]));
        let rendered = template.render(&vars);
        assert_eq!(rendered, "Hello Widget (urgent). Items: a, b, ");
    }
}
