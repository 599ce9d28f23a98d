//! Label templates delivered with dataset metadata.
//!
//! Templates are data, interpreted here, so a dataset can describe how its
//! items are titled without shipping executable code to the client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::map::ItemFields;

const ELLIPSIS: char = '…';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayTemplate {
    /// Value of a single field.
    Field { field: String },
    /// First field with a non-empty value.
    FirstNonEmpty { fields: Vec<String> },
    /// Non-empty field values joined by a separator.
    Join {
        fields: Vec<String>,
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// Text with `{field}` placeholders.
    Format { template: String },
    /// Inner template cut to at most `max_chars` characters.
    Truncate {
        inner: Box<DisplayTemplate>,
        max_chars: usize,
    },
    Literal { text: String },
}

fn default_separator() -> String {
    ", ".to_string()
}

impl DisplayTemplate {
    pub fn field(name: impl Into<String>) -> Self {
        DisplayTemplate::Field { field: name.into() }
    }

    pub fn render(&self, item: &ItemFields) -> String {
        match self {
            DisplayTemplate::Field { field } => field_text(item, field),
            DisplayTemplate::FirstNonEmpty { fields } => fields
                .iter()
                .map(|f| field_text(item, f))
                .find(|text| !text.is_empty())
                .unwrap_or_default(),
            DisplayTemplate::Join { fields, separator } => fields
                .iter()
                .map(|f| field_text(item, f))
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join(separator),
            DisplayTemplate::Format { template } => format_placeholders(template, item),
            DisplayTemplate::Truncate { inner, max_chars } => truncate(inner.render(item), *max_chars),
            DisplayTemplate::Literal { text } => text.clone(),
        }
    }
}

fn field_text(item: &ItemFields, field: &str) -> String {
    item.get(field).map(value_text).unwrap_or_default()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(values) => values
            .iter()
            .map(value_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

fn format_placeholders(template: &str, item: &ItemFields) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) if !after[..end].contains('{') => {
                out.push_str(&field_text(item, after[..end].trim()));
                rest = &after[end + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn truncate(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text;
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push(ELLIPSIS);
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> ItemFields {
        json!({
            "title": "Cats in Art",
            "year": 1999,
            "authors": ["Ann", "Bo"],
            "subtitle": "",
            "empty": null
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn field_lookup_renders_scalars_and_lists() {
        assert_eq!(DisplayTemplate::field("title").render(&item()), "Cats in Art");
        assert_eq!(DisplayTemplate::field("year").render(&item()), "1999");
        assert_eq!(DisplayTemplate::field("authors").render(&item()), "Ann, Bo");
        assert_eq!(DisplayTemplate::field("missing").render(&item()), "");
    }

    #[test]
    fn first_non_empty_skips_blank_fields() {
        let template = DisplayTemplate::FirstNonEmpty {
            fields: vec!["subtitle".into(), "empty".into(), "year".into()],
        };
        assert_eq!(template.render(&item()), "1999");
    }

    #[test]
    fn format_substitutes_placeholders() {
        let template = DisplayTemplate::Format {
            template: "{title} ({year}) by {authors} {unclosed".into(),
        };
        assert_eq!(template.render(&item()), "Cats in Art (1999) by Ann, Bo {unclosed");
    }

    #[test]
    fn join_and_truncate() {
        let joined = DisplayTemplate::Join {
            fields: vec!["title".into(), "subtitle".into(), "year".into()],
            separator: " · ".into(),
        };
        assert_eq!(joined.render(&item()), "Cats in Art · 1999");
        let cut = DisplayTemplate::Truncate {
            inner: Box::new(DisplayTemplate::field("title")),
            max_chars: 6,
        };
        assert_eq!(cut.render(&item()), "Cats …");
    }

    #[test]
    fn templates_parse_from_tagged_json() {
        let template: DisplayTemplate = serde_json::from_value(json!({
            "kind": "truncate",
            "max_chars": 10,
            "inner": {"kind": "join", "fields": ["a", "b"]}
        }))
        .unwrap();
        match template {
            DisplayTemplate::Truncate { inner, max_chars } => {
                assert_eq!(max_chars, 10);
                assert_eq!(
                    *inner,
                    DisplayTemplate::Join {
                        fields: vec!["a".into(), "b".into()],
                        separator: ", ".into()
                    }
                );
            }
            other => panic!("unexpected template {other:?}"),
        }
    }
}
