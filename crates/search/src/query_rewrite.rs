//! Quoted phrases → structured text filters.
//!
//! Embedding-based retrieval has no notion of an exact phrase, so for vector
//! and hybrid searches `"exact words"` becomes a `contains` filter and
//! `-"words"` a `does_not_contain` filter. Keyword search understands quoting
//! natively and is left alone.

use protocol::{Filter, FilterOperator, SearchParameters, SearchType};
use serde_json::Value;

/// Pseudo-field covering all short descriptive text fields of an item.
pub const DESCRIPTIVE_TEXT_FIELDS: &str = "_descriptive_text_fields";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotedPhrase {
    pub text: String,
    pub negated: bool,
}

/// Splits `text` into the remaining query and its quoted phrases.
///
/// Positive phrases stay in the query without their quotes when
/// `keep_positive_text` is set; negated ones (`-"..."`) are always removed.
/// An unterminated quote is left as typed.
pub fn split_quoted(text: &str, keep_positive_text: bool) -> (String, Vec<QuotedPhrase>) {
    let mut remaining = String::with_capacity(text.len());
    let mut phrases = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('"') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('"') else {
            break;
        };
        let before = &rest[..open];
        let negated = before
            .strip_suffix('-')
            .is_some_and(|prefix| prefix.chars().last().is_none_or(char::is_whitespace));
        let before = if negated { &before[..before.len() - 1] } else { before };
        remaining.push_str(before);

        let phrase = after[..close].trim();
        if !phrase.is_empty() {
            if keep_positive_text && !negated {
                remaining.push_str(phrase);
            }
            phrases.push(QuotedPhrase {
                text: phrase.to_string(),
                negated,
            });
        }
        rest = &after[close + 1..];
    }
    remaining.push_str(rest);
    let remaining = remaining.split_whitespace().collect::<Vec<_>>().join(" ");
    (remaining, phrases)
}

/// Moves quoted phrases of a free-text query into filters.
///
/// Returns the number of filters added. Filters already present with the same
/// operator and value are not duplicated.
pub fn extract_phrase_filters(search: &mut SearchParameters) -> usize {
    if !search.retrieval_mode.uses_vectors()
        || search.use_separate_queries
        || search.search_type != SearchType::ExternalInput
    {
        return 0;
    }

    let (query, positive) = split_quoted(&search.all_field_query, true);
    let (negative_query, negative) = split_quoted(&search.all_field_query_negative, false);
    if positive.is_empty() && negative.is_empty() {
        return 0;
    }
    search.all_field_query = query;
    search.all_field_query_negative = negative_query;

    let wanted = positive
        .into_iter()
        .map(|p| {
            let operator = if p.negated {
                FilterOperator::DoesNotContain
            } else {
                FilterOperator::Contains
            };
            (operator, p.text)
        })
        .chain(negative.into_iter().map(|p| (FilterOperator::DoesNotContain, p.text)));

    let mut added = 0;
    for (operator, text) in wanted {
        let value = Value::String(text);
        let exists = search
            .filters
            .iter()
            .any(|f| f.operator == operator && f.value == value);
        if !exists {
            search.filters.push(Filter::new(DESCRIPTIVE_TEXT_FIELDS, operator, value));
            added += 1;
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::RetrievalMode;
    use pretty_assertions::assert_eq;

    fn params(query: &str, negative: &str, mode: RetrievalMode) -> SearchParameters {
        SearchParameters {
            all_field_query: query.to_string(),
            all_field_query_negative: negative.to_string(),
            retrieval_mode: mode,
            ..SearchParameters::default()
        }
    }

    #[test]
    fn splits_positive_and_negated_phrases() {
        let (rest, phrases) = split_quoted(r#"cats "black fur" -"dogs" in art"#, true);
        assert_eq!(rest, "cats black fur in art");
        assert_eq!(
            phrases,
            vec![
                QuotedPhrase {
                    text: "black fur".into(),
                    negated: false
                },
                QuotedPhrase {
                    text: "dogs".into(),
                    negated: true
                },
            ]
        );
    }

    #[test]
    fn hyphenated_words_are_not_negations() {
        let (rest, phrases) = split_quoted(r#"state-"of the art""#, true);
        assert!(!phrases[0].negated);
        assert_eq!(rest, "state-of the art");
    }

    #[test]
    fn unterminated_quotes_are_kept() {
        let (rest, phrases) = split_quoted(r#"say "hello"#, true);
        assert!(phrases.is_empty());
        assert_eq!(rest, r#"say "hello"#);
    }

    #[test]
    fn hybrid_search_gets_filters() {
        let mut search = params(r#"cats "tabby" -"dog""#, r#""mouse" toy"#, RetrievalMode::Hybrid);
        assert_eq!(extract_phrase_filters(&mut search), 3);
        assert_eq!(search.all_field_query, "cats tabby");
        assert_eq!(search.all_field_query_negative, "toy");
        let ops: Vec<_> = search.filters.iter().map(|f| (f.operator, f.value.clone())).collect();
        assert_eq!(
            ops,
            vec![
                (FilterOperator::Contains, Value::from("tabby")),
                (FilterOperator::DoesNotContain, Value::from("dog")),
                (FilterOperator::DoesNotContain, Value::from("mouse")),
            ]
        );
        assert!(search.filters.iter().all(|f| f.field == DESCRIPTIVE_TEXT_FIELDS));
    }

    #[test]
    fn filters_are_deduplicated_by_value() {
        let mut search = params(r#""tabby" "tabby""#, "", RetrievalMode::Vector);
        assert_eq!(extract_phrase_filters(&mut search), 1);
        search.all_field_query = r#"more "tabby""#.to_string();
        assert_eq!(extract_phrase_filters(&mut search), 0);
        assert_eq!(search.filters.len(), 1);
    }

    #[test]
    fn keyword_search_is_untouched() {
        let mut search = params(r#"cats "tabby""#, "", RetrievalMode::Keyword);
        assert_eq!(extract_phrase_filters(&mut search), 0);
        assert_eq!(search.all_field_query, r#"cats "tabby""#);
        assert!(search.filters.is_empty());
    }
}
