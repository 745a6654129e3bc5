use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaValidationError {
    #[error("baseline input is not valid json: {0:?}")]
    BadJson(#[from] serde_json::Error),
    #[error("baseline input must be a json array of queries")]
    NotAnArray,
    #[error("query at index {0} is not a string")]
    NotAString(usize),
    #[error("query at index {0} is empty")]
    EmptyQuery(usize),
}

/// Parse and validate a baseline input document into its query list.
/// Queries keep their input order; identity is positional.
pub fn parse_queries(raw: &str) -> Result<Vec<String>, SchemaValidationError> {
    let document: Value = serde_json::from_str(raw)?;
    let items = match document {
        Value::Array(items) => items,
        _ => return Err(SchemaValidationError::NotAnArray),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::String(query) if query.trim().is_empty() => {
                Err(SchemaValidationError::EmptyQuery(index))
            }
            Value::String(query) => Ok(query),
            _ => Err(SchemaValidationError::NotAString(index)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_query_list_parses_in_order() {
        let queries = parse_queries(r#"["what is 2+2?", "what is the capital of peru?"]"#).unwrap();
        assert_eq!(
            queries,
            vec![
                "what is 2+2?".to_string(),
                "what is the capital of peru?".to_string()
            ]
        );
    }

    #[test]
    fn empty_array_is_valid() {
        let queries = parse_queries("[]").unwrap();
        assert!(queries.is_empty());
    }

    #[test]
    fn non_array_document_is_rejected() {
        let result = parse_queries(r#"{"queries": []}"#);
        assert!(matches!(result, Err(SchemaValidationError::NotAnArray)));
    }

    #[test]
    fn non_string_item_is_rejected_by_index() {
        let result = parse_queries(r#"["fine", 42]"#);
        assert!(matches!(result, Err(SchemaValidationError::NotAString(1))));
    }

    #[test]
    fn blank_query_is_rejected_by_index() {
        let result = parse_queries(r#"["fine", "  "]"#);
        assert!(matches!(result, Err(SchemaValidationError::EmptyQuery(1))));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let result = parse_queries("[\"unterminated");
        assert!(matches!(result, Err(SchemaValidationError::BadJson(_))));
    }
}
