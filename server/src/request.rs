//! Flexible `/query` request parsing
//!
//! The endpoint accepts plain text (one statement) and, for JSON bodies,
//! three shapes discriminated by the outermost JSON kind: a bare string, an
//! array of strings and statement objects, or an object (single statement or
//! a `queries` batch whose items inherit the top-level `txId`). One decoder
//! handles every statement object.

use nsqlited_core::Param;
use thiserror::Error;

/// One parsed statement of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementReq {
    pub tx_id: String,
    pub sql: String,
    pub params: Vec<Param>,
}

impl StatementReq {
    fn bare(sql: &str) -> Self { Self { tx_id: String::new(), sql: sql.to_string(), params: Vec::new() } }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("empty query")]
    EmptyQuery,
    #[error("no valid query found")]
    NoQuery,
    #[error("invalid array item")]
    InvalidArrayItem,
    #[error("invalid query object")]
    InvalidQueryObject,
    #[error("unsupported JSON structure")]
    UnsupportedShape,
    #[error("request body is not valid UTF-8")]
    NotUtf8,
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

/// Parse a request body into its ordered statement list.
pub fn parse(content_type: Option<&str>, body: &[u8]) -> Result<Vec<StatementReq>, ParseError> {
    if !is_json(content_type) {
        let text = std::str::from_utf8(body).map_err(|_| ParseError::NotUtf8)?.trim();
        if text.is_empty() {
            return Err(ParseError::EmptyQuery);
        }
        return Ok(vec![StatementReq::bare(text)]);
    }

    let raw: serde_json::Value = serde_json::from_slice(body)?;
    match raw {
        serde_json::Value::String(sql) => {
            let sql = sql.trim();
            if sql.is_empty() {
                return Err(ParseError::EmptyQuery);
            }
            Ok(vec![StatementReq::bare(sql)])
        }

        serde_json::Value::Array(items) => {
            let mut statements = Vec::with_capacity(items.len());
            for item in &items {
                match item {
                    serde_json::Value::String(sql) => {
                        let sql = sql.trim();
                        if sql.is_empty() {
                            return Err(ParseError::EmptyQuery);
                        }
                        statements.push(StatementReq::bare(sql));
                    }
                    serde_json::Value::Object(map) => statements.push(decode_statement(map, "", ParseError::EmptyQuery)?),
                    _ => return Err(ParseError::InvalidArrayItem),
                }
            }
            Ok(statements)
        }

        serde_json::Value::Object(map) => {
            let top_level_tx_id = map.get("txId").and_then(serde_json::Value::as_str).unwrap_or("");

            if let Some(queries) = map.get("queries") {
                let items = queries.as_array().ok_or(ParseError::InvalidQueryObject)?;
                let mut statements = Vec::with_capacity(items.len());
                for item in items {
                    let object = item.as_object().ok_or(ParseError::InvalidQueryObject)?;
                    statements.push(decode_statement(object, top_level_tx_id, ParseError::EmptyQuery)?);
                }
                return Ok(statements);
            }

            Ok(vec![decode_statement(&map, top_level_tx_id, ParseError::NoQuery)?])
        }

        _ => Err(ParseError::UnsupportedShape),
    }
}

/// Decode one `{query, params?, txId?}` object. A missing `txId` inherits
/// the surrounding one.
fn decode_statement(
    map: &serde_json::Map<String, serde_json::Value>,
    inherited_tx_id: &str,
    empty_error: ParseError,
) -> Result<StatementReq, ParseError> {
    let sql = map.get("query").and_then(serde_json::Value::as_str).unwrap_or("").trim().to_string();
    if sql.is_empty() {
        return Err(empty_error);
    }

    let tx_id = map.get("txId").and_then(serde_json::Value::as_str).unwrap_or(inherited_tx_id).to_string();
    let params = map
        .get("params")
        .and_then(serde_json::Value::as_array)
        .map(|items| items.iter().map(Param::from_json).collect())
        .unwrap_or_default();

    Ok(StatementReq { tx_id, sql, params })
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsqlited_core::ParamValue;

    const JSON: Option<&str> = Some("application/json");

    #[test]
    fn plain_text_is_one_statement() {
        let statements = parse(Some("text/plain"), b"  SELECT 1  ").unwrap();
        assert_eq!(statements, vec![StatementReq::bare("SELECT 1")]);

        // Missing content type behaves the same.
        let statements = parse(None, b"SELECT 1").unwrap();
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn json_string_is_one_statement() {
        let statements = parse(JSON, br#""SELECT 1""#).unwrap();
        assert_eq!(statements, vec![StatementReq::bare("SELECT 1")]);
    }

    #[test]
    fn json_array_mixes_strings_and_objects() {
        let body = br#"["SELECT 1", {"query": "INSERT INTO t(v) VALUES(?)", "params": ["a"], "txId": "abc"}]"#;
        let statements = parse(JSON, body).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].sql, "SELECT 1");
        assert_eq!(statements[1].sql, "INSERT INTO t(v) VALUES(?)");
        assert_eq!(statements[1].tx_id, "abc");
        assert_eq!(statements[1].params, vec![Param::positional(ParamValue::Text("a".to_string()))]);
    }

    #[test]
    fn json_object_is_one_statement() {
        let body = br#"{"query": "SELECT 1", "txId": "t1"}"#;
        let statements = parse(JSON, body).unwrap();
        assert_eq!(statements[0].sql, "SELECT 1");
        assert_eq!(statements[0].tx_id, "t1");
    }

    #[test]
    fn batch_inherits_top_level_tx_id() {
        let body = br#"{"txId": "top", "queries": [{"query": "SELECT 1"}, {"query": "SELECT 2", "txId": "own"}]}"#;
        let statements = parse(JSON, body).unwrap();
        assert_eq!(statements[0].tx_id, "top");
        assert_eq!(statements[1].tx_id, "own");
    }

    #[test]
    fn object_params_carry_names() {
        let body = br#"{"query": "SELECT :v", "params": [{"name": "v", "value": 3}]}"#;
        let statements = parse(JSON, body).unwrap();
        assert_eq!(statements[0].params, vec![Param::named("v", ParamValue::Integer(3))]);
    }

    #[test]
    fn empty_statements_are_rejected_everywhere() {
        assert!(matches!(parse(Some("text/plain"), b"   "), Err(ParseError::EmptyQuery)));
        assert!(matches!(parse(JSON, br#""""#), Err(ParseError::EmptyQuery)));
        assert!(matches!(parse(JSON, br#"["SELECT 1", ""]"#), Err(ParseError::EmptyQuery)));
        assert!(matches!(parse(JSON, br#"{"txId": "t"}"#), Err(ParseError::NoQuery)));
        assert!(matches!(parse(JSON, br#"{"queries": [{}]}"#), Err(ParseError::EmptyQuery)));
    }

    #[test]
    fn invalid_shapes_are_rejected() {
        assert!(matches!(parse(JSON, b"42"), Err(ParseError::UnsupportedShape)));
        assert!(matches!(parse(JSON, br#"[42]"#), Err(ParseError::InvalidArrayItem)));
        assert!(matches!(parse(JSON, br#"{"queries": [42]}"#), Err(ParseError::InvalidQueryObject)));
        assert!(matches!(parse(JSON, br#"{"queries": 42}"#), Err(ParseError::InvalidQueryObject)));
        assert!(parse(JSON, b"{not json").is_err());
    }

    #[test]
    fn content_type_parameters_are_ignored() {
        let statements = parse(Some("application/json; charset=utf-8"), br#""SELECT 1""#).unwrap();
        assert_eq!(statements.len(), 1);
    }
}
