//! Adapter for reading interaction logs
//!
//! Input documents are parsed into untyped JSON records first so that a
//! single malformed record can be rejected without discarding the batch.

use crate::error::RetentionError;
use crate::schema::event::{Event, ValidationError};
use serde::Serialize;
use serde_json::Value;

/// Adapter for converting log documents into validated events
pub struct RecordAdapter;

impl RecordAdapter {
    /// Parse a JSON string containing an array of records
    pub fn parse_array(json: &str) -> Result<Vec<Value>, RetentionError> {
        let records: Vec<Value> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (newline-delimited JSON) containing one record per line
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<Value>, RetentionError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(RetentionError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Validate a batch of records, returning only the failures
    pub fn validate_records(records: &[Value]) -> Vec<RecordRejection> {
        records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                Event::from_value(record)
                    .err()
                    .map(|error| RecordRejection::new(index, record, error))
            })
            .collect()
    }
}

/// A record that failed validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordRejection {
    /// Position of the record in its batch
    pub index: usize,
    /// User field when it could be read
    pub user: Option<String>,
    #[serde(serialize_with = "serialize_error")]
    pub error: ValidationError,
}

impl RecordRejection {
    pub fn new(index: usize, record: &Value, error: ValidationError) -> Self {
        RecordRejection {
            index,
            user: record
                .get("user")
                .and_then(Value::as_str)
                .map(str::to_string),
            error,
        }
    }
}

fn serialize_error<S: serde::Serializer>(
    error: &ValidationError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let ndjson = r#"
{"user":"u","item":"i","timestamp":1,"message":"TEXT__WORD_HIGHLIGHTED"}

{"user":"u","item":"i","timestamp":2,"message":"REVISION__CLICKED"}
"#;
        let records = RecordAdapter::parse_ndjson(ndjson).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_parse_ndjson_reports_line_number() {
        let ndjson = "{\"user\":\"u\"}\nnot json\n";
        let err = RecordAdapter::parse_ndjson(ndjson).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_array() {
        let json = r#"[{"user":"u","item":"i","timestamp":1,"message":"TEXT__SENTENCE_READ"}]"#;
        let records = RecordAdapter::parse_array(json).unwrap();
        assert_eq!(records.len(), 1);
        assert!(RecordAdapter::parse_array("{}").is_err());
    }

    #[test]
    fn test_validate_records_collects_failures() {
        let json = r#"[
            {"user":"u","item":"i","timestamp":1,"message":"TEXT__SENTENCE_READ"},
            {"user":"bad","item":"i","timestamp":"1","message":"TEXT__SENTENCE_READ"},
            {"user":"u","item":"i","timestamp":3,"message":"NOPE"}
        ]"#;
        let records = RecordAdapter::parse_array(json).unwrap();
        let rejections = RecordAdapter::validate_records(&records);

        assert_eq!(rejections.len(), 2);
        assert_eq!(rejections[0].index, 1);
        assert_eq!(rejections[0].user.as_deref(), Some("bad"));
        assert_eq!(
            rejections[1].error,
            ValidationError::UnknownMessage("NOPE".to_string())
        );
    }
}
