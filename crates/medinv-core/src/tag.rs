//! # Tag Payload Parser
//!
//! Extracts a record id from the text payload of an NFC tag.
//!
//! ## Payload Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  "enNFCNASAMED%lot7%12"                                                │
//! │                                                                         │
//! │   contains marker "NFCNASAMED"?  ── no ──►  ParsedTag::Unknown         │
//! │          │ yes                                                          │
//! │          ▼                                                              │
//! │   split on '%'  →  ["enNFCNASAMED", "lot7", "12"]                      │
//! │                          [0]          [1]    [2]                        │
//! │          │                                                              │
//! │          ▼                                                              │
//! │   field[2] is an integer?  ── no ──►  ParsedTag::Malformed(..)         │
//! │          │ yes                                                          │
//! │          ▼                                                              │
//! │   ParsedTag::Record(12)                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

/// Where the record id lives inside a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFormat {
    /// Substring that identifies our tags.
    pub marker: String,
    pub delimiter: char,
    /// Index of the id after splitting on `delimiter`.
    pub field_index: usize,
}

impl Default for TagFormat {
    fn default() -> Self {
        TagFormat {
            marker: "NFCNASAMED".to_string(),
            delimiter: '%',
            field_index: 2,
        }
    }
}

/// Result of parsing one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedTag {
    /// Our tag, carrying this record id.
    Record(i64),
    /// Not one of our tags; ignore it.
    Unknown,
    /// Our marker, but the id field is missing or not an integer.
    Malformed(String),
}

/// Parses a raw tag payload.
pub fn parse_payload(payload: &str, format: &TagFormat) -> ParsedTag {
    if !payload.contains(&format.marker) {
        return ParsedTag::Unknown;
    }

    let Some(field) = payload.split(format.delimiter).nth(format.field_index) else {
        return ParsedTag::Malformed(format!(
            "payload has no field {} after splitting on '{}'",
            format.field_index, format.delimiter
        ));
    };

    match field.trim().parse::<i64>() {
        Ok(id) => ParsedTag::Record(id),
        Err(_) => ParsedTag::Malformed(format!("field {} is not an integer: '{}'", format.field_index, field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_payload() {
        let format = TagFormat::default();
        assert_eq!(parse_payload("enNFCNASAMED%x%7", &format), ParsedTag::Record(7));
        assert_eq!(parse_payload("NFCNASAMED%%  15 %tail", &format), ParsedTag::Record(15));
    }

    #[test]
    fn test_parse_unknown_payload() {
        let format = TagFormat::default();
        assert_eq!(parse_payload("https://example.org", &format), ParsedTag::Unknown);
        assert_eq!(parse_payload("", &format), ParsedTag::Unknown);
    }

    #[test]
    fn test_parse_malformed_payload() {
        let format = TagFormat::default();
        assert!(matches!(parse_payload("NFCNASAMED%only", &format), ParsedTag::Malformed(_)));
        assert!(matches!(parse_payload("NFCNASAMED%a%b", &format), ParsedTag::Malformed(_)));
    }

    #[test]
    fn test_custom_format() {
        let format = TagFormat {
            marker: "WARD".to_string(),
            delimiter: ';',
            field_index: 1,
        };
        assert_eq!(parse_payload("WARD;99", &format), ParsedTag::Record(99));
    }
}
