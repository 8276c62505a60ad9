//! Payload extraction
//!
//! The upstream endpoints usually answer with a bare JSON array, but some
//! deployments wrap it in HTML or append diagnostics. Extraction tries a
//! straight parse first, then falls back to slicing out the array.

use crate::ingest::IngestError;
use serde_json::Value;
use tracing::{info, warn};

/// Number of payload characters quoted in the error when no array is found
const SAMPLE_LEN: usize = 200;

/// Parse `text` into the list of raw records it carries
pub fn extract_records(text: &str) -> Result<Vec<Value>, IngestError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => return Ok(items),
        Ok(_) => warn!("Payload is JSON but not an array, trying fallback extraction"),
        Err(_) => info!("Payload is not plain JSON, trying fallback extraction"),
    }

    if let Some(items) = extract_json_array(text) {
        info!("Fallback extraction found {} records", items.len());
        return Ok(items);
    }

    let sample: String = text
        .chars()
        .take(SAMPLE_LEN)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    Err(IngestError::NoJsonArray { sample })
}

/// Slice the first `[` through a closing `]` out of mixed content.
///
/// The last `]` is tried first, then every earlier `]` in turn, until a slice
/// parses as a JSON array.
pub fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    let start = text.find('[')?;

    let mut ends: Vec<usize> = text
        .match_indices(']')
        .map(|(idx, _)| idx)
        .filter(|&idx| idx > start)
        .collect();
    ends.reverse();

    ends.into_iter().find_map(|end| {
        match serde_json::from_str::<Value>(&text[start..=end]) {
            Ok(Value::Array(items)) => Some(items),
            _ => None,
        }
    })
}
