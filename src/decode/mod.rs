use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty response body")]
    Empty,

    #[error("unparsable response body: {reason}")]
    Unparsable { reason: String },
}

/// Parses a raw HTTP response body, tolerating the corruption shapes the
/// backend is known to produce: a spurious `[]` prefix glued onto the real
/// payload, and arbitrary noise around a single JSON object.
///
/// Valid JSON of any kind (including `null`, `true`, bare numbers) is
/// returned as-is. Recovery is attempted only once parsing the whole body
/// has failed, prefix strip first, brace scan second. If neither recovery
/// yields valid JSON the result is an explicit error, never a partial value.
pub fn decode(text: &str) -> Result<Value, DecodeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::Empty);
    }

    let first_err = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let Some(rest) = trimmed.strip_prefix("[]") {
        let rest = rest.trim_start();
        if !rest.is_empty() {
            if let Ok(value) = serde_json::from_str::<Value>(rest) {
                return Ok(value);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(DecodeError::Unparsable {
        reason: first_err.to_string(),
    })
}
