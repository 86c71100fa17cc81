//! Remote score store port
//!
//! The store is an append-only table behind a spreadsheet web app. It has no
//! query filtering, no transactions and no row identity, and its column names
//! and envelope shape have drifted across backend revisions. Decoding is
//! lenient: a malformed field degrades to its default instead of
//! failing the whole read.

mod http;
mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use http::{HttpScoreStore, WriteEncoding};
pub use memory::MemoryStore;

use crate::score::{parse_score, ElapsedTime};
use crate::types::{PlayerScoreRecord, RoleTag, RowWrite};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to the remote store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("store returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("store rejected the request: {0}")]
    Rejected(String),

    #[error("store response could not be decoded: {0}")]
    Decode(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only access to the shared score table
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Append one row. There is no read-modify-write.
    async fn append(&self, row: &RowWrite) -> StoreResult<()>;

    /// Every row currently visible, across all game codes.
    ///
    /// `game_code` is only a hint for backends that can pre-filter; callers
    /// always filter the result themselves.
    async fn fetch_rows(&self, game_code: Option<&str>) -> StoreResult<Vec<PlayerScoreRecord>>;
}

/// Extract the row list from a read response.
///
/// Accepts `{success, data: [...]}` and the older `{success, data: {rsult: [...]}}`.
pub fn rows_from_envelope(envelope: Value) -> StoreResult<Vec<Value>> {
    let Value::Object(mut body) = envelope else {
        return Err(StoreError::Decode("response is not an object".to_string()));
    };

    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("success: false")
            .to_string();
        return Err(StoreError::Rejected(message));
    }

    match body.remove("data") {
        Some(Value::Array(rows)) => Ok(rows),
        Some(Value::Object(mut data)) => match data.remove("rsult") {
            Some(Value::Array(rows)) => Ok(rows),
            _ => Ok(Vec::new()),
        },
        _ => Ok(Vec::new()),
    }
}

/// Decode raw rows, dropping only rows that carry no player name at all.
pub fn decode_rows(rows: Vec<Value>) -> Vec<PlayerScoreRecord> {
    let total = rows.len();
    let records: Vec<PlayerScoreRecord> = rows.iter().filter_map(decode_record).collect();
    if records.len() < total {
        tracing::debug!("Skipped {} nameless store rows", total - records.len());
    }
    records
}

/// Decode one row, tolerating both column naming schemes.
pub fn decode_record(row: &Value) -> Option<PlayerScoreRecord> {
    let fields = row.as_object()?;

    let player_name = field(fields, &["player_name", "playerName"])
        .and_then(cell_text)
        .filter(|name| !name.is_empty())?;

    let game_code = field(fields, &["gaming", "gameCode"])
        .and_then(cell_text)
        .unwrap_or_default();

    let elapsed = field(fields, &["score"])
        .map(parse_score)
        .unwrap_or(ElapsedTime::Unfinished);

    let points = field(fields, &["points"]).map(parse_points).unwrap_or(0);

    let role = field(fields, &["place", "role"])
        .and_then(cell_text)
        .map(|text| RoleTag::parse(&text))
        .unwrap_or_default();

    Some(PlayerScoreRecord {
        game_code,
        player_name,
        elapsed,
        points,
        role,
    })
}

fn field<'a>(fields: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| fields.get(*name))
}

/// Strings are trimmed; numbers are printed the way the sheet shows them.
fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(
            n.as_i64()
                .map(|i| i.to_string())
                .unwrap_or_else(|| n.to_string()),
        ),
        _ => None,
    }
}

fn parse_points(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f as i64)
            .unwrap_or(0),
        _ => 0,
    }
}
