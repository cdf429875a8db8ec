use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{RankError, Result};
use crate::storage::Strategy;

/// Envelope around every JSON document `crank` prints.
#[derive(Debug, Serialize)]
pub struct Response<T> {
    pub status: Status,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    pub data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Error { code: String, message: String },
}

pub fn ok<T: Serialize>(strategy: Option<Strategy>, data: T) -> Response<T> {
    Response {
        status: Status::Ok,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        strategy,
        data,
    }
}

pub fn error(err: &RankError) -> Response<serde_json::Value> {
    Response {
        status: Status::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        },
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        strategy: None,
        data: serde_json::Value::Null,
    }
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| RankError::Serialization(format!("serialize output: {err}")))?;
    println!("{payload}");
    Ok(())
}
