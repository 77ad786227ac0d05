use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyzerError {
    #[error("missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("failed to read dataset: {0}")]
    Read(String),

    #[error("row {row}: invalid value {value:?} in column {column}: {reason}")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
        reason: String,
    },

    #[error("no dataset loaded; load a dataset first")]
    NoDataset,
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Success flag plus message, the shape every operation reports back to a caller.
#[derive(Debug, Serialize)]
pub struct Response<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Response<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> From<Result<T>> for Response<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Response::ok("ok", data),
            Err(err) => Response::failed(err.to_string()),
        }
    }
}
