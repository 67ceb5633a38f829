//! Crate-wide error taxonomy.
//!
//! Mirrors the recoverability classes spec'd for this system: transient
//! network errors are handled in place by the collector (never surfaced up
//! as an [`Err`]); parse errors are logged and dropped; configuration errors
//! are fatal at startup. These types exist at the module boundaries that
//! need to distinguish those classes programmatically rather than just by
//! log level.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("websocket connect failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("no connection with spare capacity and none could be opened")]
    NoCapacity,

    #[error("send failed on connection {conn_idx}: {source}")]
    Send {
        conn_idx: usize,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("frame missing stream/channel field")]
    MissingStream,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("value `{value}` for field `{field}` is not numeric")]
    NotNumeric { field: &'static str, value: String },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response shape from {0}")]
    UnexpectedShape(String),
}
