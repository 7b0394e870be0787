use thiserror::Error;
use ticket_market_pool::PoolError;
use ticket_market_proto::ConfigError;

/// Errors that end a single vendor or customer task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("{task} was cancelled while {during}")]
    Cancelled { task: String, during: &'static str },

    #[error("{task} panicked: {message}")]
    Panicked { task: String, message: String },
}

/// Errors that stop a simulation from starting.
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("failed to access configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed configuration file: {0}")]
    Json(#[from] serde_json::Error),
}
