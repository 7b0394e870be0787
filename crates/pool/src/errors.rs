use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("invalid pool configuration: {field} must be positive, got {value}")]
    InvalidConfiguration { field: &'static str, value: i64 },
}
