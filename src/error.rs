use thiserror::Error;

#[derive(Debug, Error)]
pub enum CellmonError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("capture process not running (connection refused)")]
    ConnectionRefused,

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("identifier out of decode domain: {0}")]
    DecodeDomain(String),

    #[error("reference dataset load failed: {0}")]
    ReferenceLoad(String),

    #[error("reference lookup unavailable: {0}")]
    LookupUnavailable(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CellmonError>;
