use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetpeekError {
    #[error("Cannot enumerate processes: {0}")]
    ProcScan(std::io::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NetpeekError>;
