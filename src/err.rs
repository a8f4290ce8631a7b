#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Failed processing a request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Http error: {0}")]
    Http(String),
    #[error("Parse error: {0}")]
    Parse(String),
    /// The encoded config failed its tamper checksum. Fatal: registration
    /// halts, a tampered config cannot be trusted.
    #[error("Config was tampered with: {0}")]
    Integrity(String),
    #[error("No module with short ID {0:?} is registered")]
    UnknownModule(String),
}
