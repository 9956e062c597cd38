use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("configuration error: {0}")]
    Config(String),
}
