use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid job parameters: {0}")]
    InvalidParams(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Job {0} not found")]
    JobNotFound(i64),

    #[error("Group {0} not found")]
    GroupNotFound(i64),

    #[error("{0}")]
    Other(String),
}
