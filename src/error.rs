use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),
    #[error("payload does not match the model record schema")]
    SchemaInvalid,
    #[error("preset name {0:?} already exists")]
    NameCollision(String),
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("failed to process thumbnail image: {0}")]
    Image(#[from] image::ImageError),
}
