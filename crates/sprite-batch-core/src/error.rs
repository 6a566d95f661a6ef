use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpriteBatchError {
    #[error("Invalid atlas dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Image {0:?} is already registered")]
    DuplicateImage(crate::model::ImageId),
}

pub type Result<T> = std::result::Result<T, SpriteBatchError>;
