use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("i2c error: {0}")]
    I2c(String),
    #[error("camera error: {0}")]
    Camera(String),
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for HwError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => HwError::Io(io),
            other => HwError::Camera(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, HwError>;
