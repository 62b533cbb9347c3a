use thiserror::Error;

pub(crate) type Result<T> = std::result::Result<T, DatasetError>;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("IO error while loading dataset: {0}")]
    Io(String),

    #[error("File IO error: {0}")]
    File(#[from] tokio::io::Error),

    #[error("Error decoding camera parameters: {0}")]
    InvalidCamera(&'static str),

    #[error("Unsupported camera model: {0}")]
    UnsupportedModel(String),

    #[error("Malformed record: {0}")]
    InvalidRecord(String),

    #[error("Image {image} references unknown camera {camera}")]
    UnknownCamera { image: i32, camera: i32 },
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to load format: {0}")]
    FormatError(#[from] FormatError),

    #[error("Format not recognized: Only colmap reconstructions are supported.")]
    FormatNotSupported,

    #[error("Failed to create splats: {0}")]
    Render(#[from] render::RenderError),
}
