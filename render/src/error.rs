use thiserror::Error;

pub(crate) type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("No camera registered for view {0}")]
    UnknownView(i32),

    #[error("Dimension mismatch in {name} :: {actual} != {expected}")]
    DimMismatch {
        name: &'static str,
        actual: usize,
        expected: usize,
    },

    #[error("Can't render images with 0 size ({width}x{height})")]
    InvalidImageSize { width: u32, height: u32 },

    #[error("Tile size must be at least one pixel")]
    InvalidTileSize,
}
