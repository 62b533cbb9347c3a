pub(crate) mod colmap;

use crate::Dataset;
use crate::config::LoadConfig;
use crate::error::{DatasetError, Result};
use crate::filesystem::Filesystem;
use std::path::Path;

pub async fn load_dataset(path: impl AsRef<Path>, config: &LoadConfig) -> Result<Dataset> {
    let fs = Filesystem::new(path.as_ref().to_path_buf());

    if !colmap::is_colmap(&fs) {
        return Err(DatasetError::FormatNotSupported);
    }

    Ok(colmap::load(&fs, config).await?)
}
