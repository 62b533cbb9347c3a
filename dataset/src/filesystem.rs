use crate::formats::colmap::parse::Reader;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, BufReader};
use walkdir::WalkDir;

#[derive(Clone)]
pub struct Filesystem {
    root: PathBuf,
}

impl Filesystem {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// First file (in file name order) named `target_filename`, ignoring case.
    pub fn file_ending_in(&self, target_filename: &str) -> Option<PathBuf> {
        let target = target_filename.to_lowercase();
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .find_map(|entry| {
                let path = entry.path();
                let filename = path.file_name()?.to_str()?.to_lowercase();
                (entry.file_type().is_file() && filename == target).then(|| path.to_path_buf())
            })
    }

    pub async fn reader_at_path(&self, path: &Path) -> tokio::io::Result<Reader> {
        let file: Box<dyn AsyncRead + Send + Unpin> = Box::new(tokio::fs::File::open(path).await?);
        Ok(BufReader::new(file))
    }
}
