use burn::prelude::Config;

#[derive(Config, Debug)]
pub struct LoadConfig {
    /// Max nr. of frames of dataset to load
    pub max_frames: Option<usize>,
    /// Load only every nth frame
    pub subsample_frames: Option<u32>,
    /// Load only every nth point from the initial sfm data
    pub subsample_points: Option<u32>,
    /// Only keep sfm points seen by at least this many images
    #[config(default = 2)]
    pub min_track_length: usize,
}
