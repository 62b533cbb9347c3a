mod camera;
mod image;
mod input;
pub(crate) mod parse;
mod point;

use crate::Dataset;
use crate::config::LoadConfig;
use crate::error::FormatError;
use crate::filesystem::Filesystem;
use crate::formats::colmap::input::{InputData, InputFile, InputType};
use glam::Vec3;
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

// Binary files are preferred when both are present.
fn locate(fs: &Filesystem, stem: &str) -> Option<(PathBuf, bool)> {
    fs.file_ending_in(&format!("{stem}.bin"))
        .map(|path| (path, true))
        .or_else(|| fs.file_ending_in(&format!("{stem}.txt")).map(|path| (path, false)))
}

// Files belonging to the same model as `cameras`, binary first.
fn locate_in_model(model_dir: &Path, stem: &str) -> Option<(PathBuf, bool)> {
    [(format!("{stem}.bin"), true), (format!("{stem}.txt"), false)]
        .into_iter()
        .map(|(name, is_bin)| (model_dir.join(name), is_bin))
        .find(|(path, _)| path.is_file())
}

pub(crate) fn is_colmap(fs: &Filesystem) -> bool {
    locate(fs, "cameras").is_some()
}

async fn parse_file(
    fs: &Filesystem,
    path: &Path,
    input_type: InputType,
    is_bin: bool,
) -> Result<InputData, FormatError> {
    info!("Located {input_type:?} file at: {}", path.display());
    let reader = fs.reader_at_path(path).await?;
    InputFile::new(reader, input_type, is_bin).parse().await
}

pub async fn load(fs: &Filesystem, config: &LoadConfig) -> Result<Dataset, FormatError> {
    let Some((cam_path, is_bin)) = locate(fs, "cameras") else {
        return Err(FormatError::Io(String::from("Camera file could not be found")));
    };

    // Images and points are expected next to the cameras.
    let model_dir = cam_path
        .parent()
        .ok_or_else(|| FormatError::Io(String::from("Camera file has no parent directory")))?;
    let img_name = if is_bin { "images.bin" } else { "images.txt" };
    let img_path = model_dir.join(img_name);

    let cameras = parse_file(fs, &cam_path, InputType::Cameras, is_bin)
        .await?
        .as_cameras()
        .unwrap_or_default();
    let images = parse_file(fs, &img_path, InputType::Images, is_bin)
        .await?
        .as_images()
        .unwrap_or_default();

    let mut img_info_list = images.into_iter().collect::<Vec<_>>();
    img_info_list.sort_by(|a, b| a.1.name.cmp(&b.1.name));

    let mut views = HashMap::new();
    let mut warned_distortion = HashSet::new();

    for (img_id, img_info) in img_info_list
        .into_iter()
        .take(config.max_frames.unwrap_or(usize::MAX))
        .step_by(config.subsample_frames.unwrap_or(1).max(1) as usize)
    {
        let cam_data = cameras
            .get(&img_info.camera_id)
            .ok_or(FormatError::UnknownCamera {
                image: img_id,
                camera: img_info.camera_id,
            })?;

        if cam_data.model.is_distorted() && warned_distortion.insert(cam_data.id) {
            warn!(
                "Camera {} uses the {:?} model, distortion parameters are ignored",
                cam_data.id, cam_data.model
            );
        }

        let camera = render::CameraModel::new(
            img_info.name.clone(),
            cam_data.intrinsics()?,
            img_info.pose(),
        );
        views.insert(img_id, camera);
    }

    let Some((points_path, points_bin)) = locate_in_model(model_dir, "points3D") else {
        return Err(FormatError::Io(String::from("Could not find points file")));
    };
    let points_data = parse_file(fs, &points_path, InputType::Points3D, points_bin)
        .await?
        .as_points()
        .unwrap_or_default();

    let total_points = points_data.len();
    let mut points: Vec<_> = points_data
        .into_iter()
        .filter(|(_, p)| p.track_length() >= config.min_track_length)
        .collect();
    points.sort_by_key(|(id, _)| *id);

    let step = config.subsample_points.unwrap_or(1).max(1) as usize;
    let positions: Vec<Vec3> = points.iter().step_by(step).map(|(_, p)| p.xyz).collect();
    let colors: Vec<Vec3> = points.iter().step_by(step).map(|(_, p)| p.color()).collect();

    info!(
        "Starting from {} of {total_points} colmap points, {} views",
        positions.len(),
        views.len()
    );

    Ok(Dataset {
        positions,
        colors,
        views,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CAMERAS_TXT: &str = "# Camera list\n1 PINHOLE 64 48 50 50 32 24\n";
    const IMAGES_TXT: &str = "# Image list\n\
                              2 1 0 0 0 0 0 0 1 b.png\n\
                              \n\
                              1 1 0 0 0 0.5 0 0 1 a.png\n\
                              16 12 1\n";
    const POINTS_TXT: &str = "# 3D point list\n\
                              1 0 0 2 255 0 0 0.1 1 0 2 0\n\
                              2 0 0 3 0 255 0 0.1 1 1\n\
                              3 0.5 0 4 0 0 255 0.1 1 2 2 2 1 3\n";

    fn write_txt_reconstruction(root: &Path, images: &str) {
        let sparse = root.join("sparse").join("0");
        fs::create_dir_all(&sparse).unwrap();
        fs::write(sparse.join("cameras.txt"), CAMERAS_TXT).unwrap();
        fs::write(sparse.join("images.txt"), images).unwrap();
        fs::write(sparse.join("points3D.txt"), POINTS_TXT).unwrap();
    }

    #[tokio::test]
    async fn test_load_txt() {
        let dir = tempfile::tempdir().unwrap();
        write_txt_reconstruction(dir.path(), IMAGES_TXT);

        let fs = Filesystem::new(dir.path().to_path_buf());
        assert!(is_colmap(&fs));
        let dataset = load(&fs, &LoadConfig::new()).await.unwrap();

        assert_eq!(dataset.views.len(), 2);
        let view = &dataset.views[&1];
        assert_eq!(view.name(), "a.png");
        assert_eq!((view.width(), view.height()), (64, 48));
        assert_eq!(view.camera_center(), glam::vec3(-0.5, 0.0, 0.0));

        // The point seen by a single image is dropped.
        assert_eq!(
            dataset.positions,
            vec![glam::vec3(0.0, 0.0, 2.0), glam::vec3(0.5, 0.0, 4.0)]
        );
        assert_eq!(dataset.colors, vec![Vec3::X, Vec3::Z]);
    }

    #[tokio::test]
    async fn test_load_options() {
        let dir = tempfile::tempdir().unwrap();
        write_txt_reconstruction(dir.path(), IMAGES_TXT);
        let fs = Filesystem::new(dir.path().to_path_buf());

        let config = LoadConfig::new().with_min_track_length(1);
        assert_eq!(load(&fs, &config).await.unwrap().positions.len(), 3);

        let config = LoadConfig::new()
            .with_subsample_points(Some(2))
            .with_max_frames(Some(1));
        let dataset = load(&fs, &config).await.unwrap();
        assert_eq!(dataset.positions, vec![glam::vec3(0.0, 0.0, 2.0)]);
        assert_eq!(dataset.views.len(), 1);
        assert!(dataset.views.contains_key(&1));
    }

    #[tokio::test]
    async fn test_unknown_camera() {
        let dir = tempfile::tempdir().unwrap();
        write_txt_reconstruction(dir.path(), "5 1 0 0 0 0 0 0 9 c.png\n\n");
        let fs = Filesystem::new(dir.path().to_path_buf());

        let result = load(&fs, &LoadConfig::new()).await;
        assert!(matches!(
            result,
            Err(FormatError::UnknownCamera { image: 5, camera: 9 })
        ));
    }

    #[tokio::test]
    async fn test_missing_points() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cameras.txt"), CAMERAS_TXT).unwrap();
        fs::write(dir.path().join("images.txt"), IMAGES_TXT).unwrap();
        let fs = Filesystem::new(dir.path().to_path_buf());

        assert!(matches!(
            load(&fs, &LoadConfig::new()).await,
            Err(FormatError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_points_from_same_model() {
        let dir = tempfile::tempdir().unwrap();
        let stray = dir.path().join("sparse").join("0");
        fs::create_dir_all(&stray).unwrap();
        fs::write(stray.join("points3D.txt"), "not a point\n").unwrap();

        let model = dir.path().join("sparse").join("1");
        fs::create_dir_all(&model).unwrap();
        fs::write(model.join("cameras.txt"), CAMERAS_TXT).unwrap();
        fs::write(model.join("images.txt"), IMAGES_TXT).unwrap();
        fs::write(model.join("points3D.txt"), POINTS_TXT).unwrap();

        let fs = Filesystem::new(dir.path().to_path_buf());
        let dataset = load(&fs, &LoadConfig::new()).await.unwrap();
        assert_eq!(dataset.positions.len(), 2);
        assert_eq!(dataset.views.len(), 2);
    }

    #[tokio::test]
    async fn test_load_prefers_binary() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        let mut cameras = Vec::new();
        cameras.extend(1u64.to_le_bytes());
        cameras.extend(1i32.to_le_bytes());
        cameras.extend(0i32.to_le_bytes()); // SIMPLE_PINHOLE
        cameras.extend(32u64.to_le_bytes());
        cameras.extend(32u64.to_le_bytes());
        for p in [30.0f64, 16.0, 16.0] {
            cameras.extend(p.to_le_bytes());
        }

        let mut images = Vec::new();
        images.extend(1u64.to_le_bytes());
        images.extend(4i32.to_le_bytes());
        for v in [1.0f64, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0] {
            images.extend(v.to_le_bytes());
        }
        images.extend(1i32.to_le_bytes());
        images.extend(b"frame.png\0");
        images.extend(0u64.to_le_bytes());

        let mut points = Vec::new();
        points.extend(1u64.to_le_bytes());
        points.extend(3i64.to_le_bytes());
        for c in [0.0f64, 0.0, 1.5] {
            points.extend(c.to_le_bytes());
        }
        points.extend([0u8, 51, 255]);
        points.extend(0.2f64.to_le_bytes());
        points.extend(2u64.to_le_bytes());
        for v in [4i32, 0, 5, 0] {
            points.extend(v.to_le_bytes());
        }

        fs::write(root.join("cameras.bin"), cameras).unwrap();
        fs::write(root.join("images.bin"), images).unwrap();
        fs::write(root.join("points3D.bin"), points).unwrap();
        // Unparseable, must not be picked.
        fs::write(root.join("cameras.txt"), "garbage\n").unwrap();

        let fs = Filesystem::new(root.to_path_buf());
        let dataset = load(&fs, &LoadConfig::new()).await.unwrap();

        let view = &dataset.views[&4];
        assert_eq!(view.name(), "frame.png");
        assert_eq!(view.focal(), glam::vec2(30.0, 30.0));
        assert_eq!(dataset.positions, vec![glam::vec3(0.0, 0.0, 1.5)]);
        assert_eq!(dataset.colors, vec![glam::vec3(0.0, 0.2, 1.0)]);
    }
}
