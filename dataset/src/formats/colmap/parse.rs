use crate::error::FormatError;
use crate::formats::colmap::camera::{Camera, CameraModel};
use crate::formats::colmap::image::Image;
use crate::formats::colmap::input::InputData;
use crate::formats::colmap::point::Point3D;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

pub type Reader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;

// Counts come straight from the file, so they only size the first allocation up to this.
const MAX_PREALLOC: usize = 4096;

fn prealloc(count: u64) -> usize {
    usize::try_from(count).unwrap_or(usize::MAX).min(MAX_PREALLOC)
}

pub struct PointsParser;
pub struct ImagesParser;
pub struct CamerasParser;

type ParseResult = Pin<Box<dyn Future<Output = Result<InputData, FormatError>> + Send>>;

pub trait Parseable: Send + Sync {
    fn parse_bin(&self, reader: Reader) -> ParseResult;
    fn parse_txt(&self, reader: Reader) -> ParseResult;
}

fn parse<T: std::str::FromStr>(s: &str) -> Result<T, FormatError> {
    s.parse()
        .map_err(|_e| FormatError::InvalidRecord(format!("Can't parse '{s}'")))
}

fn field<'a>(parts: &[&'a str], index: usize) -> Result<&'a str, FormatError> {
    parts.get(index).copied().ok_or_else(|| {
        FormatError::InvalidRecord(format!("Expected at least {} fields", index + 1))
    })
}

// Reads the next line that isn't blank or a comment. Returns false at the end of the file.
async fn next_record(reader: &mut Reader, line: &mut String) -> Result<bool, FormatError> {
    loop {
        line.clear();
        if reader.read_line(line).await? == 0 {
            return Ok(false);
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            return Ok(true);
        }
    }
}

impl Parseable for ImagesParser {
    fn parse_bin(&self, mut reader: Reader) -> ParseResult {
        Box::pin(async move {
            let mut images = HashMap::new();
            let num_images = reader.read_u64_le().await?;

            for _ in 0..num_images {
                let image_id = reader.read_i32_le().await?;

                let [w, x, y, z] = [
                    reader.read_f64_le().await? as f32,
                    reader.read_f64_le().await? as f32,
                    reader.read_f64_le().await? as f32,
                    reader.read_f64_le().await? as f32,
                ];
                let quat = glam::quat(x, y, z, w);

                let tvec = glam::vec3(
                    reader.read_f64_le().await? as f32,
                    reader.read_f64_le().await? as f32,
                    reader.read_f64_le().await? as f32,
                );

                let camera_id = reader.read_i32_le().await?;
                let mut name_bytes = Vec::new();
                reader.read_until(b'\0', &mut name_bytes).await?;
                if name_bytes.pop() != Some(b'\0') {
                    return Err(FormatError::InvalidRecord(format!(
                        "Unterminated name for image {image_id}"
                    )));
                }

                let name = String::from_utf8(name_bytes).map_err(|_e| {
                    FormatError::InvalidRecord(format!("Image {image_id} name is not utf-8"))
                })?;

                let num_points2d = reader.read_u64_le().await?;
                let mut xys = Vec::with_capacity(prealloc(num_points2d));
                let mut point3d_ids = Vec::with_capacity(prealloc(num_points2d));

                for _ in 0..num_points2d {
                    xys.push(glam::Vec2::new(
                        reader.read_f64_le().await? as f32,
                        reader.read_f64_le().await? as f32,
                    ));
                    point3d_ids.push(reader.read_i64_le().await?);
                }

                images.insert(
                    image_id,
                    Image {
                        tvec,
                        quat,
                        camera_id,
                        name,
                        xys,
                        point3d_ids,
                    },
                );
            }

            Ok(InputData::Images(images))
        })
    }

    fn parse_txt(&self, mut reader: Reader) -> ParseResult {
        Box::pin(async move {
            let mut images = HashMap::new();
            let mut line = String::new();

            while next_record(&mut reader, &mut line).await? {
                let elems: Vec<&str> = line.split_whitespace().collect();
                let id: i32 = parse(field(&elems, 0)?)?;

                let [w, x, y, z] = [
                    parse(field(&elems, 1)?)?,
                    parse(field(&elems, 2)?)?,
                    parse(field(&elems, 3)?)?,
                    parse(field(&elems, 4)?)?,
                ];
                let quat = glam::quat(x, y, z, w);
                let tvec = glam::vec3(
                    parse(field(&elems, 5)?)?,
                    parse(field(&elems, 6)?)?,
                    parse(field(&elems, 7)?)?,
                );
                let camera_id: i32 = parse(field(&elems, 8)?)?;
                let name = field(&elems, 9)?.to_owned();

                // The keypoint line always follows, even when it's empty.
                line.clear();
                reader.read_line(&mut line).await?;
                let elems: Vec<&str> = line.split_whitespace().collect();
                let mut xys = Vec::new();
                let mut point3d_ids = Vec::new();

                for chunk in elems.chunks(3) {
                    let [x, y, point3d_id] = chunk else {
                        return Err(FormatError::InvalidRecord(format!(
                            "Incomplete keypoint for image {id}"
                        )));
                    };
                    xys.push(glam::vec2(parse(x)?, parse(y)?));
                    point3d_ids.push(parse(point3d_id)?);
                }

                images.insert(
                    id,
                    Image {
                        tvec,
                        quat,
                        camera_id,
                        name,
                        xys,
                        point3d_ids,
                    },
                );
            }

            Ok(InputData::Images(images))
        })
    }
}

impl Parseable for PointsParser {
    fn parse_bin(&self, mut reader: Reader) -> ParseResult {
        Box::pin(async move {
            let mut points3d = HashMap::new();
            let num_points = reader.read_u64_le().await?;

            for _ in 0..num_points {
                let point3d_id = reader.read_i64_le().await?;
                let xyz = glam::Vec3::new(
                    reader.read_f64_le().await? as f32,
                    reader.read_f64_le().await? as f32,
                    reader.read_f64_le().await? as f32,
                );
                let rgb = [
                    reader.read_u8().await?,
                    reader.read_u8().await?,
                    reader.read_u8().await?,
                ];
                let error = reader.read_f64_le().await?;

                let track_length = reader.read_u64_le().await?;
                let mut image_ids = Vec::with_capacity(prealloc(track_length));
                let mut point2d_idxs = Vec::with_capacity(prealloc(track_length));

                for _ in 0..track_length {
                    image_ids.push(reader.read_i32_le().await?);
                    point2d_idxs.push(reader.read_i32_le().await?);
                }

                points3d.insert(
                    point3d_id,
                    Point3D {
                        xyz,
                        rgb,
                        error,
                        image_ids,
                        point2d_idxs,
                    },
                );
            }

            Ok(InputData::Points3D(points3d))
        })
    }

    fn parse_txt(&self, mut reader: Reader) -> ParseResult {
        Box::pin(async move {
            let mut points3d = HashMap::new();
            let mut line = String::new();

            while next_record(&mut reader, &mut line).await? {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() < 8 {
                    return Err(FormatError::InvalidRecord(format!(
                        "Invalid point3D data: {}",
                        line.trim()
                    )));
                }

                let id: i64 = parse(parts[0])?;
                let xyz = glam::Vec3::new(parse(parts[1])?, parse(parts[2])?, parse(parts[3])?);
                let rgb = [
                    parse::<u8>(parts[4])?,
                    parse::<u8>(parts[5])?,
                    parse::<u8>(parts[6])?,
                ];
                let error: f64 = parse(parts[7])?;

                let mut image_ids = Vec::new();
                let mut point2d_idxs = Vec::new();

                for chunk in parts[8..].chunks(2) {
                    let [image_id, point2d_idx] = chunk else {
                        return Err(FormatError::InvalidRecord(format!(
                            "Invalid track data for point3D {id}"
                        )));
                    };
                    image_ids.push(parse(image_id)?);
                    point2d_idxs.push(parse(point2d_idx)?);
                }

                points3d.insert(
                    id,
                    Point3D {
                        xyz,
                        rgb,
                        error,
                        image_ids,
                        point2d_idxs,
                    },
                );
            }

            Ok(InputData::Points3D(points3d))
        })
    }
}

impl Parseable for CamerasParser {
    fn parse_bin(&self, mut reader: Reader) -> ParseResult {
        Box::pin(async move {
            let mut cameras = HashMap::new();
            let num_cameras = reader.read_u64_le().await?;

            for _ in 0..num_cameras {
                let camera_id = reader.read_i32_le().await?;
                let model_id = reader.read_i32_le().await?;
                let width = reader.read_u64_le().await?;
                let height = reader.read_u64_le().await?;

                let model = CameraModel::from_id(model_id)
                    .ok_or_else(|| FormatError::UnsupportedModel(model_id.to_string()))?;

                let num_params = model.num_params();
                let mut params = Vec::with_capacity(num_params);
                for _ in 0..num_params {
                    params.push(reader.read_f64_le().await?);
                }

                cameras.insert(
                    camera_id,
                    Camera {
                        id: camera_id,
                        model,
                        width,
                        height,
                        params,
                    },
                );
            }

            Ok(InputData::Cameras(cameras))
        })
    }

    fn parse_txt(&self, mut reader: Reader) -> ParseResult {
        Box::pin(async move {
            let mut cameras = HashMap::new();
            let mut line = String::new();

            while next_record(&mut reader, &mut line).await? {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() < 4 {
                    return Err(FormatError::InvalidRecord(format!(
                        "Invalid camera data: {}",
                        line.trim()
                    )));
                }

                let id = parse(parts[0])?;
                let model = CameraModel::from_name(parts[1])
                    .ok_or_else(|| FormatError::UnsupportedModel(parts[1].to_owned()))?;

                let width = parse(parts[2])?;
                let height = parse(parts[3])?;
                let params: Vec<f64> = parts[4..]
                    .iter()
                    .map(|&s| parse(s))
                    .collect::<Result<_, _>>()?;

                if params.len() != model.num_params() {
                    return Err(FormatError::InvalidCamera(
                        "Invalid number of camera parameters",
                    ));
                }

                cameras.insert(
                    id,
                    Camera {
                        id,
                        model,
                        width,
                        height,
                        params,
                    },
                );
            }

            Ok(InputData::Cameras(cameras))
        })
    }
}
