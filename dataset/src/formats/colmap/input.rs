use crate::error::FormatError;
use crate::formats::colmap::camera::Camera;
use crate::formats::colmap::image::Image;
use crate::formats::colmap::parse::{CamerasParser, ImagesParser, Parseable, PointsParser, Reader};
use crate::formats::colmap::point::Point3D;
use std::collections::HashMap;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum InputType {
    Points3D = 0,
    Images = 1,
    Cameras = 2,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum InputFormat {
    Binary = 0,
    Text = 1,
}

#[derive(Debug)]
pub enum InputData {
    Images(HashMap<i32, Image>),
    Points3D(HashMap<i64, Point3D>),
    Cameras(HashMap<i32, Camera>),
}

impl InputData {
    pub fn as_images(self) -> Option<HashMap<i32, Image>> {
        if let InputData::Images(map) = self {
            Some(map)
        } else {
            None
        }
    }

    pub fn as_points(self) -> Option<HashMap<i64, Point3D>> {
        if let InputData::Points3D(map) = self {
            Some(map)
        } else {
            None
        }
    }

    pub fn as_cameras(self) -> Option<HashMap<i32, Camera>> {
        if let InputData::Cameras(map) = self {
            Some(map)
        } else {
            None
        }
    }
}

/// One of the three reconstruction files, ready to be parsed.
pub struct InputFile {
    parser: Box<dyn Parseable>,
    input_format: InputFormat,
    reader: Reader,
}

impl InputFile {
    pub fn new(reader: Reader, input_type: InputType, is_bin: bool) -> InputFile {
        let parser: Box<dyn Parseable> = match input_type {
            InputType::Cameras => Box::new(CamerasParser),
            InputType::Images => Box::new(ImagesParser),
            InputType::Points3D => Box::new(PointsParser),
        };

        Self {
            parser,
            input_format: if is_bin {
                InputFormat::Binary
            } else {
                InputFormat::Text
            },
            reader,
        }
    }

    pub async fn parse(self) -> Result<InputData, FormatError> {
        match self.input_format {
            InputFormat::Binary => self.parser.parse_bin(self.reader).await,
            InputFormat::Text => self.parser.parse_txt(self.reader).await,
        }
    }
}
