use crate::error::FormatError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CameraModel {
    SimplePinhole,
    Pinhole,
    SimpleRadial,
    Radial,
    OpenCV,
    OpenCvFishEye,
    FullOpenCV,
    Fov,
    SimpleRadialFisheye,
    RadialFisheye,
    ThinPrismFisheye,
}

impl CameraModel {
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(Self::SimplePinhole),
            1 => Some(Self::Pinhole),
            2 => Some(Self::SimpleRadial),
            3 => Some(Self::Radial),
            4 => Some(Self::OpenCV),
            5 => Some(Self::OpenCvFishEye),
            6 => Some(Self::FullOpenCV),
            7 => Some(Self::Fov),
            8 => Some(Self::SimpleRadialFisheye),
            9 => Some(Self::RadialFisheye),
            10 => Some(Self::ThinPrismFisheye),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SIMPLE_PINHOLE" => Some(Self::SimplePinhole),
            "PINHOLE" => Some(Self::Pinhole),
            "SIMPLE_RADIAL" => Some(Self::SimpleRadial),
            "RADIAL" => Some(Self::Radial),
            "OPENCV" => Some(Self::OpenCV),
            "OPENCV_FISHEYE" => Some(Self::OpenCvFishEye),
            "FULL_OPENCV" => Some(Self::FullOpenCV),
            "FOV" => Some(Self::Fov),
            "SIMPLE_RADIAL_FISHEYE" => Some(Self::SimpleRadialFisheye),
            "RADIAL_FISHEYE" => Some(Self::RadialFisheye),
            "THIN_PRISM_FISHEYE" => Some(Self::ThinPrismFisheye),
            _ => None,
        }
    }

    pub fn num_params(&self) -> usize {
        match self {
            Self::SimplePinhole => 3,
            Self::Pinhole => 4,
            Self::SimpleRadial => 4,
            Self::Radial => 5,
            Self::OpenCV => 8,
            Self::OpenCvFishEye => 8,
            Self::FullOpenCV => 12,
            Self::Fov => 5,
            Self::SimpleRadialFisheye => 4,
            Self::RadialFisheye => 5,
            Self::ThinPrismFisheye => 12,
        }
    }

    /// Models with a single shared focal length store `f, cx, cy, ..`, the others
    /// `fx, fy, cx, cy, ..`.
    fn has_shared_focal(&self) -> bool {
        matches!(
            self,
            Self::SimplePinhole
                | Self::SimpleRadial
                | Self::Radial
                | Self::SimpleRadialFisheye
                | Self::RadialFisheye
        )
    }

    /// Whether the model carries distortion terms the pinhole renderer ignores.
    pub fn is_distorted(&self) -> bool {
        !matches!(self, Self::SimplePinhole | Self::Pinhole)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Camera {
    pub id: i32,
    pub model: CameraModel,
    pub width: u64,
    pub height: u64,
    pub params: Vec<f64>,
}

impl Camera {
    fn param(&self, index: usize) -> Result<f32, FormatError> {
        self.params
            .get(index)
            .map(|&p| p as f32)
            .ok_or(FormatError::InvalidCamera("Missing camera parameters"))
    }

    pub fn focal(&self) -> Result<(f32, f32), FormatError> {
        let fx = self.param(0)?;
        let fy = if self.model.has_shared_focal() {
            fx
        } else {
            self.param(1)?
        };
        Ok((fx, fy))
    }

    pub fn principal_point(&self) -> Result<glam::Vec2, FormatError> {
        let offset = if self.model.has_shared_focal() { 1 } else { 2 };
        Ok(glam::vec2(self.param(offset)?, self.param(offset + 1)?))
    }

    pub fn intrinsics(&self) -> Result<render::Intrinsics, FormatError> {
        let (focal_x, focal_y) = self.focal()?;
        if focal_x <= 0.0 || focal_y <= 0.0 {
            return Err(FormatError::InvalidCamera("Focal length must be positive"));
        }
        let principal = self.principal_point()?;

        let width = u32::try_from(self.width)
            .map_err(|_| FormatError::InvalidCamera("Image width out of range"))?;
        let height = u32::try_from(self.height)
            .map_err(|_| FormatError::InvalidCamera("Image height out of range"))?;

        Ok(render::Intrinsics {
            focal_x,
            focal_y,
            principal_x: principal.x,
            principal_y: principal.y,
            width,
            height,
        })
    }
}
