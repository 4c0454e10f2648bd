//! Geometry primitives and point storage for traced paths.

mod calibration;
mod core;
mod downsample;
mod points;

pub use calibration::{Calibration, DEFAULT_UNIT};
pub use core::{Point3, PointTransformer, Tolerance, Transform, Vec3};
pub use downsample::{DownsampleDiagnostics, DownsampleOptions, downsample_buffer, simplify_window};
pub use points::{
    DEFAULT_RESERVE, DEFAULT_TANGENT_WINDOW, GROWTH_FACTOR, NodeColor, PointBuffer,
};
