//! Spatial calibration of traced coordinates.

use serde::{Deserialize, Serialize};

use crate::error::{PathError, PathResult};

use super::core::{Point3, Vec3};

/// Unit label used when none is supplied.
pub const DEFAULT_UNIT: &str = "pixels";

/// Per-axis voxel spacing plus the physical unit those spacings are expressed in.
///
/// Coordinates stored in a [`PointBuffer`](super::PointBuffer) are already
/// multiplied by these spacings; the calibration is only needed to convert
/// back to pixel (unscaled) coordinates and to derive default radii.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    x_spacing: f64,
    y_spacing: f64,
    z_spacing: f64,
    unit: String,
}

impl Calibration {
    /// Create a calibration, rejecting non-finite or non-positive spacings.
    pub fn new(x_spacing: f64, y_spacing: f64, z_spacing: f64, unit: &str) -> PathResult<Self> {
        for (axis, value) in [("x", x_spacing), ("y", y_spacing), ("z", z_spacing)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PathError::InvalidCalibration {
                    reason: format!("{axis} spacing must be finite and positive, got {value}"),
                });
            }
        }
        Ok(Self {
            x_spacing,
            y_spacing,
            z_spacing,
            unit: sanitize_unit(unit),
        })
    }

    /// One unit per pixel on every axis.
    #[must_use]
    pub fn unit_pixels() -> Self {
        Self {
            x_spacing: 1.0,
            y_spacing: 1.0,
            z_spacing: 1.0,
            unit: DEFAULT_UNIT.to_owned(),
        }
    }

    #[must_use]
    pub const fn x_spacing(&self) -> f64 {
        self.x_spacing
    }

    #[must_use]
    pub const fn y_spacing(&self) -> f64 {
        self.y_spacing
    }

    #[must_use]
    pub const fn z_spacing(&self) -> f64 {
        self.z_spacing
    }

    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Spacings as a vector, handy for component-wise scaling.
    #[must_use]
    pub const fn spacing(&self) -> Vec3 {
        Vec3::new(self.x_spacing, self.y_spacing, self.z_spacing)
    }

    /// Smallest spacing across the three axes.
    #[must_use]
    pub fn min_separation(&self) -> f64 {
        self.x_spacing.min(self.y_spacing).min(self.z_spacing)
    }

    /// Convert a calibrated point to pixel coordinates, shifted by `offset`.
    #[must_use]
    pub fn to_unscaled(&self, point: Point3, offset: Vec3) -> Point3 {
        Point3::new(
            point.x / self.x_spacing + offset.x,
            point.y / self.y_spacing + offset.y,
            point.z / self.z_spacing + offset.z,
        )
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::unit_pixels()
    }
}

fn sanitize_unit(unit: &str) -> String {
    let trimmed = unit.trim();
    match trimmed.to_lowercase().as_str() {
        "" => DEFAULT_UNIT.to_owned(),
        "um" | "micron" | "microns" | "µm" => "µm".to_owned(),
        _ => trimmed.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_spacing() {
        assert!(matches!(
            Calibration::new(0.0, 1.0, 1.0, "um"),
            Err(PathError::InvalidCalibration { .. })
        ));
        assert!(Calibration::new(1.0, f64::NAN, 1.0, "um").is_err());
        assert!(Calibration::new(1.0, 1.0, -2.0, "um").is_err());
    }

    #[test]
    fn sanitizes_units() {
        assert_eq!(Calibration::new(1.0, 1.0, 1.0, " micron ").unwrap().unit(), "µm");
        assert_eq!(Calibration::new(1.0, 1.0, 1.0, "").unwrap().unit(), DEFAULT_UNIT);
        assert_eq!(Calibration::new(1.0, 1.0, 1.0, "nm").unwrap().unit(), "nm");
    }

    #[test]
    fn unscaled_divides_by_spacing_and_adds_offset() {
        let cal = Calibration::new(0.5, 0.25, 2.0, "um").unwrap();
        let p = cal.to_unscaled(Point3::new(1.0, 1.0, 4.0), Vec3::new(10.0, 0.0, -1.0));
        assert_eq!(p, Point3::new(12.0, 4.0, 1.0));
        assert_eq!(cal.min_separation(), 0.25);
    }
}
