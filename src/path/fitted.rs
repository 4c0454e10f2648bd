//! Refined ("fitted") representation of a path.
//!
//! A [`FittedPath`] is derived from its raw [`Path`] and never edited on its
//! own: its type tag and order are only written through the owning path,
//! which keeps both representations in step.

use std::fmt;

use crate::geom::PointBuffer;

use super::Path;
use super::swc::SwcType;

/// Refined geometry attached to a raw path.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedPath {
    points: PointBuffer,
    swc_type: SwcType,
    order: usize,
}

impl FittedPath {
    pub(crate) const fn new(points: PointBuffer, swc_type: SwcType, order: usize) -> Self {
        Self {
            points,
            swc_type,
            order,
        }
    }

    #[must_use]
    pub const fn points(&self) -> &PointBuffer {
        &self.points
    }

    #[must_use]
    pub const fn swc_type(&self) -> SwcType {
        self.swc_type
    }

    #[must_use]
    pub const fn order(&self) -> usize {
        self.order
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.points.len()
    }

    pub(crate) fn sync_swc_type(&mut self, swc_type: SwcType) {
        self.swc_type = swc_type;
    }

    pub(crate) fn sync_order(&mut self, order: usize) {
        self.order = order;
    }

    pub(crate) fn into_points(self) -> PointBuffer {
        self.points
    }
}

/// The representation of a path that is currently in use.
#[derive(Debug, Clone, Copy)]
pub enum PathView<'a> {
    Raw(&'a Path),
    Fitted {
        raw: &'a Path,
        refined: &'a FittedPath,
    },
}

impl<'a> PathView<'a> {
    /// The raw path behind this view.
    #[must_use]
    pub const fn raw(&self) -> &'a Path {
        match *self {
            Self::Raw(raw) | Self::Fitted { raw, .. } => raw,
        }
    }

    #[must_use]
    pub const fn is_fitted(&self) -> bool {
        matches!(self, Self::Fitted { .. })
    }

    #[must_use]
    pub fn points(&self) -> &'a PointBuffer {
        match *self {
            Self::Raw(raw) => raw.points(),
            Self::Fitted { refined, .. } => refined.points(),
        }
    }

    #[must_use]
    pub fn swc_type(&self) -> SwcType {
        match *self {
            Self::Raw(raw) => raw.swc_type(),
            Self::Fitted { refined, .. } => refined.swc_type(),
        }
    }

    #[must_use]
    pub fn order(&self) -> usize {
        match *self {
            Self::Raw(raw) => raw.order(),
            Self::Fitted { refined, .. } => refined.order(),
        }
    }

    #[must_use]
    pub fn length(&self) -> f64 {
        self.points().length()
    }
}

impl fmt::Display for PathView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.raw();
        f.write_str(&super::display_label(
            &raw.name(),
            self.points().len(),
            self.swc_type(),
        ))
    }
}
