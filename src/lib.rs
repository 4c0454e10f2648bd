#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::cast_precision_loss)]

//! Data model and topology engine for traced neuronal paths.
//!
//! A [`Path`] is a calibrated 3D polyline with optional per-node radii,
//! tangents, colors and values. Paths live in a [`PathSet`], which joins the
//! start or end of one path onto another, keeps the adjacency between joined
//! paths symmetric and derives branch orders and display trees from the
//! joins. Paths can be simplified with a windowed Ramer–Douglas–Peucker
//! downsampler that never moves a path end or a join point.
//!
//! ```
//! use neurite_engine::{Calibration, DownsampleOptions, Path, PathSet, Point3};
//!
//! let cal = Calibration::new(0.5, 0.5, 1.0, "um")?;
//! let trunk: Vec<Point3> = (0..=10).map(|i| Point3::new(f64::from(i), 0.0, 0.0)).collect();
//! let branch = [Point3::new(5.0, 0.0, 0.0), Point3::new(5.0, 4.0, 0.0)];
//!
//! let mut set = PathSet::new();
//! let trunk = set.insert(Path::from_points(cal.clone(), &trunk))?;
//! let branch = set.insert(Path::from_points(cal, &branch))?;
//! set.set_start_join(branch, trunk, Point3::new(5.0, 0.0, 0.0))?;
//! assert_eq!(set.path(branch).map(Path::order), Some(2));
//!
//! set.downsample(trunk, DownsampleOptions::new(0.1))?;
//! assert_eq!(set.path(trunk).map(Path::size), Some(3));
//! # Ok::<(), neurite_engine::PathError>(())
//! ```
//!
//! The crate never installs a logger; diagnostics go through the `log` facade.

pub mod error;
pub mod geom;
pub mod graph;
pub mod path;

pub use error::{PathError, PathResult};
pub use geom::{
    Calibration, DownsampleDiagnostics, DownsampleOptions, NodeColor, Point3, PointBuffer,
    PointTransformer, Transform, Vec3,
};
pub use graph::id::PathId;
pub use graph::join::{Join, JoinEnd, JoinError, JoinState};
pub use graph::topo::TopologyError;
pub use graph::{PathSet, PathSummary};
pub use path::fitted::{FittedPath, PathView};
pub use path::swc::SwcType;
pub use path::{Path, ROOT_ORDER};
