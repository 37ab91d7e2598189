//! Core data model for checkerboard camera calibration.
//!
//! This crate is purely geometric. It knows nothing about capture devices,
//! corner detectors or solvers; those live behind traits in the sibling
//! crates and exchange the types defined here.

mod camera;
mod homography;
mod image;
mod logger;
mod pattern;
mod result;
mod sample;

use nalgebra::{Matrix3, Point2, Point3, Vector3};

pub type Real = f64;
pub type Pt2 = Point2<Real>;
pub type Pt3 = Point3<Real>;
pub type Vec3 = Vector3<Real>;
pub type Mat3 = Matrix3<Real>;

pub use camera::{Distortion, Intrinsics, ViewPose};
pub use homography::{estimate_homography, Homography};
pub use image::{sample_bilinear, GrayImage, GrayImageView};
pub use pattern::{GridSize, PatternError, ReferencePattern};
pub use result::{CalibrationResult, Resolution};
pub use sample::{CalibrationSample, Observation, SampleError, SampleSet};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
