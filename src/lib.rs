#![deny(rust_2018_idioms, unsafe_code, missing_docs)]
#![cfg_attr(not(doctest), doc = include_str!("../README.md"))]

//! # Examples
//!
//! ## Example - converting a detected marker pose into an engine view matrix.
//!
//! ```
//! use marker_views::*;
//! use nalgebra::Vector3;
//!
//! // A marker 500 units straight ahead of the camera, facing it.
//! let pose = RawPose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 500.0));
//!
//! let transform = to_engine_space(&pose.rvec, &pose.tvec);
//!
//! // In view space the marker is 5 engine units straight ahead.
//! approx::assert_abs_diff_eq!(
//!     transform.transform_point(&nalgebra::Point3::origin()),
//!     nalgebra::Point3::new(0.0, 0.0, 5.0),
//!     epsilon = 1e-12
//! );
//!
//! // The transform is rigid, so its inverse is cheap and always exists.
//! let roundtrip = transform * transform.inverse();
//! approx::assert_abs_diff_eq!(
//!     roundtrip.to_homogeneous(),
//!     nalgebra::Matrix4::identity(),
//!     epsilon = 1e-12
//! );
//! ```
//!
//! ## Example - composing the origin-relative view.
//!
//! ```
//! use marker_views::*;
//! use nalgebra::Vector3;
//!
//! let poses = [
//!     (ORIGIN_MARKER_ID, RawPose::new(Vector3::new(0.1, 0.2, 0.0), Vector3::new(10.0, 0.0, 400.0))),
//!     (7, RawPose::new(Vector3::new(0.0, 0.3, 0.0), Vector3::new(-80.0, 5.0, 420.0))),
//! ];
//! let markers = convert_detections(poses.iter().map(|(id, pose)| (*id, pose)));
//!
//! let mut rig = CameraRig::default();
//! let mut state = ViewerState::default();
//! state.mode = CameraMode::OriginRelative;
//!
//! let mut composer = ViewComposer::default();
//! let mut renderer = RecordingRenderer::default();
//! composer.compose(&markers, &state, &mut rig, &mut renderer);
//!
//! // One box per visible marker, all expressed relative to marker 100.
//! assert_eq!(renderer.box_placements().len(), 2);
//! ```

use std::path::PathBuf;

mod marker;
pub use marker::{find_marker, Marker, MarkerId, MARKER_LENGTH, ORIGIN_MARKER_ID};

pub mod convention;
pub use convention::{convert_detections, to_engine_space, RawPose};

mod intrinsics;
pub use intrinsics::{CameraIntrinsics, Distortion, PerspectiveParams};

mod camera;
pub use camera::{CameraMode, CameraRig, FlyCamera, Projection};

pub mod config;
pub use config::{Dictionary, DetectorParams, ViewerConfig};

mod render;
pub use render::{DrawCommand, RecordingRenderer, Renderer};

mod compose;
pub use compose::{box_base_placement, relative_to, ViewComposer};

pub mod input;
pub use input::{Effect, HeldKeys, InputEvent, Key, MouseButton, ViewerState};

mod pipeline;
pub use pipeline::{axis_overlay, AxisOverlay, Detection, Frame, FrameSource, MarkerBackend, MarkerPipeline};

pub mod replay;

mod viewer;
pub use viewer::Viewer;

/// All possible errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Reading a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A JSON document could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The camera matrix is not a normalized pinhole matrix.
    #[error("camera matrix is not a normalized pinhole camera matrix")]
    InvalidCameraMatrix,
    /// The camera calibration file could not be opened.
    #[error("camera calibration '{}' could not be opened", path.display())]
    MissingCalibration {
        /// Path of the calibration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The marker backend returned a different number of poses than detections.
    #[error("marker backend returned {poses} poses for {detections} detections")]
    PoseCountMismatch {
        /// Number of detections handed to the pose estimator.
        detections: usize,
        /// Number of poses returned.
        poses: usize,
    },
    /// The named marker dictionary is not known.
    #[error("unknown marker dictionary '{0}'")]
    UnknownDictionary(String),
    /// Camera modes are numbered 0 to 3.
    #[error("invalid camera mode {0}, expected 0-3")]
    InvalidMode(u8),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
