//! Replay of recorded marker sessions.
//!
//! A recording stores, per captured frame, the markers the vision library
//! reported. [`ReplaySource`] and [`ReplayBackend`] feed it back through a
//! [`MarkerPipeline`](crate::MarkerPipeline) without a camera.
//!
//! ```json
//! {
//!   "frames": [
//!     [{ "id": 100, "corners": [[0, 0], [10, 0], [10, 10], [0, 10]],
//!        "rvec": [0.0, 0.1, 0.0], "tvec": [5.0, -3.0, 420.0] }],
//!     null
//!   ]
//! }
//! ```
//!
//! A `null` frame is a failed capture.

use std::io::Read;
use std::path::Path;

use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

use crate::{
    CameraIntrinsics, Detection, DetectorParams, Dictionary, FrameSource, MarkerBackend, MarkerId,
    RawPose, Result,
};

/// One marker as reported by the vision library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedMarker {
    /// Marker id.
    pub id: MarkerId,
    /// Image corners.
    pub corners: [[f64; 2]; 4],
    /// Rotation vector.
    pub rvec: [f64; 3],
    /// Translation vector.
    pub tvec: [f64; 3],
}

impl RecordedMarker {
    fn detection(&self) -> Detection {
        Detection {
            id: self.id,
            corners: self.corners.map(|[x, y]| Point2::new(x, y)),
        }
    }

    fn pose(&self) -> RawPose {
        RawPose::new(Vector3::from(self.rvec), Vector3::from(self.tvec))
    }
}

/// A recorded session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    /// Frames in capture order.
    pub frames: Vec<Option<Vec<RecordedMarker>>>,
}

impl Recording {
    /// Read a recording from JSON.
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self> {
        Ok(serde_json::from_reader(rdr)?)
    }

    /// Read a recording from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }
}

/// An image of a replayed session.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayImage {
    /// Position of the frame in the recording.
    pub position: usize,
    /// The markers visible in this image.
    pub markers: Vec<RecordedMarker>,
}

/// Plays back the frames of a recording.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    frames: std::vec::IntoIter<Option<Vec<RecordedMarker>>>,
    position: usize,
}

impl ReplaySource {
    /// Create a source playing `recording` once.
    pub fn new(recording: Recording) -> Self {
        Self {
            frames: recording.frames.into_iter(),
            position: 0,
        }
    }

    /// Return `true` once every recorded frame was played.
    pub fn is_exhausted(&self) -> bool {
        self.frames.as_slice().is_empty()
    }
}

impl FrameSource for ReplaySource {
    type Image = ReplayImage;

    fn grab(&mut self) -> Option<ReplayImage> {
        let frame = self.frames.next()?;
        let position = self.position;
        self.position += 1;
        frame.map(|markers| ReplayImage { position, markers })
    }
}

/// Reports the markers stored in a [`ReplayImage`].
///
/// Poses are taken from the recording, so `marker_length` and the intrinsics
/// passed to [`MarkerBackend::estimate_poses`] have no effect.
#[derive(Debug, Clone, Default)]
pub struct ReplayBackend {
    poses: Vec<RawPose>,
}

impl MarkerBackend<ReplayImage> for ReplayBackend {
    fn detect_markers(
        &mut self,
        image: &ReplayImage,
        _dictionary: Dictionary,
        _params: &DetectorParams,
    ) -> Vec<Detection> {
        self.poses = image.markers.iter().map(RecordedMarker::pose).collect();
        image.markers.iter().map(RecordedMarker::detection).collect()
    }

    fn estimate_poses(
        &mut self,
        detections: &[Detection],
        _marker_length: f64,
        _intrinsics: &CameraIntrinsics,
    ) -> Vec<RawPose> {
        let mut poses = std::mem::take(&mut self.poses);
        poses.truncate(detections.len());
        poses
    }
}
