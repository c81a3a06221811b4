//! One capture/detect/estimate/convert step per rendered frame.

use itertools::Itertools;
use nalgebra::{Point2, Point3, Rotation3};

use crate::{
    convert_detections, CameraIntrinsics, DetectorParams, Dictionary, Error, Marker, MarkerId,
    RawPose, Result, MARKER_LENGTH,
};

/// A marker found in an image, before pose estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// The decoded marker id.
    pub id: MarkerId,
    /// Image corners, clockwise starting top-left.
    pub corners: [Point2<f64>; 4],
}

/// A source of camera images.
pub trait FrameSource {
    /// The image type produced.
    type Image;

    /// Grab the next image, or `None` if the capture failed.
    fn grab(&mut self) -> Option<Self::Image>;
}

/// Marker detection and pose estimation on images of type `I`.
pub trait MarkerBackend<I> {
    /// Find all markers of `dictionary` in `image`.
    fn detect_markers(
        &mut self,
        image: &I,
        dictionary: Dictionary,
        params: &DetectorParams,
    ) -> Vec<Detection>;

    /// Estimate one pose per detection, in detection order.
    fn estimate_poses(
        &mut self,
        detections: &[Detection],
        marker_length: f64,
        intrinsics: &CameraIntrinsics,
    ) -> Vec<RawPose>;
}

/// A marker's axes projected onto the video image.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisOverlay {
    /// The marker id.
    pub id: MarkerId,
    /// Marker center.
    pub origin: Point2<f64>,
    /// End of the marker X axis.
    pub x: Point2<f64>,
    /// End of the marker Y axis.
    pub y: Point2<f64>,
    /// End of the marker Z axis.
    pub z: Point2<f64>,
}

/// Project a marker's axes, drawn at half the marker length, to pixels.
///
/// Returns `None` if the marker center or an axis end is not in front of the
/// camera.
pub fn axis_overlay(
    id: MarkerId,
    pose: &RawPose,
    marker_length: f64,
    intrinsics: &CameraIntrinsics,
) -> Option<AxisOverlay> {
    let rotation = Rotation3::new(pose.rvec);
    let half = marker_length * 0.5;
    let project = |x: f64, y: f64, z: f64| {
        let pt = rotation * Point3::new(x, y, z) + pose.tvec;
        intrinsics.camera_to_pixel(&pt)
    };
    Some(AxisOverlay {
        id,
        origin: project(0.0, 0.0, 0.0)?,
        x: project(half, 0.0, 0.0)?,
        y: project(0.0, half, 0.0)?,
        z: project(0.0, 0.0, half)?,
    })
}

/// The result of one pipeline tick.
#[derive(Debug, Clone)]
pub struct Frame<I> {
    /// Number of successfully captured frames before this one.
    pub index: u64,
    /// The captured image.
    pub image: I,
    /// All detections, duplicates included.
    pub detections: Vec<Detection>,
    /// Converted markers, at most one per id.
    pub markers: Vec<Marker>,
    /// Axis overlays, one per marker in front of the camera.
    pub overlays: Vec<AxisOverlay>,
}

/// Runs capture, detection, pose estimation and conversion.
#[derive(Debug)]
pub struct MarkerPipeline<S, B> {
    source: S,
    backend: B,
    dictionary: Dictionary,
    params: DetectorParams,
    intrinsics: CameraIntrinsics,
    marker_length: f64,
    frame_count: u64,
}

impl<S, B> MarkerPipeline<S, B>
where
    S: FrameSource,
    B: MarkerBackend<S::Image>,
{
    /// Create a new pipeline using the default marker length.
    pub fn new(
        source: S,
        backend: B,
        dictionary: Dictionary,
        params: DetectorParams,
        intrinsics: CameraIntrinsics,
    ) -> Self {
        Self {
            source,
            backend,
            dictionary,
            params,
            intrinsics,
            marker_length: MARKER_LENGTH,
            frame_count: 0,
        }
    }

    /// Set the physical marker side length.
    pub fn with_marker_length(mut self, marker_length: f64) -> Self {
        self.marker_length = marker_length;
        self
    }

    /// Return the frame source.
    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Return the camera intrinsics.
    #[inline]
    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// Return the detector parameters.
    #[inline]
    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Run one tick.
    ///
    /// Returns `Ok(None)` when no image could be captured.
    pub fn tick(&mut self) -> Result<Option<Frame<S::Image>>> {
        let Some(image) = self.source.grab() else {
            log::debug!("capture failed, skipping frame");
            return Ok(None);
        };
        let index = self.frame_count;
        self.frame_count += 1;

        let detections = self
            .backend
            .detect_markers(&image, self.dictionary, &self.params);
        if detections.is_empty() {
            log::debug!("frame {index}: no markers");
            return Ok(Some(Frame {
                index,
                image,
                detections,
                markers: Vec::new(),
                overlays: Vec::new(),
            }));
        }

        let poses = self
            .backend
            .estimate_poses(&detections, self.marker_length, &self.intrinsics);
        if poses.len() != detections.len() {
            return Err(Error::PoseCountMismatch {
                detections: detections.len(),
                poses: poses.len(),
            });
        }

        let markers = convert_detections(detections.iter().map(|d| d.id).zip(&poses));
        let overlays = detections
            .iter()
            .zip(&poses)
            .unique_by(|(d, _)| d.id)
            .filter_map(|(d, pose)| {
                let overlay = axis_overlay(d.id, pose, self.marker_length, &self.intrinsics);
                if overlay.is_none() {
                    log::trace!("marker {}: axes not in front of the camera", d.id);
                }
                overlay
            })
            .collect();
        log::debug!(
            "frame {index}: {} detections, {} markers",
            detections.len(),
            markers.len()
        );

        Ok(Some(Frame {
            index,
            image,
            detections,
            markers,
            overlays,
        }))
    }
}
