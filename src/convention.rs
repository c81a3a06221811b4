//! Conversion of marker poses from the vision library convention into the
//! render engine convention.
//!
//! The pose estimator reports, for every marker, a rotation vector and a
//! translation vector in the camera frame of the vision library: X right, Y
//! down, Z forward, lengths in the unit of the physical marker size. The
//! render engine uses X right, Y up, Z forward and wants each marker pose as a
//! view matrix, i.e. the pose of the camera seen from the marker.
//!
//! All matrix products in this crate use the column vector convention of
//! nalgebra: in `a * b * c` the transform `c` is applied first.

use itertools::Itertools;
use nalgebra::{
    convert, Isometry3, Matrix3, RealField, Rotation3, Translation3, UnitQuaternion, Vector3,
};
use serde::{Deserialize, Serialize};

use crate::{Marker, MarkerId};

/// Engine world units per unit of marker length.
pub const ENGINE_UNITS_PER_MARKER_UNIT: f64 = 0.01;

/// Angle (degrees) of the fixed rotation about +X which swaps the roles of the
/// Y and Z axes.
pub const AXIS_SWAP_ANGLE_DEG: f64 = -90.0;

/// Signs applied to the X, Y and Z columns of the inverse rotation.
///
/// Two negated columns keep the determinant at +1.
pub const ROTATION_COLUMN_SIGNS: [f64; 3] = [-1.0, 1.0, -1.0];

/// A marker pose as reported by the pose estimator, in the camera frame of the
/// vision library.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPose {
    /// Axis-angle rotation vector (direction is the axis, norm the angle).
    pub rvec: Vector3<f64>,
    /// Translation vector in marker length units.
    pub tvec: Vector3<f64>,
}

impl RawPose {
    /// Create a new pose from a rotation vector and a translation vector.
    #[inline]
    pub fn new(rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        Self { rvec, tvec }
    }

    /// Convert into the render engine convention.
    #[inline]
    pub fn to_engine_space(&self) -> Isometry3<f64> {
        to_engine_space(&self.rvec, &self.tvec)
    }
}

/// Return the rotation block of the engine transform for a rotation vector.
///
/// The rotation vector is expanded with the exponential map and inverted by
/// transposition. In row vector layout the X and Z columns of that inverse are
/// negated; transposed into column vector layout this is the X and Z rows of
/// the forward rotation.
pub fn rotation_block<R: RealField + Copy>(rvec: &Vector3<R>) -> Rotation3<R> {
    let inverse = Rotation3::new(*rvec).transpose();
    let signs = Matrix3::from_diagonal(&Vector3::new(
        convert(ROTATION_COLUMN_SIGNS[0]),
        convert(ROTATION_COLUMN_SIGNS[1]),
        convert(ROTATION_COLUMN_SIGNS[2]),
    ));
    Rotation3::from_matrix_unchecked((inverse.matrix() * signs).transpose())
}

/// Return the fixed rotation swapping the Y-down/Z-forward axes of the vision
/// library for the Y-up/Z-forward axes of the engine.
pub fn axis_swap<R: RealField + Copy>() -> Rotation3<R> {
    let angle: R = convert(AXIS_SWAP_ANGLE_DEG.to_radians());
    Rotation3::from_axis_angle(&Vector3::x_axis(), angle)
}

/// Return the translation block for a translation vector: Y is negated and
/// every component is scaled into engine units.
pub fn translation_block<R: RealField + Copy>(tvec: &Vector3<R>) -> Translation3<R> {
    let scale: R = convert(ENGINE_UNITS_PER_MARKER_UNIT);
    Translation3::from(Vector3::new(tvec.x, -tvec.y, tvec.z) * scale)
}

/// Convert a raw marker pose into a rigid transform in engine convention.
///
/// The axis swap is applied first, then the rotation block, then the
/// translation block: `translation_block * rotation_block * axis_swap`. The
/// translation of the result is exactly the translation block.
pub fn to_engine_space<R: RealField + Copy>(rvec: &Vector3<R>, tvec: &Vector3<R>) -> Isometry3<R> {
    let rotation = rotation_block(rvec) * axis_swap();
    Isometry3::from_parts(
        translation_block(tvec),
        UnitQuaternion::from_rotation_matrix(&rotation),
    )
}

/// Convert one frame of raw detections into markers.
///
/// Detections are processed in order; a detection whose id was already seen
/// in this frame is skipped, so the first occurrence of an id wins.
pub fn convert_detections<'a, I>(detections: I) -> Vec<Marker>
where
    I: IntoIterator<Item = (MarkerId, &'a RawPose)>,
{
    detections
        .into_iter()
        .unique_by(|(id, _)| *id)
        .map(|(id, pose)| {
            let transform = pose.to_engine_space();
            log::trace!("marker {id}: {transform}");
            Marker::new(id, transform)
        })
        .collect()
}
