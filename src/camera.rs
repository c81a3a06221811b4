use nalgebra::{Isometry3, Matrix4, Point3, Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Closest the eye may come to the look-at point when zooming.
const MIN_DISTANCE: f64 = 0.1;

/// Smallest angle (radians) kept between the view direction and the up axis
/// when pitching.
const MIN_PITCH_CLEARANCE: f64 = 0.01;

/// Perspective projection parameters of a camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Vertical field of view in radians.
    pub fov: f64,
    /// Aspect ratio (width / height).
    pub aspect: f64,
    /// Near clipping plane.
    pub near: f64,
    /// Far clipping plane.
    pub far: f64,
}

impl Projection {
    /// Return the left-handed perspective projection matrix (depth mapped to
    /// `[0, 1]`).
    pub fn matrix(&self) -> Matrix4<f64> {
        let y_scale = 1.0 / (self.fov / 2.0).tan();
        let x_scale = y_scale / self.aspect;
        let depth = self.far / (self.far - self.near);
        #[rustfmt::skip]
        let m = Matrix4::new(
            x_scale, 0.0,     0.0,   0.0,
            0.0,     y_scale, 0.0,   0.0,
            0.0,     0.0,     depth, -self.near * depth,
            0.0,     0.0,     1.0,   0.0,
        );
        m
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov: std::f64::consts::FRAC_PI_4,
            aspect: 640.0 / 480.0,
            near: 1.0,
            far: 10000.0,
        }
    }
}

/// A free-flying camera defined by an eye position, a look-at point and an up
/// vector, in the left-handed engine convention (X right, Y up, Z forward).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlyCamera {
    eye: Point3<f64>,
    look_at: Point3<f64>,
    up: Vector3<f64>,
    projection: Projection,
}

impl FlyCamera {
    /// Create a new camera at `eye` looking at `look_at`.
    pub fn new(eye: Point3<f64>, look_at: Point3<f64>, up: Vector3<f64>, projection: Projection) -> Self {
        Self {
            eye,
            look_at,
            up,
            projection,
        }
    }

    /// Return the eye position.
    #[inline]
    pub fn eye(&self) -> &Point3<f64> {
        &self.eye
    }

    /// Return the look-at point.
    #[inline]
    pub fn look_at(&self) -> &Point3<f64> {
        &self.look_at
    }

    /// Return the up vector.
    #[inline]
    pub fn up(&self) -> &Vector3<f64> {
        &self.up
    }

    /// Return the projection parameters.
    #[inline]
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Set the aspect ratio (width / height) of the projection.
    pub fn set_aspect(&mut self, aspect: f64) {
        self.projection.aspect = aspect;
    }

    /// Return the view matrix.
    pub fn view_matrix(&self) -> Isometry3<f64> {
        Isometry3::look_at_lh(&self.eye, &self.look_at, &self.up)
    }

    /// Return a unit vector along the view direction.
    pub fn direction(&self) -> Unit<Vector3<f64>> {
        Unit::new_normalize(self.look_at - self.eye)
    }

    /// Return a unit vector pointing to the right of the view direction.
    pub fn right(&self) -> Unit<Vector3<f64>> {
        Unit::new_normalize(self.up.cross(&self.direction()))
    }

    /// Distance between the eye and the look-at point.
    pub fn distance(&self) -> f64 {
        (self.look_at - self.eye).norm()
    }

    fn translate(&mut self, offset: Vector3<f64>) {
        self.eye += offset;
        self.look_at += offset;
    }

    /// Move along the view direction.
    pub fn move_front(&mut self, len: f64) {
        self.translate(self.direction().into_inner() * len);
    }

    /// Move sideways; positive is to the right.
    pub fn move_right(&mut self, len: f64) {
        self.translate(self.right().into_inner() * len);
    }

    /// Move along the up vector.
    pub fn move_up(&mut self, len: f64) {
        self.translate(Unit::new_normalize(self.up).into_inner() * len);
    }

    /// Orbit the eye around the look-at point about the up axis.
    pub fn yaw(&mut self, angle: f64) {
        let rot = Rotation3::from_axis_angle(&Unit::new_normalize(self.up), angle);
        self.eye = self.look_at - rot * (self.look_at - self.eye);
    }

    /// Orbit the eye around the look-at point about the right axis.
    ///
    /// The rotation is skipped when it would bring the view direction onto
    /// the up axis.
    pub fn pitch(&mut self, angle: f64) {
        let rot = Rotation3::from_axis_angle(&self.right(), angle);
        let offset = rot * (self.look_at - self.eye);
        let clearance = offset.angle(&self.up);
        if clearance < MIN_PITCH_CLEARANCE || clearance > std::f64::consts::PI - MIN_PITCH_CLEARANCE {
            return;
        }
        self.eye = self.look_at - offset;
    }

    /// Move the eye towards the look-at point; negative values move away.
    pub fn zoom(&mut self, len: f64) {
        let direction = self.direction();
        let distance = (self.distance() - len).max(MIN_DISTANCE);
        self.eye = self.look_at - direction.into_inner() * distance;
    }

    /// Replace the camera state by the one described by a view matrix.
    ///
    /// The look-at point is placed in front of the new eye position at the
    /// current eye to look-at distance.
    pub fn set_view_matrix(&mut self, view: &Isometry3<f64>) {
        let distance = self.distance().max(MIN_DISTANCE);
        let world = view.inverse();
        self.eye = world.transform_point(&Point3::origin());
        let forward = world.transform_vector(&Vector3::z());
        self.up = world.transform_vector(&Vector3::y());
        self.look_at = self.eye + forward * distance;
    }
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self::new(
            Point3::new(10.0, 10.0, -10.0),
            Point3::origin(),
            Vector3::y(),
            Projection::default(),
        )
    }
}

/// The four viewing modes, each owning one camera slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CameraMode {
    /// Render in each marker's frame.
    #[default]
    MarkerFrame,
    /// Third person view showing where the markers are seen from.
    ThirdPerson,
    /// Boxes placed relative to the stabilized camera slot.
    Stabilized,
    /// Boxes placed relative to the origin marker.
    OriginRelative,
}

impl CameraMode {
    /// All modes in slot order.
    pub const ALL: [CameraMode; 4] = [
        CameraMode::MarkerFrame,
        CameraMode::ThirdPerson,
        CameraMode::Stabilized,
        CameraMode::OriginRelative,
    ];

    /// Return the slot index of this mode.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            CameraMode::MarkerFrame => 0,
            CameraMode::ThirdPerson => 1,
            CameraMode::Stabilized => 2,
            CameraMode::OriginRelative => 3,
        }
    }
}

impl TryFrom<u8> for CameraMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(Error::InvalidMode(value))
    }
}

/// The camera slots plus the view currently driving the render target.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraRig {
    slots: [FlyCamera; 4],
    main_view: Isometry3<f64>,
}

impl CameraRig {
    /// Create a rig with every slot starting as a copy of `start`.
    pub fn new(start: FlyCamera) -> Self {
        let main_view = start.view_matrix();
        Self {
            slots: [start.clone(), start.clone(), start.clone(), start],
            main_view,
        }
    }

    /// Return the camera owned by `mode`.
    #[inline]
    pub fn slot(&self, mode: CameraMode) -> &FlyCamera {
        &self.slots[mode.index()]
    }

    /// Return the camera owned by `mode` for mutation.
    #[inline]
    pub fn slot_mut(&mut self, mode: CameraMode) -> &mut FlyCamera {
        &mut self.slots[mode.index()]
    }

    /// Return the view matrix driving the render target.
    #[inline]
    pub fn main_view(&self) -> &Isometry3<f64> {
        &self.main_view
    }

    /// Set the view matrix driving the render target.
    #[inline]
    pub fn set_main_view(&mut self, view: Isometry3<f64>) {
        self.main_view = view;
    }
}

impl Default for CameraRig {
    fn default() -> Self {
        Self::new(FlyCamera::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_maps_eye_to_origin() {
        let cam = FlyCamera::default();
        let view = cam.view_matrix();
        approx::assert_abs_diff_eq!(
            view.transform_point(cam.eye()),
            Point3::origin(),
            epsilon = 1e-10
        );
        // The look-at point lies straight ahead on +Z.
        let ahead = view.transform_point(cam.look_at());
        approx::assert_abs_diff_eq!(ahead, Point3::new(0.0, 0.0, cam.distance()), epsilon = 1e-10);
    }

    #[test]
    fn right_is_positive_x_in_view() {
        let cam = FlyCamera::default();
        let view = cam.view_matrix();
        let right = view.transform_vector(&cam.right());
        approx::assert_abs_diff_eq!(right, Vector3::x(), epsilon = 1e-10);
    }

    #[test]
    fn set_view_matrix_roundtrip() {
        let source = FlyCamera::new(
            Point3::new(-3.0, 2.0, 7.0),
            Point3::new(1.0, 0.5, -2.0),
            Vector3::y(),
            Projection::default(),
        );
        let mut cam = FlyCamera::default();
        cam.set_view_matrix(&source.view_matrix());
        approx::assert_abs_diff_eq!(*cam.eye(), *source.eye(), epsilon = 1e-10);
        approx::assert_abs_diff_eq!(
            cam.view_matrix().to_homogeneous(),
            source.view_matrix().to_homogeneous(),
            epsilon = 1e-10
        );
    }

    #[test]
    fn movement_keeps_distance() {
        let mut cam = FlyCamera::default();
        let distance = cam.distance();
        cam.move_front(2.0);
        cam.move_right(-2.0);
        cam.move_up(2.0);
        cam.yaw(0.3);
        cam.pitch(0.2);
        approx::assert_abs_diff_eq!(cam.distance(), distance, epsilon = 1e-10);
    }

    #[test]
    fn move_front_follows_direction() {
        let mut cam = FlyCamera::default();
        let before = *cam.eye();
        let direction = cam.direction();
        cam.move_front(2.0);
        approx::assert_abs_diff_eq!(*cam.eye(), before + direction.into_inner() * 2.0, epsilon = 1e-10);
    }

    #[test]
    fn zoom_clamps_at_look_at() {
        let mut cam = FlyCamera::default();
        let distance = cam.distance();
        cam.zoom(1.0);
        approx::assert_abs_diff_eq!(cam.distance(), distance - 1.0, epsilon = 1e-10);
        cam.zoom(1000.0);
        approx::assert_abs_diff_eq!(cam.distance(), MIN_DISTANCE, epsilon = 1e-10);
        cam.zoom(-5.0);
        approx::assert_abs_diff_eq!(cam.distance(), MIN_DISTANCE + 5.0, epsilon = 1e-10);
    }

    #[test]
    fn pitch_stops_before_up_axis() {
        let mut cam = FlyCamera::default();
        for _ in 0..40 {
            cam.pitch(0.3);
            let clearance = (cam.look_at() - cam.eye()).angle(cam.up());
            assert!(clearance >= MIN_PITCH_CLEARANCE);
            assert!(clearance <= std::f64::consts::PI - MIN_PITCH_CLEARANCE);
        }
    }

    #[test]
    fn mode_indices() {
        for (i, mode) in CameraMode::ALL.iter().enumerate() {
            assert_eq!(mode.index(), i);
            assert_eq!(CameraMode::try_from(i as u8).unwrap(), *mode);
        }
        assert!(matches!(CameraMode::try_from(4), Err(Error::InvalidMode(4))));
    }

    #[test]
    fn projection_maps_near_and_far() {
        let p = Projection::default();
        let m = p.matrix();
        let near = m * nalgebra::Vector4::new(0.0, 0.0, p.near, 1.0);
        let far = m * nalgebra::Vector4::new(0.0, 0.0, p.far, 1.0);
        approx::assert_abs_diff_eq!(near.z / near.w, 0.0, epsilon = 1e-10);
        approx::assert_abs_diff_eq!(far.z / far.w, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn slots_are_independent() {
        let mut rig = CameraRig::default();
        rig.slot_mut(CameraMode::Stabilized).move_up(3.0);
        assert_ne!(rig.slot(CameraMode::Stabilized), rig.slot(CameraMode::OriginRelative));
        assert_eq!(rig.slot(CameraMode::MarkerFrame), rig.slot(CameraMode::OriginRelative));
    }
}
