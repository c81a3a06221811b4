use nalgebra::{Matrix3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Parameters defining a pinhole perspective camera model.
///
/// These will be used to make the 3x3 camera matrix
/// ```text
/// [[fx, skew, cx],
///  [ 0,   fy, cy],
///  [ 0,    0,  1]]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveParams {
    /// Horizontal focal length.
    pub fx: f64,
    /// Vertical focal length.
    pub fy: f64,
    /// Skew between horizontal and vertical axes.
    pub skew: f64,
    /// Horizontal component of the principal point.
    pub cx: f64,
    /// Vertical component of the principal point.
    pub cy: f64,
}

/// Brown-Conrady lens distortion, in the coefficient order of the camera
/// calibration file: `k1, k2, p1, p2, k3`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    /// First radial coefficient.
    pub k1: f64,
    /// Second radial coefficient.
    pub k2: f64,
    /// First tangential coefficient.
    pub p1: f64,
    /// Second tangential coefficient.
    pub p2: f64,
    /// Third radial coefficient.
    pub k3: f64,
}

impl Distortion {
    /// Build from a coefficient list. Missing trailing coefficients are zero
    /// and coefficients past `k3` are ignored.
    pub fn from_coefficients(coeffs: &[f64]) -> Self {
        let get = |i: usize| coeffs.get(i).copied().unwrap_or(0.0);
        Self {
            k1: get(0),
            k2: get(1),
            p1: get(2),
            p2: get(3),
            k3: get(4),
        }
    }

    /// Distort a point in normalized image coordinates.
    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let xd = x * radial + 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        (xd, yd)
    }
}

/// Camera intrinsic calibration: a pinhole model with lens distortion.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraIntrinsics {
    params: PerspectiveParams,
    distortion: Distortion,
    cache_k: Matrix3<f64>,
}

impl CameraIntrinsics {
    /// Create a new instance from pinhole parameters and distortion.
    pub fn new(params: PerspectiveParams, distortion: Distortion) -> Self {
        #[rustfmt::skip]
        let cache_k = Matrix3::new(
            params.fx, params.skew, params.cx,
            0.0,       params.fy,   params.cy,
            0.0,       0.0,         1.0,
        );
        Self {
            params,
            distortion,
            cache_k,
        }
    }

    /// Create a new instance given a camera matrix and distortion coefficients.
    ///
    /// Returns an error if the camera matrix is not normalized or otherwise
    /// does not represent a perspective camera model.
    pub fn from_camera_matrix(k: &Matrix3<f64>, distortion: &[f64]) -> Result<Self> {
        if approx::relative_ne!(k[(1, 0)], 0.0) {
            return Err(Error::InvalidCameraMatrix);
        }

        if approx::relative_ne!(k[(2, 0)], 0.0) {
            return Err(Error::InvalidCameraMatrix);
        }

        if approx::relative_ne!(k[(2, 1)], 0.0) {
            return Err(Error::InvalidCameraMatrix);
        }

        if approx::relative_ne!(k[(2, 2)], 1.0) {
            return Err(Error::InvalidCameraMatrix); // camera matrix must be normalized
        }

        if k[(0, 0)] <= 0.0 || k[(1, 1)] <= 0.0 {
            return Err(Error::InvalidCameraMatrix);
        }

        let params = PerspectiveParams {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            skew: k[(0, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        };
        Ok(Self::new(params, Distortion::from_coefficients(distortion)))
    }

    /// Get X focal length
    #[inline]
    pub fn fx(&self) -> f64 {
        self.params.fx
    }

    /// Get Y focal length
    #[inline]
    pub fn fy(&self) -> f64 {
        self.params.fy
    }

    /// Get X center
    #[inline]
    pub fn cx(&self) -> f64 {
        self.params.cx
    }

    /// Get Y center
    #[inline]
    pub fn cy(&self) -> f64 {
        self.params.cy
    }

    /// Return the lens distortion.
    #[inline]
    pub fn distortion(&self) -> &Distortion {
        &self.distortion
    }

    /// Return the 3x3 camera matrix.
    #[inline]
    pub fn camera_matrix(&self) -> &Matrix3<f64> {
        &self.cache_k
    }

    /// Project a point in the vision library camera frame to distorted pixel
    /// coordinates.
    ///
    /// Returns `None` for points on or behind the image plane (`z <= 0`).
    pub fn camera_to_pixel(&self, pt: &Point3<f64>) -> Option<Point2<f64>> {
        if pt.z <= 0.0 {
            return None;
        }
        let (x, y) = self.distortion.apply(pt.x / pt.z, pt.y / pt.z);
        let rst = self.cache_k * Vector3::new(x, y, 1.0);
        Some(Point2::new(rst[0], rst[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;

    fn intrinsics(distortion: &[f64]) -> CameraIntrinsics {
        #[rustfmt::skip]
        let k = Matrix3::new(
            600.0, 0.0, 320.0,
            0.0, 610.0, 240.0,
            0.0,   0.0,   1.0,
        );
        CameraIntrinsics::from_camera_matrix(&k, distortion).unwrap()
    }

    #[test]
    fn principal_point_on_axis() {
        let cam = intrinsics(&[0.1, -0.2, 0.001, 0.002, 0.05]);
        let pix = cam.camera_to_pixel(&Point3::new(0.0, 0.0, 5.0)).unwrap();
        approx::assert_abs_diff_eq!(pix.coords, Vector2::new(320.0, 240.0), epsilon = 1e-10);
    }

    #[test]
    fn pinhole_projection() {
        let cam = intrinsics(&[]);
        let pix = cam.camera_to_pixel(&Point3::new(1.0, -0.5, 2.0)).unwrap();
        approx::assert_abs_diff_eq!(
            pix.coords,
            Vector2::new(320.0 + 600.0 * 0.5, 240.0 - 610.0 * 0.25),
            epsilon = 1e-10
        );
    }

    #[test]
    fn radial_distortion_pushes_outward() {
        let plain = intrinsics(&[]);
        let barrel = intrinsics(&[0.2]);
        let pt = Point3::new(0.4, 0.3, 1.0);
        let a = plain.camera_to_pixel(&pt).unwrap();
        let b = barrel.camera_to_pixel(&pt).unwrap();
        assert!(b.x > a.x);
        assert!(b.y > a.y);

        // r^2 = 0.25, so the normalized point scales by 1.05
        approx::assert_abs_diff_eq!(b.x, 320.0 + 600.0 * 0.4 * 1.05, epsilon = 1e-10);
    }

    #[test]
    fn points_behind_camera_are_not_projected() {
        let cam = intrinsics(&[0.1]);
        assert_eq!(cam.camera_to_pixel(&Point3::new(1.0, 2.0, 0.0)), None);
        assert_eq!(cam.camera_to_pixel(&Point3::new(1.0, 2.0, -3.0)), None);
        assert!(cam.camera_to_pixel(&Point3::new(1.0, 2.0, 1e-3)).is_some());
    }

    #[test]
    fn rejects_unnormalized_matrix() {
        #[rustfmt::skip]
        let k = Matrix3::new(
            600.0, 0.0, 320.0,
            0.0, 610.0, 240.0,
            0.0,   0.0,   2.0,
        );
        assert!(matches!(
            CameraIntrinsics::from_camera_matrix(&k, &[]),
            Err(Error::InvalidCameraMatrix)
        ));
        assert!(matches!(
            CameraIntrinsics::from_camera_matrix(&Matrix3::zeros(), &[]),
            Err(Error::InvalidCameraMatrix)
        ));
    }

    #[test]
    fn distortion_coefficient_order() {
        let d = Distortion::from_coefficients(&[1.0, 2.0, 3.0]);
        assert_eq!(
            d,
            Distortion {
                k1: 1.0,
                k2: 2.0,
                p1: 3.0,
                p2: 0.0,
                k3: 0.0
            }
        );
    }
}
