//! Startup configuration: marker detector parameters, camera calibration and
//! viewer settings.
//!
//! Both files are JSON documents read once at startup. A missing detector
//! parameter file is not an error, the vision library defaults are used
//! instead. A missing camera calibration is an error: poses estimated without
//! intrinsics are meaningless.

use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::{CameraIntrinsics, Error, FlyCamera, MarkerId, Result, MARKER_LENGTH, ORIGIN_MARKER_ID};

/// Predefined marker dictionaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dictionary {
    /// The original ArUco dictionary (5x5 bits, 1024 markers).
    #[serde(rename = "DICT_ARUCO_ORIGINAL")]
    #[default]
    ArucoOriginal,
    /// 4x4 bits, 50 markers.
    #[serde(rename = "DICT_4X4_50")]
    Dict4x4_50,
    /// 5x5 bits, 100 markers.
    #[serde(rename = "DICT_5X5_100")]
    Dict5x5_100,
    /// 6x6 bits, 250 markers.
    #[serde(rename = "DICT_6X6_250")]
    Dict6x6_250,
    /// AprilTag 36h11.
    #[serde(rename = "DICT_APRILTAG_36h11")]
    AprilTag36h11,
}

impl Dictionary {
    /// Return the canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Dictionary::ArucoOriginal => "DICT_ARUCO_ORIGINAL",
            Dictionary::Dict4x4_50 => "DICT_4X4_50",
            Dictionary::Dict5x5_100 => "DICT_5X5_100",
            Dictionary::Dict6x6_250 => "DICT_6X6_250",
            Dictionary::AprilTag36h11 => "DICT_APRILTAG_36h11",
        }
    }
}

impl FromStr for Dictionary {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_uppercase();
        let wanted = wanted.strip_prefix("DICT_").unwrap_or(&wanted);
        [
            Dictionary::ArucoOriginal,
            Dictionary::Dict4x4_50,
            Dictionary::Dict5x5_100,
            Dictionary::Dict6x6_250,
            Dictionary::AprilTag36h11,
        ]
        .into_iter()
        .find(|d| d.name().to_ascii_uppercase().strip_prefix("DICT_") == Some(wanted))
        .ok_or_else(|| Error::UnknownDictionary(s.to_string()))
    }
}

/// Marker detector parameters.
///
/// Keys follow the names of the vision library; any key missing from the
/// file keeps the library default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectorParams {
    /// Smallest adaptive threshold window size.
    pub adaptive_thresh_win_size_min: i32,
    /// Largest adaptive threshold window size.
    pub adaptive_thresh_win_size_max: i32,
    /// Adaptive threshold window size increment.
    pub adaptive_thresh_win_size_step: i32,
    /// Constant subtracted during adaptive thresholding.
    pub adaptive_thresh_constant: f64,
    /// Smallest marker perimeter relative to the image size.
    pub min_marker_perimeter_rate: f64,
    /// Largest marker perimeter relative to the image size.
    pub max_marker_perimeter_rate: f64,
    /// Polygon approximation accuracy relative to the perimeter.
    pub polygonal_approx_accuracy_rate: f64,
    /// Smallest corner distance relative to the perimeter.
    pub min_corner_distance_rate: f64,
    /// Smallest distance of a corner to the image border in pixels.
    pub min_distance_to_border: i32,
    /// Smallest distance between two markers relative to the perimeter.
    pub min_marker_distance_rate: f64,
    /// Whether corners are refined to sub-pixel accuracy.
    pub do_corner_refinement: bool,
    /// Corner refinement window size.
    pub corner_refinement_win_size: i32,
    /// Corner refinement iteration limit.
    pub corner_refinement_max_iterations: i32,
    /// Corner refinement stop criterion.
    pub corner_refinement_min_accuracy: f64,
    /// Width of the marker border in bits.
    pub marker_border_bits: i32,
    /// Pixels per bit cell when removing perspective.
    pub perspective_remove_pixel_per_cell: i32,
    /// Cell margin ignored when reading bits.
    pub perspective_remove_ignored_margin_per_cell: f64,
    /// Tolerated fraction of wrong border bits.
    pub max_erroneous_bits_in_border_rate: f64,
    /// Smallest standard deviation for Otsu thresholding of a cell.
    pub min_otsu_std_dev: f64,
    /// Fraction of the dictionary's error correction capability used.
    pub error_correction_rate: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            adaptive_thresh_win_size_min: 3,
            adaptive_thresh_win_size_max: 23,
            adaptive_thresh_win_size_step: 10,
            adaptive_thresh_constant: 7.0,
            min_marker_perimeter_rate: 0.03,
            max_marker_perimeter_rate: 4.0,
            polygonal_approx_accuracy_rate: 0.03,
            min_corner_distance_rate: 0.05,
            min_distance_to_border: 3,
            min_marker_distance_rate: 0.05,
            do_corner_refinement: false,
            corner_refinement_win_size: 5,
            corner_refinement_max_iterations: 30,
            corner_refinement_min_accuracy: 0.1,
            marker_border_bits: 1,
            perspective_remove_pixel_per_cell: 4,
            perspective_remove_ignored_margin_per_cell: 0.13,
            max_erroneous_bits_in_border_rate: 0.35,
            min_otsu_std_dev: 5.0,
            error_correction_rate: 0.6,
        }
    }
}

impl DetectorParams {
    /// Parse detector parameters from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Load detector parameters, falling back to the defaults when the file does
/// not exist. Corner refinement is always switched on.
pub fn load_detector_params(path: impl AsRef<Path>) -> Result<DetectorParams> {
    let path = path.as_ref();
    let mut params = match std::fs::read_to_string(path) {
        Ok(json) => DetectorParams::from_json(&json)?,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::warn!(
                "detector parameters '{}' not found, using defaults",
                path.display()
            );
            DetectorParams::default()
        }
        Err(e) => return Err(e.into()),
    };
    params.do_corner_refinement = true;
    Ok(params)
}

/// Camera calibration as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    /// Row-major 3x3 camera matrix.
    pub camera_matrix: [[f64; 3]; 3],
    /// Distortion coefficients `k1, k2, p1, p2, k3`; may be shorter.
    #[serde(default)]
    pub distortion_coefficients: Vec<f64>,
}

impl CameraCalibration {
    /// Parse a calibration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build the camera intrinsics.
    pub fn intrinsics(&self) -> Result<CameraIntrinsics> {
        let m = &self.camera_matrix;
        #[rustfmt::skip]
        let k = Matrix3::new(
            m[0][0], m[0][1], m[0][2],
            m[1][0], m[1][1], m[1][2],
            m[2][0], m[2][1], m[2][2],
        );
        CameraIntrinsics::from_camera_matrix(&k, &self.distortion_coefficients)
    }
}

/// Load the camera intrinsics. Fails if the file cannot be opened.
pub fn load_camera_intrinsics(path: impl AsRef<Path>) -> Result<CameraIntrinsics> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| Error::MissingCalibration {
        path: path.to_path_buf(),
        source,
    })?;
    CameraCalibration::from_json(&json)?.intrinsics()
}

/// Viewer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Physical side length of every marker.
    pub marker_length: f64,
    /// Id of the marker used as origin in the origin-relative mode.
    pub origin_marker_id: MarkerId,
    /// Marker dictionary.
    pub dictionary: Dictionary,
    /// Window width in pixels.
    pub window_width: u32,
    /// Window height in pixels.
    pub window_height: u32,
    /// Start state shared by all camera slots.
    pub camera: FlyCamera,
}

impl ViewerConfig {
    /// Return the start state of the camera slots, with the projection aspect
    /// ratio taken from the window size.
    pub fn start_camera(&self) -> FlyCamera {
        let mut camera = self.camera.clone();
        if self.window_width > 0 && self.window_height > 0 {
            camera.set_aspect(f64::from(self.window_width) / f64::from(self.window_height));
        }
        camera
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            marker_length: MARKER_LENGTH,
            origin_marker_id: ORIGIN_MARKER_ID,
            dictionary: Dictionary::default(),
            window_width: 640,
            window_height: 480,
            camera: FlyCamera::default(),
        }
    }
}
