use nalgebra::Isometry3;

/// Integer identifier of a fiducial marker.
pub type MarkerId = i32;

/// Marker id reserved as the origin of the origin-relative viewing mode.
pub const ORIGIN_MARKER_ID: MarkerId = 100;

/// Physical side length shared by all markers.
pub const MARKER_LENGTH: f64 = 75.0;

/// A marker detected in the current frame.
///
/// Markers live for one frame only. Within a frame no two markers share an
/// `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// The marker identifier.
    pub id: MarkerId,
    /// The marker pose as a view matrix in engine convention.
    pub transform: Isometry3<f64>,
}

impl Marker {
    /// Create a new marker.
    #[inline]
    pub fn new(id: MarkerId, transform: Isometry3<f64>) -> Self {
        Self { id, transform }
    }
}

/// Return the first marker with the given id.
pub fn find_marker(markers: &[Marker], id: MarkerId) -> Option<&Marker> {
    markers.iter().find(|m| m.id == id)
}
