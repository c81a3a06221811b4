//! Turns the markers of one frame into view matrices and box placements for
//! the active viewing mode.

use nalgebra::{Isometry3, Matrix4, Vector3};

use crate::{
    find_marker, CameraMode, CameraRig, Marker, MarkerId, Renderer, ViewerState, ORIGIN_MARKER_ID,
};

/// Uniform scale bringing the box model to engine size.
pub const BOX_SCALE: f64 = 0.05;

/// Height at which the box sits above its anchor.
pub const BOX_LIFT: f64 = 5.0;

/// Return the base placement of the box: lifted along +Y in model units,
/// then scaled, so the box rests `BOX_LIFT * BOX_SCALE` above its anchor.
pub fn box_base_placement() -> Matrix4<f64> {
    Matrix4::new_scaling(BOX_SCALE) * Matrix4::new_translation(&Vector3::new(0.0, BOX_LIFT, 0.0))
}

/// Return `transform` followed by `reference⁻¹`, i.e. `reference⁻¹ * transform`.
///
/// For two view matrices this maps the marker frame into the frame whose view
/// is `reference`. Both arguments are rigid, so the inverse always exists.
#[inline]
pub fn relative_to(transform: &Isometry3<f64>, reference: &Isometry3<f64>) -> Isometry3<f64> {
    reference.inverse() * transform
}

/// Composes the per-mode views and box placements.
///
/// The composer remembers the last box placement, which the stabilized mode
/// keeps while placement updates are switched off.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewComposer {
    origin_id: MarkerId,
    base: Matrix4<f64>,
    placement: Matrix4<f64>,
}

impl ViewComposer {
    /// Create a composer using `origin_id` as the origin marker.
    pub fn new(origin_id: MarkerId) -> Self {
        Self {
            origin_id,
            base: box_base_placement(),
            placement: Matrix4::new_scaling(BOX_SCALE),
        }
    }

    /// Return the id of the origin marker.
    #[inline]
    pub fn origin_id(&self) -> MarkerId {
        self.origin_id
    }

    /// Return the current box placement.
    #[inline]
    pub fn placement(&self) -> &Matrix4<f64> {
        &self.placement
    }

    /// Issue the draw calls of the active mode for this frame's markers.
    ///
    /// Updates the rig's main view. Never fails: modes anchored on markers
    /// draw nothing when no (suitable) marker is visible.
    pub fn compose<R>(
        &mut self,
        markers: &[Marker],
        state: &ViewerState,
        rig: &mut CameraRig,
        renderer: &mut R,
    ) where
        R: Renderer + ?Sized,
    {
        match state.mode {
            CameraMode::MarkerFrame => {
                for m in markers {
                    rig.slot_mut(CameraMode::MarkerFrame)
                        .set_view_matrix(&m.transform);
                    rig.set_main_view(m.transform);
                    renderer.set_view(&m.transform);

                    self.placement = self.base;
                    renderer.draw_box(&self.placement);
                }
            }
            CameraMode::ThirdPerson => {
                let view = rig.slot(CameraMode::ThirdPerson).view_matrix();
                rig.set_main_view(view);
                renderer.set_view(&view);

                for m in markers {
                    self.placement = self.base;
                    renderer.draw_box(&self.placement);

                    let marker_camera = rig.slot_mut(CameraMode::MarkerFrame);
                    marker_camera.set_view_matrix(&m.transform);
                    renderer.draw_camera(marker_camera);
                }
            }
            CameraMode::Stabilized => {
                let view = rig.slot(CameraMode::Stabilized).view_matrix();
                rig.set_main_view(view);
                renderer.set_view(&view);

                for m in markers {
                    if state.update_placement {
                        let relative = relative_to(&m.transform, &view);
                        self.placement = relative.to_homogeneous() * self.base;
                    }
                    renderer.draw_box(&self.placement);
                }
            }
            CameraMode::OriginRelative => {
                let Some(origin) = find_marker(markers, self.origin_id) else {
                    log::trace!("origin marker {} not visible", self.origin_id);
                    return;
                };

                let view = rig.slot(CameraMode::OriginRelative).view_matrix();
                rig.set_main_view(view);
                renderer.set_view(&view);

                for m in markers {
                    let relative = relative_to(&m.transform, &origin.transform);
                    self.placement = relative.to_homogeneous() * self.base;
                    renderer.draw_box(&self.placement);
                }
            }
        }
    }
}

impl Default for ViewComposer {
    fn default() -> Self {
        Self::new(ORIGIN_MARKER_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{convert_detections, DrawCommand, RawPose, RecordingRenderer};

    fn markers(ids: &[MarkerId]) -> Vec<Marker> {
        let poses: Vec<RawPose> = ids
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let i = i as f64;
                RawPose::new(
                    Vector3::new(0.1 * i, -0.2 + 0.05 * i, 0.3),
                    Vector3::new(-40.0 + 25.0 * i, 10.0 * i, 300.0 + 50.0 * i),
                )
            })
            .collect();
        convert_detections(ids.iter().copied().zip(poses.iter()))
    }

    fn state(mode: CameraMode) -> ViewerState {
        let mut state = ViewerState::default();
        state.mode = mode;
        state
    }

    #[test]
    fn base_placement() {
        let base = box_base_placement();
        let corner = base.transform_point(&nalgebra::Point3::new(1.0, 1.0, 1.0));
        approx::assert_abs_diff_eq!(corner, nalgebra::Point3::new(0.05, 0.3, 0.05), epsilon = 1e-12);
    }

    #[test]
    fn marker_frame_uses_marker_views() {
        let markers = markers(&[3, 8]);
        let mut rig = CameraRig::default();
        let mut composer = ViewComposer::default();
        let mut renderer = RecordingRenderer::default();
        composer.compose(&markers, &state(CameraMode::MarkerFrame), &mut rig, &mut renderer);

        let views = renderer.views();
        assert_eq!(views, vec![markers[0].transform, markers[1].transform]);
        assert_eq!(renderer.box_placements(), vec![box_base_placement(); 2]);
        assert_eq!(*rig.main_view(), markers[1].transform);
        approx::assert_abs_diff_eq!(
            rig.slot(CameraMode::MarkerFrame).view_matrix().to_homogeneous(),
            markers[1].transform.to_homogeneous(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn third_person_draws_marker_cameras() {
        let markers = markers(&[1, 2, 5]);
        let mut rig = CameraRig::default();
        rig.slot_mut(CameraMode::ThirdPerson).move_right(4.0);
        let third_view = rig.slot(CameraMode::ThirdPerson).view_matrix();

        let mut composer = ViewComposer::default();
        let mut renderer = RecordingRenderer::default();
        composer.compose(&markers, &state(CameraMode::ThirdPerson), &mut rig, &mut renderer);

        assert_eq!(renderer.views(), vec![third_view]);
        assert_eq!(*rig.main_view(), third_view);
        assert_eq!(renderer.box_placements().len(), 3);

        let cameras: Vec<_> = renderer
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::DrawCamera(view) => Some(*view),
                _ => None,
            })
            .collect();
        assert_eq!(cameras.len(), 3);
        for (camera, marker) in cameras.iter().zip(&markers) {
            approx::assert_abs_diff_eq!(
                camera.to_homogeneous(),
                marker.transform.to_homogeneous(),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn stabilized_placement_freezes() {
        let markers = markers(&[4]);
        let mut rig = CameraRig::default();
        let mut composer = ViewComposer::default();
        let mut renderer = RecordingRenderer::default();

        let mut st = state(CameraMode::Stabilized);
        composer.compose(&markers, &st, &mut rig, &mut renderer);
        let view = rig.slot(CameraMode::Stabilized).view_matrix();
        let expected = relative_to(&markers[0].transform, &view).to_homogeneous() * box_base_placement();
        approx::assert_abs_diff_eq!(*composer.placement(), expected, epsilon = 1e-12);
        let frozen = *composer.placement();

        st.update_placement = false;
        rig.slot_mut(CameraMode::Stabilized).move_front(2.0);
        rig.slot_mut(CameraMode::Stabilized).yaw(0.4);
        let moved_view = rig.slot(CameraMode::Stabilized).view_matrix();

        let mut renderer = RecordingRenderer::default();
        composer.compose(&markers, &st, &mut rig, &mut renderer);
        assert_eq!(*composer.placement(), frozen);
        assert_eq!(renderer.box_placements(), vec![frozen]);
        assert_eq!(renderer.views(), vec![moved_view]);
        assert_eq!(*rig.main_view(), moved_view);

        // Resuming updates re-anchors on the moved camera.
        st.update_placement = true;
        composer.compose(&markers, &st, &mut rig, &mut renderer);
        assert_ne!(*composer.placement(), frozen);
    }

    #[test]
    fn stabilized_view_set_without_markers() {
        let mut rig = CameraRig::default();
        rig.slot_mut(CameraMode::Stabilized).move_up(1.0);
        let mut composer = ViewComposer::default();
        let mut renderer = RecordingRenderer::default();
        composer.compose(&[], &state(CameraMode::Stabilized), &mut rig, &mut renderer);
        assert!(renderer.box_placements().is_empty());
        assert_eq!(*rig.main_view(), rig.slot(CameraMode::Stabilized).view_matrix());
    }

    #[test]
    fn origin_marker_sits_at_base() {
        let markers = markers(&[12, ORIGIN_MARKER_ID, 30]);
        let mut rig = CameraRig::default();
        let mut composer = ViewComposer::default();
        let mut renderer = RecordingRenderer::default();
        composer.compose(&markers, &state(CameraMode::OriginRelative), &mut rig, &mut renderer);

        let placements = renderer.box_placements();
        assert_eq!(placements.len(), 3);
        approx::assert_abs_diff_eq!(placements[1], box_base_placement(), epsilon = 1e-12);

        let origin = relative_to(&markers[1].transform, &markers[1].transform);
        approx::assert_abs_diff_eq!(origin.to_homogeneous(), Matrix4::identity(), epsilon = 1e-12);

        assert_eq!(
            renderer.views(),
            vec![rig.slot(CameraMode::OriginRelative).view_matrix()]
        );
    }

    #[test]
    fn origin_relative_offset() {
        // Same orientation, one marker 100 units to the right of the origin
        // marker in the camera image.
        let poses = [
            RawPose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 500.0)),
            RawPose::new(Vector3::zeros(), Vector3::new(100.0, 0.0, 500.0)),
        ];
        let markers = convert_detections([(ORIGIN_MARKER_ID, &poses[0]), (2, &poses[1])]);

        let relative = relative_to(&markers[1].transform, &markers[0].transform);
        approx::assert_abs_diff_eq!(
            relative.to_homogeneous(),
            Matrix4::new_translation(&Vector3::new(-1.0, 0.0, 0.0)),
            epsilon = 1e-12
        );

        let mut rig = CameraRig::default();
        let mut composer = ViewComposer::default();
        let mut renderer = RecordingRenderer::default();
        composer.compose(&markers, &state(CameraMode::OriginRelative), &mut rig, &mut renderer);
        let placements = renderer.box_placements();
        approx::assert_abs_diff_eq!(
            placements[1],
            Matrix4::new_translation(&Vector3::new(-1.0, 0.0, 0.0)) * box_base_placement(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn origin_relative_ignores_camera_motion() {
        let markers = markers(&[ORIGIN_MARKER_ID, 6]);
        let mut rig = CameraRig::default();
        let mut composer = ViewComposer::default();
        let mut renderer = RecordingRenderer::default();
        let st = state(CameraMode::OriginRelative);

        composer.compose(&markers, &st, &mut rig, &mut renderer);
        let before = renderer.box_placements();

        rig.slot_mut(CameraMode::OriginRelative).move_right(5.0);
        let mut renderer = RecordingRenderer::default();
        composer.compose(&markers, &st, &mut rig, &mut renderer);
        assert_eq!(renderer.box_placements(), before);
    }

    #[test]
    fn origin_missing_draws_nothing() {
        let markers = markers(&[1, 2, 99]);
        let mut rig = CameraRig::default();
        let before = rig.clone();
        let mut composer = ViewComposer::default();
        let mut renderer = RecordingRenderer::default();
        composer.compose(&markers, &state(CameraMode::OriginRelative), &mut rig, &mut renderer);
        assert!(renderer.commands().is_empty());
        assert_eq!(rig, before);
    }

    #[test]
    fn empty_frame_draws_no_boxes() {
        for mode in CameraMode::ALL {
            let mut rig = CameraRig::default();
            let mut composer = ViewComposer::default();
            let mut renderer = RecordingRenderer::default();
            composer.compose(&[], &state(mode), &mut rig, &mut renderer);
            assert!(renderer.box_placements().is_empty(), "{mode:?}");
        }
    }
}
