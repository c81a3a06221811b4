use nalgebra::{Isometry3, Matrix4};

use crate::{AxisOverlay, FlyCamera};

/// The drawing surface the viewer renders into.
///
/// Implemented by the graphics backend. All transforms use the engine
/// convention.
pub trait Renderer {
    /// Start a new frame.
    fn begin_frame(&mut self);
    /// Draw the most recent captured image as the background.
    fn draw_video_backdrop(&mut self, frame_index: u64);
    /// Draw the ground grid and world axis helpers.
    fn draw_helpers(&mut self);
    /// Switch between solid and wireframe drawing.
    fn set_wireframe(&mut self, wireframe: bool);
    /// Draw a detected marker's axes over the video image.
    fn draw_marker_axes(&mut self, overlay: &AxisOverlay);
    /// Set the view matrix used by the following draw calls.
    fn set_view(&mut self, view: &Isometry3<f64>);
    /// Draw the box model with the given placement.
    fn draw_box(&mut self, placement: &Matrix4<f64>);
    /// Draw a gizmo representing a camera.
    fn draw_camera(&mut self, camera: &FlyCamera);
    /// Finish the frame.
    fn end_frame(&mut self);
}

/// A single call received by a [`RecordingRenderer`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// [`Renderer::begin_frame`]
    BeginFrame,
    /// [`Renderer::draw_video_backdrop`]
    VideoBackdrop(u64),
    /// [`Renderer::draw_helpers`]
    Helpers,
    /// [`Renderer::set_wireframe`]
    Wireframe(bool),
    /// [`Renderer::draw_marker_axes`]
    MarkerAxes(AxisOverlay),
    /// [`Renderer::set_view`]
    SetView(Isometry3<f64>),
    /// [`Renderer::draw_box`]
    DrawBox(Matrix4<f64>),
    /// [`Renderer::draw_camera`], with the camera's view matrix.
    DrawCamera(Isometry3<f64>),
    /// [`Renderer::end_frame`]
    EndFrame,
}

/// A renderer which records every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    commands: Vec<DrawCommand>,
}

impl RecordingRenderer {
    /// Return the recorded commands.
    #[inline]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Return the recorded commands and clear the recording.
    pub fn take(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Return the placements of all recorded box draws.
    pub fn box_placements(&self) -> Vec<Matrix4<f64>> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::DrawBox(placement) => Some(*placement),
                _ => None,
            })
            .collect()
    }

    /// Return all view matrices that were set.
    pub fn views(&self) -> Vec<Isometry3<f64>> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::SetView(view) => Some(*view),
                _ => None,
            })
            .collect()
    }
}

impl Renderer for RecordingRenderer {
    fn begin_frame(&mut self) {
        self.commands.push(DrawCommand::BeginFrame);
    }

    fn draw_video_backdrop(&mut self, frame_index: u64) {
        self.commands.push(DrawCommand::VideoBackdrop(frame_index));
    }

    fn draw_helpers(&mut self) {
        self.commands.push(DrawCommand::Helpers);
    }

    fn set_wireframe(&mut self, wireframe: bool) {
        self.commands.push(DrawCommand::Wireframe(wireframe));
    }

    fn draw_marker_axes(&mut self, overlay: &AxisOverlay) {
        self.commands.push(DrawCommand::MarkerAxes(overlay.clone()));
    }

    fn set_view(&mut self, view: &Isometry3<f64>) {
        self.commands.push(DrawCommand::SetView(*view));
    }

    fn draw_box(&mut self, placement: &Matrix4<f64>) {
        self.commands.push(DrawCommand::DrawBox(*placement));
    }

    fn draw_camera(&mut self, camera: &FlyCamera) {
        self.commands.push(DrawCommand::DrawCamera(camera.view_matrix()));
    }

    fn end_frame(&mut self) {
        self.commands.push(DrawCommand::EndFrame);
    }
}
