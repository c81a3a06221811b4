use crate::{
    AxisOverlay, CameraRig, Effect, FrameSource, InputEvent, Marker, MarkerBackend,
    MarkerPipeline, Renderer, Result, ViewComposer, ViewerConfig, ViewerState,
};

/// The frame loop: runs the marker pipeline, applies input and renders the
/// active viewing mode.
#[derive(Debug)]
pub struct Viewer<S, B> {
    pipeline: MarkerPipeline<S, B>,
    state: ViewerState,
    rig: CameraRig,
    composer: ViewComposer,
    markers: Vec<Marker>,
    overlays: Vec<AxisOverlay>,
    frame_index: Option<u64>,
}

impl<S, B> Viewer<S, B>
where
    S: FrameSource,
    B: MarkerBackend<S::Image>,
{
    /// Create a viewer with every camera slot at the configured start state.
    pub fn new(pipeline: MarkerPipeline<S, B>, config: &ViewerConfig) -> Self {
        log::info!(
            "viewer {}x{}, origin marker {}",
            config.window_width,
            config.window_height,
            config.origin_marker_id
        );
        Self {
            pipeline,
            state: ViewerState::default(),
            rig: CameraRig::new(config.start_camera()),
            composer: ViewComposer::new(config.origin_marker_id),
            markers: Vec::new(),
            overlays: Vec::new(),
            frame_index: None,
        }
    }

    /// Apply an input event.
    pub fn handle_event(&mut self, event: InputEvent) -> Effect {
        let effect = self.state.handle(event, &mut self.rig);
        if effect != Effect::None {
            log::debug!("{event:?}: {effect:?}");
        }
        effect
    }

    /// Run one tick of the pipeline and apply held movement keys.
    ///
    /// Returns `false` if the capture failed; the tick is skipped and the
    /// previous frame is kept.
    pub fn update(&mut self) -> Result<bool> {
        let Some(frame) = self.pipeline.tick()? else {
            return Ok(false);
        };
        self.state.apply_held_keys(&mut self.rig);
        self.markers = frame.markers;
        self.overlays = frame.overlays;
        self.frame_index = Some(frame.index);
        Ok(true)
    }

    /// Draw the current frame.
    pub fn render<R>(&mut self, renderer: &mut R)
    where
        R: Renderer + ?Sized,
    {
        renderer.begin_frame();
        renderer.set_wireframe(self.state.wireframe);
        if let Some(index) = self.frame_index {
            renderer.draw_video_backdrop(index);
        }
        renderer.draw_helpers();
        for overlay in &self.overlays {
            renderer.draw_marker_axes(overlay);
        }
        self.composer
            .compose(&self.markers, &self.state, &mut self.rig, renderer);
        renderer.end_frame();
    }

    /// Return the input state.
    #[inline]
    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    /// Return the camera rig.
    #[inline]
    pub fn rig(&self) -> &CameraRig {
        &self.rig
    }

    /// Return the markers of the last captured frame.
    #[inline]
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Return the marker pipeline.
    #[inline]
    pub fn pipeline(&self) -> &MarkerPipeline<S, B> {
        &self.pipeline
    }
}
