//! Keyboard and mouse handling.
//!
//! Input events arrive from the windowing layer between frames. They are
//! applied to an explicit [`ViewerState`] and to the camera slot of the active
//! mode; nothing else is mutated.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{CameraMode, CameraRig};

/// Distance moved per tick while a movement key is held.
pub const MOVE_STEP: f64 = 2.0;

/// Radians of yaw/pitch per pixel of right-button drag.
pub const LOOK_SPEED: f64 = 0.005;

/// Pan distance per pixel of middle-button drag, relative to the camera
/// distance.
pub const PAN_SPEED: f64 = 0.001;

/// Largest wheel zoom step.
pub const MAX_ZOOM_STEP: f64 = 50.0;

/// Camera distance beyond which the wheel uses [`MAX_ZOOM_STEP`].
pub const FAR_ZOOM_DISTANCE: f64 = 100.0;

/// Divisor applied to the wheel zoom step while the modifier key is held.
pub const FINE_ZOOM_DIVISOR: f64 = 2.0;

/// Keyboard keys the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Move forward.
    W,
    /// Move left.
    A,
    /// Move backward.
    S,
    /// Move right.
    D,
    /// Move up.
    E,
    /// Move down.
    C,
    /// Toggle wireframe.
    Tab,
    /// Toggle between the marker frame and third person modes.
    Enter,
    /// Toggle placement updates of the stabilized mode.
    Space,
    /// Digit key `1` to `4` selecting a mode.
    Digit(u8),
}

/// Mouse buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    /// Left button (tracked, no action).
    Left,
    /// Right button: look around.
    Right,
    /// Middle button: pan.
    Middle,
}

/// An input event delivered by the windowing layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    /// A key was pressed.
    KeyDown(Key),
    /// A key was released.
    KeyUp(Key),
    /// A mouse button was pressed at the given cursor position.
    ButtonDown {
        /// The button.
        button: MouseButton,
        /// Cursor x in pixels.
        x: i32,
        /// Cursor y in pixels.
        y: i32,
    },
    /// A mouse button was released.
    ButtonUp(MouseButton),
    /// The cursor moved.
    MouseMove {
        /// Cursor x in pixels.
        x: i32,
        /// Cursor y in pixels.
        y: i32,
    },
    /// The wheel turned; positive `delta` zooms in.
    Wheel {
        /// Wheel delta, only the sign is used.
        delta: i32,
        /// Whether the fine-zoom modifier is held.
        fine: bool,
    },
}

/// What an input event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Nothing changed.
    None,
    /// The viewing mode changed.
    ModeChanged(CameraMode),
    /// Wireframe drawing was switched.
    WireframeChanged(bool),
    /// Placement updates of the stabilized mode were switched.
    PlacementUpdatesChanged(bool),
    /// The active camera moved.
    CameraMoved,
}

/// The set of currently held keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeldKeys(HashSet<Key>);

impl HeldKeys {
    /// Mark a key as held.
    pub fn press(&mut self, key: Key) {
        self.0.insert(key);
    }

    /// Mark a key as released.
    pub fn release(&mut self, key: Key) {
        self.0.remove(&key);
    }

    /// Whether a key is held.
    pub fn is_held(&self, key: Key) -> bool {
        self.0.contains(&key)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Buttons {
    left: bool,
    right: bool,
    middle: bool,
}

/// Viewer state changed by user input.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerState {
    /// The active viewing mode.
    pub mode: CameraMode,
    /// Whether the stabilized mode re-anchors the box every frame.
    pub update_placement: bool,
    /// Whether geometry is drawn as wireframe.
    pub wireframe: bool,
    /// Keys currently held.
    pub keys: HeldKeys,
    buttons: Buttons,
    cursor: (i32, i32),
}

impl Default for ViewerState {
    fn default() -> Self {
        Self {
            mode: CameraMode::MarkerFrame,
            update_placement: true,
            wireframe: false,
            keys: HeldKeys::default(),
            buttons: Buttons::default(),
            cursor: (0, 0),
        }
    }
}

impl ViewerState {
    /// Apply one input event.
    pub fn handle(&mut self, event: InputEvent, rig: &mut CameraRig) -> Effect {
        match event {
            InputEvent::KeyDown(key) => {
                self.keys.press(key);
                self.key_down(key)
            }
            InputEvent::KeyUp(key) => {
                self.keys.release(key);
                Effect::None
            }
            InputEvent::ButtonDown { button, x, y } => {
                match button {
                    MouseButton::Left => self.buttons.left = true,
                    MouseButton::Right => self.buttons.right = true,
                    MouseButton::Middle => self.buttons.middle = true,
                }
                self.cursor = (x, y);
                Effect::None
            }
            InputEvent::ButtonUp(button) => {
                match button {
                    MouseButton::Left => self.buttons.left = false,
                    MouseButton::Right => self.buttons.right = false,
                    MouseButton::Middle => self.buttons.middle = false,
                }
                Effect::None
            }
            InputEvent::MouseMove { x, y } => self.mouse_move(x, y, rig),
            InputEvent::Wheel { delta, fine } => {
                if delta == 0 {
                    return Effect::None;
                }
                let camera = rig.slot_mut(self.mode);
                let distance = camera.distance();
                let mut step = if distance > FAR_ZOOM_DISTANCE {
                    MAX_ZOOM_STEP
                } else {
                    distance / 4.0
                };
                if fine {
                    step /= FINE_ZOOM_DIVISOR;
                }
                camera.zoom(if delta < 0 { -step } else { step });
                Effect::CameraMoved
            }
        }
    }

    /// Whether a mouse button is held.
    pub fn is_pressed(&self, button: MouseButton) -> bool {
        match button {
            MouseButton::Left => self.buttons.left,
            MouseButton::Right => self.buttons.right,
            MouseButton::Middle => self.buttons.middle,
        }
    }

    fn key_down(&mut self, key: Key) -> Effect {
        match key {
            Key::Tab => {
                self.wireframe = !self.wireframe;
                Effect::WireframeChanged(self.wireframe)
            }
            Key::Enter => {
                self.mode = match self.mode {
                    CameraMode::MarkerFrame => CameraMode::ThirdPerson,
                    _ => CameraMode::MarkerFrame,
                };
                Effect::ModeChanged(self.mode)
            }
            Key::Space => {
                self.update_placement = !self.update_placement;
                Effect::PlacementUpdatesChanged(self.update_placement)
            }
            Key::Digit(d @ 1..=4) => match CameraMode::try_from(d - 1) {
                Ok(mode) => {
                    self.mode = mode;
                    Effect::ModeChanged(mode)
                }
                Err(_) => Effect::None,
            },
            _ => Effect::None,
        }
    }

    fn mouse_move(&mut self, x: i32, y: i32, rig: &mut CameraRig) -> Effect {
        let dx = (i64::from(x) - i64::from(self.cursor.0)) as f64;
        let dy = (i64::from(y) - i64::from(self.cursor.1)) as f64;
        let camera = rig.slot_mut(self.mode);
        if self.buttons.right {
            self.cursor = (x, y);
            camera.yaw(dx * LOOK_SPEED);
            camera.pitch(dy * LOOK_SPEED);
            Effect::CameraMoved
        } else if self.buttons.middle {
            self.cursor = (x, y);
            let distance = camera.distance();
            camera.move_right(-dx * distance * PAN_SPEED);
            camera.move_up(dy * distance * PAN_SPEED);
            Effect::CameraMoved
        } else {
            Effect::None
        }
    }

    /// Move the active camera according to the held movement keys.
    ///
    /// At most one movement is applied per tick, in the priority order W, A,
    /// D, S, E, C.
    pub fn apply_held_keys(&self, rig: &mut CameraRig) -> Effect {
        let camera = rig.slot_mut(self.mode);
        if self.keys.is_held(Key::W) {
            camera.move_front(MOVE_STEP);
        } else if self.keys.is_held(Key::A) {
            camera.move_right(-MOVE_STEP);
        } else if self.keys.is_held(Key::D) {
            camera.move_right(MOVE_STEP);
        } else if self.keys.is_held(Key::S) {
            camera.move_front(-MOVE_STEP);
        } else if self.keys.is_held(Key::E) {
            camera.move_up(MOVE_STEP);
        } else if self.keys.is_held(Key::C) {
            camera.move_up(-MOVE_STEP);
        } else {
            return Effect::None;
        }
        Effect::CameraMoved
    }
}
