use glam::{Vec2, Vec3};
use std::collections::HashSet;

/// A high-level input action, independent of the device that produced it.
///
/// Window code maps raw events to actions; the camera controller consumes
/// actions, never raw input events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MoveForward,
    MoveBackward,
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    /// Multiplies movement speed while held.
    Sprint,
}

/// Held actions plus mouse-look motion accumulated since the last update.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    held: HashSet<Action>,
    look: Vec2,
    looking: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, action: Action) {
        self.held.insert(action);
    }

    pub fn release(&mut self, action: Action) {
        self.held.remove(&action);
    }

    pub fn set(&mut self, action: Action, pressed: bool) {
        if pressed {
            self.press(action);
        } else {
            self.release(action);
        }
    }

    pub fn is_held(&self, action: Action) -> bool {
        self.held.contains(&action)
    }

    /// Enable or disable mouse look. Motion is ignored while disabled.
    pub fn set_looking(&mut self, looking: bool) {
        self.looking = looking;
        if !looking {
            self.look = Vec2::ZERO;
        }
    }

    pub fn is_looking(&self) -> bool {
        self.looking
    }

    pub fn add_look(&mut self, dx: f32, dy: f32) {
        if self.looking {
            self.look += Vec2::new(dx, dy);
        }
    }

    /// Mouse motion since the previous call.
    pub fn take_look(&mut self) -> Vec2 {
        std::mem::take(&mut self.look)
    }

    /// Movement intent in camera space: x right, y up, z forward. Not normalized.
    pub fn movement(&self) -> Vec3 {
        let axis = |pos: Action, neg: Action| {
            (self.is_held(pos) as i32 - self.is_held(neg) as i32) as f32
        };
        Vec3::new(
            axis(Action::MoveRight, Action::MoveLeft),
            axis(Action::MoveUp, Action::MoveDown),
            axis(Action::MoveForward, Action::MoveBackward),
        )
    }

    pub fn clear(&mut self) {
        self.held.clear();
        self.look = Vec2::ZERO;
    }
}
