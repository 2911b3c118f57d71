//! Input: device-independent actions and the fly-camera controller.
//!
//! Windowing code maps raw key and mouse events to [`Action`]s and look
//! deltas; the controller turns an [`InputState`] into node transforms.
//!
//! # Invariants
//! - The controller only writes the transform of the node it drives.
//! - Pitch stays within ±89°, so the camera never flips over.

pub mod action;
mod fly;

pub use action::{Action, InputState};
pub use fly::FlyController;

pub fn crate_info() -> &'static str {
    "lumen-input v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("input"));
    }
}
