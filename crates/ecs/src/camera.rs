use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Projection model of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// Vertical field of view in radians.
    Perspective { fov_y: f32 },
    /// Visible height in world units.
    Orthographic { height: f32 },
}

/// A viewpoint attached to a scene node.
///
/// The view matrix is the inverse of the owning node's world transform, so a
/// camera looks down its node's local -Z axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub projection: Projection,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Projection::Perspective {
                fov_y: 60.0_f32.to_radians(),
            },
            near: 0.1,
            far: 100.0,
            aspect: 16.0 / 9.0,
        }
    }
}

impl Camera {
    pub fn perspective(fov_y: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Perspective { fov_y },
            near,
            far,
            ..Self::default()
        }
    }

    pub fn orthographic(height: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Orthographic { height },
            near,
            far,
            ..Self::default()
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective { fov_y } => {
                Mat4::perspective_rh(fov_y, self.aspect, self.near, self.far)
            }
            Projection::Orthographic { height } => {
                let half_w = height * self.aspect * 0.5;
                let half_h = height * 0.5;
                Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, self.near, self.far)
            }
        }
    }

    /// View matrix for a camera whose node has world transform `node_world`.
    pub fn view_matrix(&self, node_world: Mat4) -> Mat4 {
        node_world.inverse()
    }
}

/// Matrices and eye position of a camera for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
}

impl CameraMatrices {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}
