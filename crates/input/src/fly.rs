use crate::action::{Action, InputState};
use glam::{Mat3, Vec3};
use lumen_kernel::{NodeId, SceneError, World};

const PITCH_LIMIT: f32 = 89.0 * std::f32::consts::PI / 180.0;

/// Yaw/pitch fly camera that drives a scene node.
///
/// Writes rotation and position into the node's local transform, so the
/// driven node is expected to be a root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlyController {
    /// Radians about +Y. Zero looks down -Z.
    pub yaw: f32,
    /// Radians about the camera's X axis. Positive looks up.
    pub pitch: f32,
    /// World units per second.
    pub speed: f32,
    /// Radians per pixel of mouse motion.
    pub sensitivity: f32,
    pub sprint_multiplier: f32,
}

impl Default for FlyController {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            speed: 5.0,
            sensitivity: 0.003,
            sprint_multiplier: 3.0,
        }
    }
}

impl FlyController {
    /// A controller whose camera at `eye` looks at `target`.
    pub fn looking_at(eye: Vec3, target: Vec3) -> Self {
        let dir = (target - eye).normalize_or(Vec3::NEG_Z);
        Self {
            yaw: (-dir.x).atan2(-dir.z),
            pitch: dir.y.clamp(-1.0, 1.0).asin().clamp(-PITCH_LIMIT, PITCH_LIMIT),
            ..Self::default()
        }
    }

    /// Mouse right turns right, mouse down looks down.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw -= dx * self.sensitivity;
        self.pitch = (self.pitch - dy * self.sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn orientation(&self) -> Mat3 {
        Mat3::from_rotation_y(self.yaw) * Mat3::from_rotation_x(self.pitch)
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation() * Vec3::NEG_Z
    }

    /// Consume look motion, orient the node, then move it along its own
    /// forward and right axes and world up.
    pub fn update(
        &mut self,
        world: &mut World,
        node: NodeId,
        input: &mut InputState,
        dt: f32,
    ) -> Result<(), SceneError> {
        let look = input.take_look();
        self.rotate(look.x, look.y);

        let rotation = euler_xyz(self.orientation());
        let n = world.node_mut(node).ok_or(SceneError::NodeNotFound(node))?;
        n.transform.rotation = rotation;

        let intent = input.movement();
        if intent == Vec3::ZERO {
            return Ok(());
        }
        let forward = world.forward(node).unwrap_or(Vec3::NEG_Z);
        let right = world.right(node).unwrap_or(Vec3::X);
        let mut speed = self.speed * dt;
        if input.is_held(Action::Sprint) {
            speed *= self.sprint_multiplier;
        }
        let delta = (right * intent.x + Vec3::Y * intent.y + forward * intent.z).normalize_or_zero();

        let n = world.node_mut(node).ok_or(SceneError::NodeNotFound(node))?;
        n.transform.position += delta * speed;
        tracing::trace!(position = ?n.transform.position, "camera moved");
        Ok(())
    }
}

/// Angles `(a, b, c)` with `m == Rx(a) * Ry(b) * Rz(c)`.
fn euler_xyz(m: Mat3) -> Vec3 {
    let sin_b = m.z_axis.x.clamp(-1.0, 1.0);
    let b = sin_b.asin();
    if sin_b.abs() < 0.9999 {
        Vec3::new(
            (-m.z_axis.y).atan2(m.z_axis.z),
            b,
            (-m.y_axis.x).atan2(m.x_axis.x),
        )
    } else {
        // Gimbal lock: fold the whole remaining rotation into X.
        Vec3::new(m.y_axis.z.atan2(m.y_axis.y), b, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    fn rig() -> (World, NodeId) {
        let mut world = World::new();
        let node = world.create_node("camera");
        (world, node)
    }

    #[test]
    fn default_looks_down_negative_z() {
        let (mut world, node) = rig();
        let mut input = InputState::new();
        let mut fly = FlyController::default();
        fly.update(&mut world, node, &mut input, 0.016).unwrap();
        assert!(approx(world.forward(node).unwrap(), Vec3::NEG_Z));
    }

    #[test]
    fn node_forward_matches_controller() {
        let (mut world, node) = rig();
        let mut input = InputState::new();
        for (yaw, pitch) in [(0.7, 0.3), (-2.0, -0.5), (std::f32::consts::FRAC_PI_2, 0.0)] {
            let mut fly = FlyController {
                yaw,
                pitch,
                ..FlyController::default()
            };
            fly.update(&mut world, node, &mut input, 0.0).unwrap();
            assert!(
                approx(world.forward(node).unwrap(), fly.forward()),
                "yaw {yaw} pitch {pitch}"
            );
        }
    }

    #[test]
    fn quarter_turn_faces_negative_x() {
        let fly = FlyController {
            yaw: std::f32::consts::FRAC_PI_2,
            ..FlyController::default()
        };
        assert!(approx(fly.forward(), Vec3::NEG_X));
    }

    #[test]
    fn pitch_is_clamped() {
        let mut fly = FlyController::default();
        fly.rotate(0.0, -1.0e6);
        assert!((fly.pitch - PITCH_LIMIT).abs() < 1e-6);
        fly.rotate(0.0, 1.0e6);
        assert!((fly.pitch + PITCH_LIMIT).abs() < 1e-6);
    }

    #[test]
    fn looking_at_points_at_target() {
        let eye = Vec3::new(0.0, 10.0, 15.0);
        let fly = FlyController::looking_at(eye, Vec3::ZERO);
        assert!(approx(fly.forward(), (Vec3::ZERO - eye).normalize()));
    }

    #[test]
    fn forward_input_moves_along_view() {
        let (mut world, node) = rig();
        let mut input = InputState::new();
        input.press(Action::MoveForward);
        let mut fly = FlyController {
            speed: 2.0,
            ..FlyController::default()
        };
        fly.update(&mut world, node, &mut input, 0.5).unwrap();
        assert!(approx(world.world_position(node).unwrap(), Vec3::new(0.0, 0.0, -1.0)));

        input.press(Action::Sprint);
        fly.update(&mut world, node, &mut input, 0.5).unwrap();
        assert!(approx(world.world_position(node).unwrap(), Vec3::new(0.0, 0.0, -4.0)));
    }

    #[test]
    fn mouse_motion_turns_the_node() {
        let (mut world, node) = rig();
        let mut input = InputState::new();
        input.set_looking(true);
        input.add_look(100.0, 0.0);
        let mut fly = FlyController::default();
        fly.update(&mut world, node, &mut input, 0.0).unwrap();
        assert!(fly.yaw < 0.0);
        // Turned right: forward gains +X.
        assert!(world.forward(node).unwrap().x > 0.0);
    }

    #[test]
    fn missing_node_is_an_error() {
        let (mut world, node) = rig();
        world.destroy_node(node).unwrap();
        let mut fly = FlyController::default();
        let result = fly.update(&mut world, node, &mut InputState::new(), 0.1);
        assert!(matches!(result, Err(SceneError::NodeNotFound(_))));
    }
}
