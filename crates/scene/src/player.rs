use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use lemuria_common::{Orientation, Pose, wrap_angle};
use lemuria_input::{InputState, NavKey};

use crate::config::MovementConfig;

/// The local user's root transform. Only the scene loop writes it.
///
/// Roll is carried for completeness but navigation never changes it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerState {
    pose: Pose,
}

impl PlayerState {
    pub fn new(pose: Pose) -> Self {
        Self { pose }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    pub fn orientation(&self) -> Orientation {
        self.pose.orientation
    }

    /// Teleport, keeping the world-floor and pitch limits.
    pub fn set_pose(&mut self, pose: Pose) {
        let mut pose = pose;
        pose.position.y = pose.position.y.max(0.0);
        pose.orientation.yaw = wrap_angle(pose.orientation.yaw);
        pose.orientation.pitch = pose.orientation.pitch.clamp(-FRAC_PI_2, FRAC_PI_2);
        self.pose = pose;
    }

    /// One frame of navigation from held keys.
    ///
    /// `facing` is the active camera's direction before this update. Every
    /// axis is computed from the old pose, then all are written at once.
    /// Returns whether the pose changed.
    pub fn apply_input(
        &mut self,
        input: &InputState,
        movement: &MovementConfig,
        facing: Vec3,
        dt: f32,
    ) -> bool {
        let scale = movement.mode.scale(dt);
        let run = if input.is_pressed(NavKey::ModifierSecondary) {
            movement.run_multiplier
        } else {
            1.0
        };

        let advance = input.axis(NavKey::MoveForward, NavKey::MoveBackward);
        let turn = input.axis(NavKey::TurnLeft, NavKey::TurnRight);
        let look = input.axis(NavKey::LookUp, NavKey::LookDown);
        let rise = input.axis(NavKey::RiseUp, NavKey::RiseDown);

        let old = self.pose;
        let mut position = old.position + facing * (movement.move_step * scale * run * advance);
        position.y += movement.rise_step * scale * run * rise;
        position.y = position.y.max(0.0);

        let yaw = if turn != 0.0 {
            wrap_angle(old.orientation.yaw + movement.turn_step * scale * turn)
        } else {
            old.orientation.yaw
        };
        let pitch = (old.orientation.pitch + movement.look_step * scale * look)
            .clamp(-FRAC_PI_2, FRAC_PI_2);

        self.pose = Pose::new(position, Orientation::new(yaw, pitch, old.orientation.roll));
        self.pose != old
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MovementMode;
    use approx::assert_relative_eq;
    use std::f32::consts::{PI, TAU};

    fn held(keys: &[NavKey]) -> InputState {
        let mut input = InputState::new();
        for key in keys {
            input.key_down(*key);
        }
        input
    }

    #[test]
    fn forward_moves_along_facing() {
        let mut player = PlayerState::default();
        let input = held(&[NavKey::MoveForward]);
        player.apply_input(&input, &MovementConfig::default(), Vec3::NEG_Z, 1.0 / 60.0);
        assert_relative_eq!(player.position().z, -0.1);
        assert_eq!(player.position().x, 0.0);
    }

    #[test]
    fn forward_and_backward_cancel() {
        let mut player = PlayerState::default();
        let input = held(&[NavKey::MoveForward, NavKey::MoveBackward]);
        let changed = player.apply_input(&input, &MovementConfig::default(), Vec3::NEG_Z, 0.016);
        assert!(!changed);
    }

    #[test]
    fn shift_runs_but_does_not_turn_faster() {
        let mut player = PlayerState::default();
        let input = held(&[NavKey::MoveForward, NavKey::TurnLeft, NavKey::ModifierSecondary]);
        player.apply_input(&input, &MovementConfig::default(), Vec3::NEG_Z, 0.016);
        assert_relative_eq!(player.position().z, -0.3, epsilon = 1e-6);
        assert_relative_eq!(player.orientation().yaw, 0.1);
    }

    #[test]
    fn yaw_stays_wrapped() {
        let mut player = PlayerState::default();
        let input = held(&[NavKey::TurnLeft]);
        let config = MovementConfig::default();
        let mut wrapped = false;
        for _ in 0..200 {
            let before = player.orientation().yaw;
            player.apply_input(&input, &config, Vec3::NEG_Z, 0.016);
            let after = player.orientation().yaw;
            assert!(after > -PI && after <= PI, "yaw {after} escaped (-pi, pi]");
            if after < before {
                assert_relative_eq!(after, before + 0.1 - TAU, epsilon = 1e-4);
                wrapped = true;
            }
        }
        assert!(wrapped);
    }

    #[test]
    fn turning_right_wraps_the_other_way() {
        let mut player = PlayerState::new(Pose::new(Vec3::ZERO, Orientation::new(-3.1, 0.0, 0.0)));
        let input = held(&[NavKey::TurnRight]);
        player.apply_input(&input, &MovementConfig::default(), Vec3::NEG_Z, 0.016);
        assert_relative_eq!(player.orientation().yaw, -3.2 + TAU, epsilon = 1e-5);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut player = PlayerState::default();
        let config = MovementConfig::default();
        let up = held(&[NavKey::LookUp]);
        for _ in 0..50 {
            player.apply_input(&up, &config, Vec3::NEG_Z, 0.016);
            assert!(player.orientation().pitch <= FRAC_PI_2);
        }
        assert_eq!(player.orientation().pitch, FRAC_PI_2);

        let down = held(&[NavKey::LookDown]);
        for _ in 0..100 {
            player.apply_input(&down, &config, Vec3::NEG_Z, 0.016);
        }
        assert_eq!(player.orientation().pitch, -FRAC_PI_2);
    }

    #[test]
    fn cannot_sink_below_the_floor() {
        let mut player = PlayerState::new(Pose::at(Vec3::new(0.0, 0.05, 0.0)));
        let input = held(&[NavKey::RiseDown]);
        player.apply_input(&input, &MovementConfig::default(), Vec3::NEG_Z, 0.016);
        assert_eq!(player.position().y, 0.0);

        // walking forward while looking down also stops at the floor
        let input = held(&[NavKey::MoveForward]);
        player.apply_input(&input, &MovementConfig::default(), Vec3::NEG_Y, 0.016);
        assert_eq!(player.position().y, 0.0);
    }

    #[test]
    fn per_second_mode_scales_with_delta() {
        let config = MovementConfig {
            mode: MovementMode::PerSecond {
                reference_rate: 60.0,
            },
            ..MovementConfig::default()
        };
        let input = held(&[NavKey::RiseUp]);

        let mut at_rate = PlayerState::default();
        at_rate.apply_input(&input, &config, Vec3::NEG_Z, 1.0 / 60.0);
        assert_relative_eq!(at_rate.position().y, 0.1, epsilon = 1e-6);

        let mut slow = PlayerState::default();
        slow.apply_input(&input, &config, Vec3::NEG_Z, 1.0 / 30.0);
        assert_relative_eq!(slow.position().y, 0.2, epsilon = 1e-6);
    }

    #[test]
    fn per_frame_mode_ignores_delta() {
        let input = held(&[NavKey::RiseUp]);
        let mut fast = PlayerState::default();
        fast.apply_input(&input, &MovementConfig::default(), Vec3::NEG_Z, 0.001);
        let mut slow = PlayerState::default();
        slow.apply_input(&input, &MovementConfig::default(), Vec3::NEG_Z, 0.5);
        assert_eq!(fast.position(), slow.position());
    }

    #[test]
    fn set_pose_enforces_limits() {
        let mut player = PlayerState::default();
        player.set_pose(Pose::new(
            Vec3::new(1.0, -5.0, 2.0),
            Orientation::new(4.0, 3.0, 0.0),
        ));
        assert_eq!(player.position(), Vec3::new(1.0, 0.0, 2.0));
        assert_relative_eq!(player.orientation().yaw, 4.0 - TAU, epsilon = 1e-6);
        assert_eq!(player.orientation().pitch, FRAC_PI_2);
    }
}
