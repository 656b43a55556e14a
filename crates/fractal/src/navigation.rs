use crate::state::FractalState;

/// Degrees per second at a rotation speed of 1.0.
const ROTATION_DEGREES_PER_SECOND: f32 = 100.0;
const MAX_ROTATION_DEGREES: f32 = 360.0;

/// Held navigation keys for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NavigationInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub zoom_in: bool,
    pub zoom_out: bool,
    pub rotate_left: bool,
    pub rotate_right: bool,
}

impl NavigationInput {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

impl FractalState {
    /// Applies held navigation keys to the target parameters.
    ///
    /// Movement is expressed in screen space, so it is rotated by the target
    /// rotation and divided by the zoom to keep the on-screen speed constant.
    pub fn navigate(&mut self, input: &NavigationInput, dt: f32) {
        if input.is_idle() || !dt.is_finite() || dt <= 0.0 {
            return;
        }

        let movement_speed = self.movement_speed;
        let zoom_speed = self.zoom_speed;
        let rotation_speed = self.rotation_speed;
        let target = self.target_mut();

        let mut direction = [0.0f32, 0.0f32];
        if input.up {
            direction[1] += 1.0;
        }
        if input.down {
            direction[1] -= 1.0;
        }
        if input.left {
            direction[0] -= 1.0;
        }
        if input.right {
            direction[0] += 1.0;
        }

        let length = (direction[0] * direction[0] + direction[1] * direction[1]).sqrt();
        if length > 0.0 {
            let (x, y) = (direction[0] / length, direction[1] / length);
            let (sin, cos) = target.rotation.to_radians().sin_cos();
            let rotated = [cos * x + sin * y, -sin * x + cos * y];
            let scale = movement_speed * dt / target.zoom;
            target.position[0] += rotated[0] * scale;
            target.position[1] += rotated[1] * scale;
        }

        let zoom_step = zoom_speed * target.zoom * dt;
        let mut zoom = target.zoom;
        if input.zoom_in {
            zoom += zoom_step;
        }
        if input.zoom_out {
            zoom -= zoom_step;
        }
        if zoom.is_finite() && zoom > 0.0 {
            target.zoom = zoom;
        } else {
            tracing::debug!(zoom, "rejecting zoom step that leaves the valid range");
        }

        let rotation_step = rotation_speed * ROTATION_DEGREES_PER_SECOND * dt;
        if input.rotate_left {
            target.rotation = if target.rotation <= 0.0 {
                0.0
            } else {
                target.rotation - rotation_step
            };
        }
        if input.rotate_right {
            target.rotation = if target.rotation >= MAX_ROTATION_DEGREES {
                MAX_ROTATION_DEGREES
            } else {
                target.rotation + rotation_step
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_right_shifts_position_by_speed_over_zoom() {
        let mut state = FractalState::default();
        state.target_mut().zoom = 4.0;
        let input = NavigationInput {
            right: true,
            ..NavigationInput::default()
        };
        state.navigate(&input, 0.5);
        let position = state.target().position;
        assert!((position[0] - (-0.5 + 0.125)).abs() < 1e-6);
        assert!(position[1].abs() < 1e-6);
        assert_eq!(state.current().position, [-0.5, 0.0]);
    }

    #[test]
    fn movement_follows_rotation() {
        let mut state = FractalState::default();
        state.target_mut().rotation = 90.0;
        let input = NavigationInput {
            right: true,
            ..NavigationInput::default()
        };
        state.navigate(&input, 1.0);
        let position = state.target().position;
        assert!((position[0] - -0.5).abs() < 1e-5);
        assert!((position[1] - -1.0).abs() < 1e-5);
    }

    #[test]
    fn zoom_out_never_reaches_zero() {
        let mut state = FractalState::default();
        let input = NavigationInput {
            zoom_out: true,
            ..NavigationInput::default()
        };
        state.navigate(&input, 5.0);
        assert!(state.target().zoom > 0.0);
    }

    #[test]
    fn rotation_is_floored_and_capped() {
        let mut state = FractalState::default();
        let left = NavigationInput {
            rotate_left: true,
            ..NavigationInput::default()
        };
        state.navigate(&left, 0.1);
        state.navigate(&left, 0.1);
        assert!(state.target().rotation <= 0.0);

        state.target_mut().rotation = 360.0;
        let right = NavigationInput {
            rotate_right: true,
            ..NavigationInput::default()
        };
        state.navigate(&right, 0.1);
        assert_eq!(state.target().rotation, 360.0);
    }
}
