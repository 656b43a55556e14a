use crate::params::FractalParameters;

const DEFAULT_SMOOTHING: f32 = 5.0;
const DEFAULT_MOVEMENT_SPEED: f32 = 1.0;
const DEFAULT_ROTATION_SPEED: f32 = 1.0;
const DEFAULT_ZOOM_SPEED: f32 = 1.0;

/// Double-buffered fractal parameters.
///
/// `target` is what editors, loaders, and navigation write. `current` is what
/// gets rendered and only [`FractalState::update`] moves it, easing every
/// continuous field toward `target` with
/// `alpha = 1 - exp(-smoothing * dt)`.
///
/// Stepping twice with `dt1` and `dt2` matches one step of `dt1 + dt2` only
/// while `target` stays fixed; with a moving target the rule is a first-order
/// approximation of continuous decay.
#[derive(Clone, Debug)]
pub struct FractalState {
    target: FractalParameters,
    current: FractalParameters,
    smoothing: f32,
    pub(crate) movement_speed: f32,
    pub(crate) rotation_speed: f32,
    pub(crate) zoom_speed: f32,
}

impl Default for FractalState {
    fn default() -> Self {
        Self::new(FractalParameters::default())
    }
}

impl FractalState {
    /// Starts a session with `current` already equal to `initial`.
    pub fn new(initial: FractalParameters) -> Self {
        Self {
            current: initial.clone(),
            target: initial,
            smoothing: DEFAULT_SMOOTHING,
            movement_speed: DEFAULT_MOVEMENT_SPEED,
            rotation_speed: DEFAULT_ROTATION_SPEED,
            zoom_speed: DEFAULT_ZOOM_SPEED,
        }
    }

    pub fn target(&self) -> &FractalParameters {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut FractalParameters {
        &mut self.target
    }

    /// The animated parameter set handed to the renderer.
    pub fn current(&self) -> &FractalParameters {
        &self.current
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    pub fn movement_speed(&self) -> f32 {
        self.movement_speed
    }

    pub fn rotation_speed(&self) -> f32 {
        self.rotation_speed
    }

    pub fn zoom_speed(&self) -> f32 {
        self.zoom_speed
    }

    pub fn set_smoothing(&mut self, value: f32) {
        if let Some(value) = positive("smoothing", value) {
            self.smoothing = value;
        }
    }

    pub fn set_movement_speed(&mut self, value: f32) {
        if let Some(value) = positive("movement_speed", value) {
            self.movement_speed = value;
        }
    }

    pub fn set_rotation_speed(&mut self, value: f32) {
        if let Some(value) = positive("rotation_speed", value) {
            self.rotation_speed = value;
        }
    }

    pub fn set_zoom_speed(&mut self, value: f32) {
        if let Some(value) = positive("zoom_speed", value) {
            self.zoom_speed = value;
        }
    }

    /// Smoothing weight for a step of `dt` seconds.
    pub fn alpha(&self, dt: f32) -> f32 {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        1.0 - (-self.smoothing * dt).exp()
    }

    /// Advances `current` toward `target` by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        let alpha = self.alpha(dt);
        let target = &self.target;
        let current = &mut self.current;

        current.power = lerp(current.power, target.power, alpha);
        current.bailout = lerp(current.bailout, target.bailout, alpha);
        current.zoom = lerp(current.zoom, target.zoom, alpha);
        current.position = lerp_array(current.position, target.position, alpha);
        current.rotation = lerp(current.rotation, target.rotation, alpha);
        current.julia_c = lerp_array(current.julia_c, target.julia_c, alpha);

        current.color_frequency = lerp(current.color_frequency, target.color_frequency, alpha);
        current.color_offset = lerp(current.color_offset, target.color_offset, alpha);
        current.distance_scale = lerp(current.distance_scale, target.distance_scale, alpha);
        current.interior_color = lerp_array(current.interior_color, target.interior_color, alpha);

        current.trap.p1 = lerp_array(current.trap.p1, target.trap.p1, alpha);
        current.trap.p2 = lerp_array(current.trap.p2, target.trap.p2, alpha);
        current.trap.color = lerp_array(current.trap.color, target.trap.color, alpha);
        current.trap.blend = lerp(current.trap.blend, target.trap.blend, alpha);

        // Discrete selectors have no meaningful in-between value.
        current.algorithm = target.algorithm;
        current.orbit_coloring = target.orbit_coloring;
        current.julia_mode = target.julia_mode;
        current.max_iterations = target.max_iterations;
        current.exterior_coloring = target.exterior_coloring;
        current.interior_coloring = target.interior_coloring;
        current.palette.clone_from(&target.palette);
        current.trap.trap_type = target.trap.trap_type;
    }
}

fn positive(name: &'static str, value: f32) -> Option<f32> {
    if value.is_finite() && value > 0.0 {
        Some(value)
    } else {
        tracing::warn!(setting = name, value, "ignoring non-positive speed setting");
        None
    }
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from * (1.0 - t) + to * t
}

fn lerp_array<const N: usize>(from: [f32; N], to: [f32; N], t: f32) -> [f32; N] {
    std::array::from_fn(|i| lerp(from[i], to[i], t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FractalAlgorithm, OrbitTrapType, Palette};

    fn distant_target(state: &mut FractalState) {
        let target = state.target_mut();
        target.zoom = 40.0;
        target.position = [0.3, -0.7];
        target.power = 3.0;
        target.rotation = 90.0;
        target.trap.blend = 1.0;
    }

    #[test]
    fn current_converges_monotonically() {
        let mut state = FractalState::default();
        distant_target(&mut state);

        let mut last_zoom_gap = (state.target().zoom - state.current().zoom).abs();
        let mut last_x_gap = (state.target().position[0] - state.current().position[0]).abs();
        for _ in 0..30 {
            state.update(1.0 / 60.0);
            let zoom_gap = (state.target().zoom - state.current().zoom).abs();
            let x_gap = (state.target().position[0] - state.current().position[0]).abs();
            assert!(zoom_gap < last_zoom_gap);
            assert!(x_gap < last_x_gap);
            assert!(state.current().zoom <= state.target().zoom);
            last_zoom_gap = zoom_gap;
            last_x_gap = x_gap;
        }
    }

    #[test]
    fn discrete_fields_copy_instantly() {
        let mut state = FractalState::default();
        {
            let target = state.target_mut();
            target.max_iterations = 4096;
            target.algorithm = FractalAlgorithm::Tricorn;
            target.julia_mode = true;
            target.trap.trap_type = OrbitTrapType::Cross;
            target.palette = Palette::new(vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        }

        state.update(0.0);

        let (current, target) = (state.current(), state.target());
        assert_eq!(current.max_iterations, target.max_iterations);
        assert_eq!(current.algorithm, target.algorithm);
        assert_eq!(current.julia_mode, target.julia_mode);
        assert_eq!(current.trap.trap_type, target.trap.trap_type);
        assert_eq!(current.palette, target.palette);
        assert_eq!(current.zoom, 1.0);
    }

    #[test]
    fn large_step_lands_on_target() {
        let mut state = FractalState::default();
        distant_target(&mut state);
        state.update(1_000.0);
        assert_eq!(state.current(), state.target());
    }

    #[test]
    fn negative_or_nan_dt_does_not_move() {
        let mut state = FractalState::default();
        distant_target(&mut state);
        state.update(-1.0);
        state.update(f32::NAN);
        assert_eq!(state.current().zoom, 1.0);
    }

    #[test]
    fn split_steps_approximate_one_step() {
        let mut split = FractalState::default();
        let mut whole = FractalState::default();
        distant_target(&mut split);
        distant_target(&mut whole);

        split.update(0.01);
        split.update(0.02);
        whole.update(0.03);

        assert!((split.current().zoom - whole.current().zoom).abs() < 1e-3);
    }

    #[test]
    fn speed_setters_reject_non_positive_values() {
        let mut state = FractalState::default();
        state.set_smoothing(0.0);
        state.set_zoom_speed(-1.0);
        state.set_movement_speed(f32::INFINITY);
        state.set_rotation_speed(2.0);
        assert_eq!(state.smoothing(), 5.0);
        assert_eq!(state.zoom_speed(), 1.0);
        assert_eq!(state.movement_speed(), 1.0);
        assert_eq!(state.rotation_speed(), 2.0);
    }
}
