use crate::names::NamedEnum;
use crate::orbit_trap::OrbitTrap;
use crate::palette::Palette;

/// Recurrence evaluated per pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum FractalAlgorithm {
    /// `z = z^n + c`
    #[default]
    Mandelbrot,
    /// `z = (|re z| + i|im z|)^n + c`
    BurningShip,
    /// `z = conj(z)^n + c`
    Tricorn,
}

impl NamedEnum for FractalAlgorithm {
    const KIND: &'static str = "fractal algorithm";
    const TABLE: &'static [(Self, &'static str)] = &[
        (Self::Mandelbrot, "Mandelbrot"),
        (Self::BurningShip, "Burning Ship"),
        (Self::Tricorn, "Tricorn"),
    ];
    const FALLBACK: Self = Self::Mandelbrot;
}

/// How escaped points are colored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ColorAlgorithm {
    Step,
    #[default]
    Smooth,
    DistanceEstimation,
}

impl NamedEnum for ColorAlgorithm {
    const KIND: &'static str = "exterior coloring";
    const TABLE: &'static [(Self, &'static str)] = &[
        (Self::Step, "Step"),
        (Self::Smooth, "Smooth"),
        (Self::DistanceEstimation, "Distance Estimation"),
    ];
    const FALLBACK: Self = Self::Step;
}

/// How points that never escape are colored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum InteriorColoring {
    Black,
    White,
    #[default]
    CustomColor,
}

impl NamedEnum for InteriorColoring {
    const KIND: &'static str = "interior coloring";
    const TABLE: &'static [(Self, &'static str)] = &[
        (Self::Black, "Black"),
        (Self::White, "White"),
        (Self::CustomColor, "Custom Color"),
    ];
    const FALLBACK: Self = Self::Black;
}

/// The full parameter set rendered by the fractal shader.
///
/// `Rotation` is stored in degrees; the renderer converts it to radians on
/// upload. Continuous fields are smoothed by [`crate::FractalState`], discrete
/// ones (enums, flags, `max_iterations`, the palette, the trap type) switch
/// instantly.
#[derive(Clone, Debug, PartialEq)]
pub struct FractalParameters {
    pub algorithm: FractalAlgorithm,
    pub power: f32,
    pub bailout: f32,
    pub max_iterations: i32,

    pub zoom: f32,
    pub position: [f32; 2],
    pub rotation: f32,

    pub julia_mode: bool,
    pub julia_c: [f32; 2],

    pub exterior_coloring: ColorAlgorithm,
    pub interior_coloring: InteriorColoring,
    pub interior_color: [f32; 3],
    pub color_frequency: f32,
    pub color_offset: f32,
    pub orbit_coloring: bool,
    pub distance_scale: f32,

    pub trap: OrbitTrap,
    pub palette: Palette,
}

impl Default for FractalParameters {
    fn default() -> Self {
        Self {
            algorithm: FractalAlgorithm::Mandelbrot,
            power: 2.0,
            bailout: 16.0,
            max_iterations: 256,
            zoom: 1.0,
            position: [-0.5, 0.0],
            rotation: 0.0,
            julia_mode: false,
            julia_c: [-0.8, 0.156],
            exterior_coloring: ColorAlgorithm::Smooth,
            interior_coloring: InteriorColoring::CustomColor,
            interior_color: [0.0, 0.0, 0.0],
            color_frequency: 1.0,
            color_offset: 0.0,
            orbit_coloring: false,
            distance_scale: 50.0,
            trap: OrbitTrap::default(),
            palette: Palette::default(),
        }
    }
}

impl FractalParameters {
    /// Returns true when every invariant the shader relies on holds.
    pub fn is_valid(&self) -> bool {
        self.max_iterations > 0
            && self.zoom.is_finite()
            && self.zoom > 0.0
            && self.power.is_finite()
            && self.bailout.is_finite()
            && (0.0..=1.0).contains(&self.trap.blend)
    }

    /// Repairs invariant violations by restoring fields from `fallback`.
    ///
    /// Each repaired field is logged. The trap blend factor is clamped rather
    /// than replaced.
    pub fn sanitized(mut self, fallback: &FractalParameters) -> Self {
        if self.max_iterations <= 0 {
            tracing::warn!(
                value = self.max_iterations,
                fallback = fallback.max_iterations,
                "MaxIterations must be positive"
            );
            self.max_iterations = fallback.max_iterations;
        }
        if !(self.zoom.is_finite() && self.zoom > 0.0) {
            tracing::warn!(
                value = self.zoom,
                fallback = fallback.zoom,
                "Zoom must be finite and positive"
            );
            self.zoom = fallback.zoom;
        }
        if !self.power.is_finite() {
            tracing::warn!(value = self.power, fallback = fallback.power, "Power must be finite");
            self.power = fallback.power;
        }
        if !self.bailout.is_finite() {
            tracing::warn!(
                value = self.bailout,
                fallback = fallback.bailout,
                "Bailout must be finite"
            );
            self.bailout = fallback.bailout;
        }
        if !self.trap.blend.is_finite() {
            self.trap.blend = fallback.trap.blend;
        }
        self.trap.blend = self.trap.blend.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let params = FractalParameters::default();
        assert!(params.is_valid());
        assert_eq!(params.position, [-0.5, 0.0]);
        assert_eq!(params.palette.colors.len(), 4);
    }

    #[test]
    fn sanitized_restores_broken_fields() {
        let fallback = FractalParameters::default();
        let mut broken = FractalParameters {
            max_iterations: 0,
            zoom: -2.0,
            power: f32::NAN,
            ..FractalParameters::default()
        };
        broken.trap.blend = 3.0;

        let repaired = broken.sanitized(&fallback);
        assert!(repaired.is_valid());
        assert_eq!(repaired.max_iterations, 256);
        assert_eq!(repaired.zoom, 1.0);
        assert_eq!(repaired.power, 2.0);
        assert_eq!(repaired.trap.blend, 1.0);
    }

    #[test]
    fn sanitized_keeps_valid_values() {
        let fallback = FractalParameters::default();
        let custom = FractalParameters {
            max_iterations: 1000,
            zoom: 250.0,
            power: 3.5,
            ..FractalParameters::default()
        };
        assert_eq!(custom.clone().sanitized(&fallback), custom);
    }
}
