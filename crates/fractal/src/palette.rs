/// Capacity of the palette arrays in the fractal shader.
pub const MAX_PALETTE_COLORS: usize = 16;

/// User-editable color ramp.
///
/// The CPU side keeps an unbounded list; [`Palette::prepare_for_shader`]
/// squeezes it into the fixed-size arrays the shader declares.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    pub colors: Vec<[f32; 3]>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: vec![
                [0.0, 0.0, 0.5],
                [0.0, 0.2, 1.0],
                [1.0, 1.0, 0.0],
                [0.0, 0.0, 0.0],
            ],
        }
    }
}

/// Fixed-capacity palette as uploaded to `u_Colors`/`u_ColorPositions`.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderPalette {
    pub count: usize,
    pub colors: [[f32; 3]; MAX_PALETTE_COLORS],
    pub positions: [f32; MAX_PALETTE_COLORS],
}

impl ShaderPalette {
    /// Number of entries as the shader's `int` uniform.
    pub fn count_i32(&self) -> i32 {
        self.count as i32
    }

    /// Iterates the populated `(color, position)` slots.
    pub fn entries(&self) -> impl Iterator<Item = ([f32; 3], f32)> + '_ {
        self.colors
            .iter()
            .copied()
            .zip(self.positions.iter().copied())
            .take(self.count)
    }
}

impl Palette {
    pub fn new(colors: Vec<[f32; 3]>) -> Self {
        Self { colors }
    }

    /// Derives the shader arrays: at most [`MAX_PALETTE_COLORS`] colors, evenly
    /// spaced over `[0, 1]`. Extra colors are dropped without error. A single
    /// color sits at position `0.0`.
    pub fn prepare_for_shader(&self) -> ShaderPalette {
        let count = self.colors.len().min(MAX_PALETTE_COLORS);
        let mut colors = [[0.0; 3]; MAX_PALETTE_COLORS];
        let mut positions = [0.0; MAX_PALETTE_COLORS];

        for (index, color) in self.colors.iter().take(count).enumerate() {
            colors[index] = *color;
            positions[index] = if count > 1 {
                index as f32 / (count - 1) as f32
            } else {
                0.0
            };
        }

        ShaderPalette {
            count,
            colors,
            positions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_shader_capacity() {
        let colors = (0..20).map(|i| [i as f32 / 20.0, 0.0, 1.0]).collect();
        let prepared = Palette::new(colors).prepare_for_shader();
        assert_eq!(prepared.count, 16);
        assert_eq!(prepared.positions[0], 0.0);
        assert_eq!(prepared.positions[15], 1.0);
        assert_eq!(prepared.colors[15], [15.0 / 20.0, 0.0, 1.0]);
    }

    #[test]
    fn single_color_sits_at_zero() {
        let prepared = Palette::new(vec![[1.0, 0.5, 0.25]]).prepare_for_shader();
        assert_eq!(prepared.count, 1);
        assert_eq!(prepared.positions[0], 0.0);
        assert!(prepared.positions.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn empty_palette_has_no_entries() {
        let prepared = Palette::new(Vec::new()).prepare_for_shader();
        assert_eq!(prepared.count, 0);
        assert_eq!(prepared.entries().count(), 0);
    }

    #[test]
    fn positions_are_evenly_spaced() {
        let prepared = Palette::default().prepare_for_shader();
        let expected = [0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0];
        for (actual, expected) in prepared.positions.iter().zip(expected) {
            assert!((actual - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn preparing_twice_is_identical() {
        let palette = Palette::default();
        assert_eq!(palette.prepare_for_shader(), palette.prepare_for_shader());
    }
}
