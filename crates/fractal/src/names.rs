/// A fieldless enum backed by a single bidirectional name table.
///
/// The table is the only place a variant's serialized name is written down, so
/// the enum-to-name and name-to-enum directions cannot drift apart. Table order
/// defines the ordinal that crosses the CPU/GPU boundary.
pub trait NamedEnum: Copy + PartialEq + Sized + 'static {
    /// Label used in log messages when a lookup fails.
    const KIND: &'static str;
    /// Every variant paired with its serialized name, in ordinal order.
    const TABLE: &'static [(Self, &'static str)];
    /// Variant used when a document names something that does not exist.
    const FALLBACK: Self;

    fn name(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(variant, _)| *variant == self)
            .map(|(_, name)| *name)
            .unwrap_or("Unknown")
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(_, candidate)| *candidate == name)
            .map(|(variant, _)| *variant)
    }

    fn from_name_or_fallback(name: &str) -> Self {
        match Self::from_name(name) {
            Some(variant) => variant,
            None => {
                tracing::warn!(
                    kind = Self::KIND,
                    name,
                    fallback = Self::FALLBACK.name(),
                    "unrecognised enum name; using fallback"
                );
                Self::FALLBACK
            }
        }
    }

    /// Integer sent to the shader for this variant.
    fn ordinal(self) -> i32 {
        Self::TABLE
            .iter()
            .position(|(variant, _)| *variant == self)
            .map(|index| index as i32)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColorAlgorithm, FractalAlgorithm, InteriorColoring, OrbitTrapType};

    fn assert_table_round_trips<T: NamedEnum + std::fmt::Debug>() {
        for (index, (variant, name)) in T::TABLE.iter().enumerate() {
            assert_eq!(variant.name(), *name);
            assert_eq!(T::from_name(name), Some(*variant));
            assert_eq!(variant.ordinal(), index as i32);
        }
    }

    #[test]
    fn tables_map_both_directions() {
        assert_table_round_trips::<FractalAlgorithm>();
        assert_table_round_trips::<ColorAlgorithm>();
        assert_table_round_trips::<InteriorColoring>();
        assert_table_round_trips::<OrbitTrapType>();
    }

    #[test]
    fn unknown_names_use_fallback() {
        assert_eq!(
            FractalAlgorithm::from_name_or_fallback("NotARealAlgorithm"),
            FractalAlgorithm::Mandelbrot
        );
        assert_eq!(
            ColorAlgorithm::from_name_or_fallback("Rainbow"),
            ColorAlgorithm::Step
        );
        assert_eq!(
            InteriorColoring::from_name_or_fallback(""),
            InteriorColoring::Black
        );
        assert_eq!(
            OrbitTrapType::from_name_or_fallback("box"),
            OrbitTrapType::None
        );
    }

    #[test]
    fn display_names_keep_spaces() {
        assert_eq!(FractalAlgorithm::BurningShip.name(), "Burning Ship");
        assert_eq!(ColorAlgorithm::DistanceEstimation.name(), "Distance Estimation");
        assert_eq!(InteriorColoring::CustomColor.name(), "Custom Color");
    }
}
