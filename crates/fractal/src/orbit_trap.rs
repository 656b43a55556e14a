use crate::names::NamedEnum;

/// Geometric shape the orbit is measured against.
///
/// `P1` and `P2` are reinterpreted per shape: a point uses `P1`; a circle uses
/// `P1` as center and `P2.x` as radius; a line runs from `P1` to `P2`; a box is
/// centered on `P1` with half-size `P2`; a cross is centered on `P1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum OrbitTrapType {
    #[default]
    None,
    Point,
    Circle,
    Line,
    Box,
    Cross,
}

impl NamedEnum for OrbitTrapType {
    const KIND: &'static str = "orbit trap";
    const TABLE: &'static [(Self, &'static str)] = &[
        (Self::None, "None"),
        (Self::Point, "Point"),
        (Self::Circle, "Circle"),
        (Self::Line, "Line"),
        (Self::Box, "Box"),
        (Self::Cross, "Cross"),
    ];
    const FALLBACK: Self = Self::None;
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrbitTrap {
    pub trap_type: OrbitTrapType,
    pub p1: [f32; 2],
    pub p2: [f32; 2],
    pub color: [f32; 3],
    /// Blend factor in `[0, 1]`.
    pub blend: f32,
}

impl Default for OrbitTrap {
    fn default() -> Self {
        Self {
            trap_type: OrbitTrapType::None,
            p1: [0.0, 0.0],
            p2: [0.5, 0.5],
            color: [1.0, 1.0, 0.0],
            blend: 0.5,
        }
    }
}

impl OrbitTrap {
    pub fn is_enabled(&self) -> bool {
        self.trap_type != OrbitTrapType::None
    }
}
