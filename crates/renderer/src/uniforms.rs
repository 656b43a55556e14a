//! Typed uniform values and their std140 placement.
//!
//! Fractal shaders declare loose GL-style uniforms; [`crate::compile`] gathers
//! them into one std140 block. [`UniformBlockLayout`] records where each member
//! lives, and [`UniformBlock`] is the CPU mirror backends copy to the GPU before
//! a draw.

use bytemuck::pod_read_unaligned;
use tracing::{trace, warn};

/// A value accepted by [`crate::Shader::set_uniform`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Bool(bool),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column-major.
    Mat4([[f32; 4]; 4]),
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        UniformValue::Bool(value)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(value: [f32; 2]) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(value: [f32; 3]) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<[[f32; 4]; 4]> for UniformValue {
    fn from(value: [[f32; 4]; 4]) -> Self {
        UniformValue::Mat4(value)
    }
}

impl UniformValue {
    pub fn uniform_type(&self) -> UniformType {
        match self {
            UniformValue::Int(_) => UniformType::Int,
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Bool(_) => UniformType::Bool,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::Mat4(_) => UniformType::Mat4,
        }
    }
}

/// GLSL types the uniform block shim understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Int,
    Float,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformType {
    pub fn from_glsl(name: &str) -> Option<Self> {
        match name {
            "int" => Some(UniformType::Int),
            "float" => Some(UniformType::Float),
            "bool" => Some(UniformType::Bool),
            "vec2" => Some(UniformType::Vec2),
            "vec3" => Some(UniformType::Vec3),
            "vec4" => Some(UniformType::Vec4),
            "mat4" => Some(UniformType::Mat4),
            _ => None,
        }
    }

    /// Type used inside the generated block. Booleans travel as `int`.
    pub fn block_glsl(self) -> &'static str {
        match self {
            UniformType::Int | UniformType::Bool => "int",
            UniformType::Float => "float",
            UniformType::Vec2 => "vec2",
            UniformType::Vec3 => "vec3",
            UniformType::Vec4 => "vec4",
            UniformType::Mat4 => "mat4",
        }
    }

    pub fn std140_size(self) -> u32 {
        match self {
            UniformType::Int | UniformType::Float | UniformType::Bool => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 => 12,
            UniformType::Vec4 => 16,
            UniformType::Mat4 => 64,
        }
    }

    pub fn std140_align(self) -> u32 {
        match self {
            UniformType::Int | UniformType::Float | UniformType::Bool => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 | UniformType::Vec4 | UniformType::Mat4 => 16,
        }
    }

    fn accepts(self, value: UniformType) -> bool {
        match self {
            UniformType::Int | UniformType::Bool => {
                matches!(value, UniformType::Int | UniformType::Bool)
            }
            other => other == value,
        }
    }
}

/// A loose `uniform` declaration found in shader source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDeclaration {
    pub name: String,
    pub ty: UniformType,
    pub array_len: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    pub ty: UniformType,
    pub array_len: Option<u32>,
    pub offset: u32,
}

impl UniformMember {
    /// Distance between consecutive array elements (std140 rounds to 16).
    pub fn stride(&self) -> u32 {
        match self.array_len {
            Some(_) => round_up(self.ty.std140_size(), 16),
            None => self.ty.std140_size(),
        }
    }

    fn footprint(&self) -> u32 {
        self.stride() * self.array_len.unwrap_or(1)
    }
}

/// Byte position of one addressable uniform (a scalar member or array element).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation {
    pub offset: u32,
    pub ty: UniformType,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UniformBlockLayout {
    members: Vec<UniformMember>,
    size: u32,
}

impl UniformBlockLayout {
    /// Places members in declaration order following std140 rules.
    pub fn new(declarations: &[UniformDeclaration]) -> Self {
        let mut cursor = 0;
        let mut members = Vec::with_capacity(declarations.len());
        for declaration in declarations {
            let align = match declaration.array_len {
                Some(_) => 16,
                None => declaration.ty.std140_align(),
            };
            let member = UniformMember {
                name: declaration.name.clone(),
                ty: declaration.ty,
                array_len: declaration.array_len,
                offset: round_up(cursor, align),
            };
            cursor = member.offset + member.footprint();
            members.push(member);
        }
        Self {
            members,
            size: round_up(cursor.max(16), 16),
        }
    }

    pub fn members(&self) -> &[UniformMember] {
        &self.members
    }

    /// Block size in bytes, never smaller than 16.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn member(&self, name: &str) -> Option<&UniformMember> {
        self.members.iter().find(|member| member.name == name)
    }

    /// Resolves `name` or `name[index]`. A bare array name addresses element 0.
    pub fn locate(&self, name: &str) -> Option<UniformLocation> {
        let (base, index) = split_array_name(name)?;
        let member = self.member(base)?;
        let index = match (member.array_len, index) {
            (Some(len), Some(index)) if index < len => index,
            (Some(_), None) => 0,
            (None, None) => 0,
            _ => return None,
        };
        Some(UniformLocation {
            offset: member.offset + index * member.stride(),
            ty: member.ty,
        })
    }
}

fn split_array_name(name: &str) -> Option<(&str, Option<u32>)> {
    match name.split_once('[') {
        None => Some((name, None)),
        Some((base, rest)) => {
            let index = rest.strip_suffix(']')?.trim().parse().ok()?;
            Some((base, Some(index)))
        }
    }
}

pub(crate) fn round_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

/// Outcome of writing one uniform into a [`UniformBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformWrite {
    Written,
    /// Not declared by the program; GL silently ignores these too.
    Unknown,
    TypeMismatch { expected: UniformType },
}

/// CPU copy of a program's uniform block.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    layout: UniformBlockLayout,
    bytes: Vec<u8>,
    dirty: bool,
}

impl UniformBlock {
    pub fn new(layout: UniformBlockLayout) -> Self {
        let bytes = vec![0; layout.size() as usize];
        Self {
            layout,
            bytes,
            dirty: true,
        }
    }

    pub fn layout(&self) -> &UniformBlockLayout {
        &self.layout
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns whether the block changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub fn write(&mut self, name: &str, value: UniformValue) -> UniformWrite {
        let Some(location) = self.layout.locate(name) else {
            return UniformWrite::Unknown;
        };
        if !location.ty.accepts(value.uniform_type()) {
            return UniformWrite::TypeMismatch {
                expected: location.ty,
            };
        }

        let offset = location.offset as usize;
        match value {
            UniformValue::Int(v) => self.put(offset, bytemuck::bytes_of(&v)),
            UniformValue::Bool(v) => self.put(offset, bytemuck::bytes_of(&i32::from(v))),
            UniformValue::Float(v) => self.put(offset, bytemuck::bytes_of(&v)),
            UniformValue::Vec2(v) => self.put(offset, bytemuck::cast_slice(&v)),
            UniformValue::Vec3(v) => self.put(offset, bytemuck::cast_slice(&v)),
            UniformValue::Vec4(v) => self.put(offset, bytemuck::cast_slice(&v)),
            UniformValue::Mat4(v) => self.put(offset, bytemuck::cast_slice(&v)),
        }
        UniformWrite::Written
    }

    /// [`UniformBlock::write`] with GL-like reporting: unknown names are
    /// traced, type mismatches warned about.
    pub fn store(&mut self, name: &str, value: UniformValue) {
        match self.write(name, value) {
            UniformWrite::Written => {}
            UniformWrite::Unknown => trace!(name, "uniform not declared by program"),
            UniformWrite::TypeMismatch { expected } => warn!(
                name,
                ?expected,
                actual = ?value.uniform_type(),
                "ignoring uniform upload with mismatched type"
            ),
        }
    }

    /// Decodes the current value of `name` as its declared type.
    pub fn read(&self, name: &str) -> Option<UniformValue> {
        let location = self.layout.locate(name)?;
        let offset = location.offset as usize;
        let f = |index: usize| -> f32 {
            let start = offset + index * 4;
            pod_read_unaligned(&self.bytes[start..start + 4])
        };
        let int = || -> i32 { pod_read_unaligned(&self.bytes[offset..offset + 4]) };
        Some(match location.ty {
            UniformType::Int => UniformValue::Int(int()),
            UniformType::Bool => UniformValue::Bool(int() != 0),
            UniformType::Float => UniformValue::Float(f(0)),
            UniformType::Vec2 => UniformValue::Vec2([f(0), f(1)]),
            UniformType::Vec3 => UniformValue::Vec3([f(0), f(1), f(2)]),
            UniformType::Vec4 => UniformValue::Vec4([f(0), f(1), f(2), f(3)]),
            UniformType::Mat4 => {
                UniformValue::Mat4(std::array::from_fn(|c| std::array::from_fn(|r| f(c * 4 + r))))
            }
        })
    }

    fn put(&mut self, offset: usize, data: &[u8]) {
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declare(name: &str, ty: UniformType, array_len: Option<u32>) -> UniformDeclaration {
        UniformDeclaration {
            name: name.to_string(),
            ty,
            array_len,
        }
    }

    #[test]
    fn std140_offsets_follow_alignment_rules() {
        let layout = UniformBlockLayout::new(&[
            declare("u_Resolution", UniformType::Vec2, None),
            declare("u_Zoom", UniformType::Float, None),
            declare("u_InteriorColor", UniformType::Vec3, None),
            declare("u_ColorFrequency", UniformType::Float, None),
            declare("u_Colors", UniformType::Vec3, Some(16)),
            declare("u_ColorPositions", UniformType::Float, Some(16)),
            declare("u_JuliaMode", UniformType::Bool, None),
            declare("u_View", UniformType::Mat4, None),
        ]);

        let offset = |name: &str| layout.member(name).unwrap().offset;
        assert_eq!(offset("u_Resolution"), 0);
        assert_eq!(offset("u_Zoom"), 8);
        assert_eq!(offset("u_InteriorColor"), 16);
        assert_eq!(offset("u_ColorFrequency"), 28);
        assert_eq!(offset("u_Colors"), 32);
        assert_eq!(offset("u_ColorPositions"), 32 + 16 * 16);
        assert_eq!(offset("u_JuliaMode"), 32 + 16 * 16 * 2);
        assert_eq!(offset("u_View"), 32 + 16 * 16 * 2 + 16);
        assert_eq!(layout.size(), 32 + 16 * 16 * 2 + 16 + 64);
    }

    #[test]
    fn locate_addresses_array_elements() {
        let layout = UniformBlockLayout::new(&[
            declare("u_Count", UniformType::Int, None),
            declare("u_Positions", UniformType::Float, Some(4)),
        ]);
        assert_eq!(layout.locate("u_Positions[2]").unwrap().offset, 16 + 32);
        assert_eq!(layout.locate("u_Positions").unwrap().offset, 16);
        assert!(layout.locate("u_Positions[4]").is_none());
        assert!(layout.locate("u_Count[0]").is_none());
        assert!(layout.locate("u_Missing").is_none());
    }

    #[test]
    fn block_round_trips_values_and_tracks_dirty() {
        let layout = UniformBlockLayout::new(&[
            declare("u_Flag", UniformType::Bool, None),
            declare("u_Colors", UniformType::Vec3, Some(2)),
            declare("u_Transform", UniformType::Mat4, None),
        ]);
        let mut block = UniformBlock::new(layout);
        assert!(block.take_dirty());
        assert!(!block.take_dirty());

        let matrix = [
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 6.0, 7.0, 8.0],
            [9.0, 10.0, 11.0, 12.0],
            [13.0, 14.0, 15.0, 16.0],
        ];
        assert_eq!(block.write("u_Flag", true.into()), UniformWrite::Written);
        assert_eq!(
            block.write("u_Colors[1]", [0.5, 0.25, 1.0].into()),
            UniformWrite::Written
        );
        assert_eq!(block.write("u_Transform", matrix.into()), UniformWrite::Written);
        assert!(block.take_dirty());

        assert_eq!(block.read("u_Flag"), Some(UniformValue::Bool(true)));
        assert_eq!(
            block.read("u_Colors[1]"),
            Some(UniformValue::Vec3([0.5, 0.25, 1.0]))
        );
        assert_eq!(block.read("u_Colors[0]"), Some(UniformValue::Vec3([0.0; 3])));
        assert_eq!(block.read("u_Transform"), Some(UniformValue::Mat4(matrix)));
    }

    #[test]
    fn mismatched_and_unknown_writes_are_reported() {
        let layout = UniformBlockLayout::new(&[declare("u_Zoom", UniformType::Float, None)]);
        let mut block = UniformBlock::new(layout);
        block.take_dirty();
        assert_eq!(
            block.write("u_Zoom", 3i32.into()),
            UniformWrite::TypeMismatch {
                expected: UniformType::Float
            }
        );
        assert_eq!(block.write("u_Other", 1.0f32.into()), UniformWrite::Unknown);
        assert!(!block.take_dirty());
    }
}
