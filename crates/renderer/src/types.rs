use std::path::PathBuf;

/// Pixel layout of a texture or framebuffer attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// Placeholder for "no attachment".
    None,
    R8,
    Rgb8,
    #[default]
    Rgba8,
    /// Half-float color, used for the offscreen fractal target.
    Rgba16F,
    Depth24Stencil8,
}

impl TextureFormat {
    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth24Stencil8)
    }

    pub fn is_color(self) -> bool {
        !matches!(self, TextureFormat::None | TextureFormat::Depth24Stencil8)
    }

    /// Bytes per texel of tightly packed upload data.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::None => 0,
            TextureFormat::R8 => 1,
            TextureFormat::Rgb8 => 3,
            TextureFormat::Rgba8 | TextureFormat::Depth24Stencil8 => 4,
            TextureFormat::Rgba16F => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFilter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureWrap {
    #[default]
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

/// Everything needed to allocate a 2D texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureSpecification {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
    /// Only the base level is allocated; callers asking for mips get a debug log.
    pub generate_mips: bool,
}

impl Default for TextureSpecification {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8,
            min_filter: TextureFilter::Linear,
            mag_filter: TextureFilter::Linear,
            wrap_s: TextureWrap::Repeat,
            wrap_t: TextureWrap::Repeat,
            generate_mips: false,
        }
    }
}

impl TextureSpecification {
    /// Linear, clamp-to-edge render target of the given format.
    pub fn render_target(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            wrap_s: TextureWrap::ClampToEdge,
            wrap_t: TextureWrap::ClampToEdge,
            ..Self::default()
        }
    }

    /// Same sampling state at a new size.
    pub fn resized(&self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..*self
        }
    }

    pub(crate) fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel() as usize
    }
}

/// Color attachment plus an optional depth/stencil attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferSpecification {
    pub width: u32,
    pub height: u32,
    pub color: TextureSpecification,
    pub depth: Option<TextureSpecification>,
}

impl FramebufferSpecification {
    /// RGBA16F color with a Depth24Stencil8 attachment.
    pub fn hdr_with_depth(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            color: TextureSpecification::render_target(width, height, TextureFormat::Rgba16F),
            depth: Some(TextureSpecification::render_target(
                width,
                height,
                TextureFormat::Depth24Stencil8,
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthFunction {
    #[default]
    Less,
    LessEqual,
}

/// Depth bias applied while polygon offset is enabled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonOffset {
    pub factor: f32,
    pub units: f32,
}

/// Vertex attribute data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderDataType {
    Float,
    Float2,
    Float3,
    Float4,
    Mat3,
    Mat4,
    Int,
    Int2,
    Int3,
    Int4,
    Bool,
}

impl ShaderDataType {
    pub fn size(self) -> u32 {
        match self {
            ShaderDataType::Float | ShaderDataType::Int => 4,
            ShaderDataType::Float2 | ShaderDataType::Int2 => 8,
            ShaderDataType::Float3 | ShaderDataType::Int3 => 12,
            ShaderDataType::Float4 | ShaderDataType::Int4 => 16,
            ShaderDataType::Mat3 => 36,
            ShaderDataType::Mat4 => 64,
            ShaderDataType::Bool => 1,
        }
    }

    pub fn component_count(self) -> u32 {
        match self {
            ShaderDataType::Float | ShaderDataType::Int | ShaderDataType::Bool => 1,
            ShaderDataType::Float2 | ShaderDataType::Int2 => 2,
            ShaderDataType::Float3 | ShaderDataType::Int3 => 3,
            ShaderDataType::Float4 | ShaderDataType::Int4 => 4,
            ShaderDataType::Mat3 => 9,
            ShaderDataType::Mat4 => 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferElement {
    pub name: String,
    pub data_type: ShaderDataType,
    pub offset: u32,
    pub normalized: bool,
}

/// Interleaved vertex layout; offsets and stride are derived from the element order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BufferLayout {
    elements: Vec<BufferElement>,
    stride: u32,
}

impl BufferLayout {
    pub fn new<'a>(elements: impl IntoIterator<Item = (ShaderDataType, &'a str)>) -> Self {
        let mut offset = 0;
        let elements = elements
            .into_iter()
            .map(|(data_type, name)| {
                let element = BufferElement {
                    name: name.to_string(),
                    data_type,
                    offset,
                    normalized: false,
                };
                offset += data_type.size();
                element
            })
            .collect();
        Self {
            elements,
            stride: offset,
        }
    }

    pub fn elements(&self) -> &[BufferElement] {
        &self.elements
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Power profile requested when picking a GPU adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    /// Prefer integrated or otherwise power-efficient adapters.
    Low,
    /// Prefer discrete, high-performance adapters.
    #[default]
    High,
}

/// Device-level options for the wgpu backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendConfig {
    pub power: GpuPowerPreference,
    /// Present with FIFO when true, otherwise prefer immediate/mailbox.
    pub vsync: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            power: GpuPowerPreference::High,
            vsync: true,
        }
    }
}

/// Start-up configuration for [`crate::Renderer`].
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Initial offscreen framebuffer size in pixels.
    pub framebuffer_size: (u32, u32),
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    /// RGBA clear color applied at the start of every frame.
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            framebuffer_size: (1280, 720),
            vertex_shader: PathBuf::from("assets/shaders/mandelbrot.vert"),
            fragment_shader: PathBuf::from("assets/shaders/mandelbrot.frag"),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl RendererConfig {
    /// Points both shader paths at `mandelbrot.vert`/`mandelbrot.frag` in `dir`.
    pub fn with_shader_dir(mut self, dir: &std::path::Path) -> Self {
        self.vertex_shader = dir.join("mandelbrot.vert");
        self.fragment_shader = dir.join("mandelbrot.frag");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_computes_offsets_and_stride() {
        let layout = BufferLayout::new([
            (ShaderDataType::Float3, "a_Position"),
            (ShaderDataType::Float2, "a_TexCoord"),
        ]);
        assert_eq!(layout.stride(), 20);
        assert_eq!(layout.elements()[0].offset, 0);
        assert_eq!(layout.elements()[1].offset, 12);
        assert_eq!(layout.elements()[1].name, "a_TexCoord");
    }

    #[test]
    fn texture_byte_len_tracks_format() {
        let spec = TextureSpecification::render_target(4, 2, TextureFormat::Rgba16F);
        assert_eq!(spec.byte_len(), 64);
        assert_eq!(spec.resized(1, 1).byte_len(), 8);
        assert!(TextureFormat::Depth24Stencil8.is_depth());
        assert!(!TextureFormat::None.is_color());
    }
}
