//! Rendering core for fractalscope.
//!
//! The crate sits between the fractal data model and a graphics device:
//!
//! ```text
//!   FractalParameters
//!          │ Renderer::submit (uniform contract)
//!          ▼
//!   Renderer ──▶ RenderCommand<B> ──▶ B: RendererApi ──▶ wgpu | headless
//!          │            ▲
//!          │            └── ReleaseQueue ◀── resource wrappers (Drop)
//!          ▼
//!   Framebuffer (RGBA16F + depth) ──▶ present / export_frame (PNG)
//! ```
//!
//! [`RendererApi`] is the only seam between the renderer and a device.
//! [`WgpuBackend`] drives real hardware, with or without a window surface;
//! [`HeadlessBackend`] is a software state machine that records what the
//! renderer asked for, used by tests and tooling that has no GPU.
//!
//! Shaders are written as GL-style GLSL with loose uniforms. Program creation
//! moves those uniforms into a std140 block (see [`UniformBlockLayout`]) so
//! the same sources compile through wgpu's GLSL frontend.

mod api;
mod command;
mod compile;
mod error;
mod export;
mod gpu;
mod headless;
mod imaging;
mod renderer;
mod resources;
mod types;
mod uniforms;

pub use api::{
    BufferHandle, BufferUsage, FramebufferAttachments, FramebufferHandle, PendingRelease,
    ProgramHandle, ProgramSource, Readback, ReleaseQueue, RendererApi, RowOrder, TextureHandle,
    VertexArrayHandle,
};
pub use command::RenderCommand;
pub use error::ResourceError;
pub use export::{timestamped_file_name, top_down_pixels, write_png};
pub use gpu::WgpuBackend;
pub use headless::{DrawCall, DrawKind, HeadlessBackend};
pub use imaging::Image;
pub use renderer::Renderer;
pub use resources::{
    Framebuffer, IndexBuffer, Shader, ShaderSources, Texture2D, UniformBinder, VertexArray,
    VertexBuffer,
};
pub use types::{
    BackendConfig, BufferElement, BufferLayout, DepthFunction, FramebufferSpecification,
    GpuPowerPreference, PolygonOffset, RendererConfig, ShaderDataType, TextureFilter,
    TextureFormat, TextureSpecification, TextureWrap,
};
pub use uniforms::{
    UniformBlock, UniformBlockLayout, UniformDeclaration, UniformLocation, UniformMember,
    UniformType, UniformValue, UniformWrite,
};
