//! Owning wrappers around device objects.
//!
//! Each wrapper creates its handle through a [`crate::RenderCommand`] and
//! queues the handle for release when dropped.

mod buffer;
mod framebuffer;
mod shader;
mod texture;
mod vertex_array;

pub use buffer::{IndexBuffer, VertexBuffer};
pub use framebuffer::Framebuffer;
pub use shader::{Shader, ShaderSources, UniformBinder};
pub use texture::Texture2D;
pub use vertex_array::VertexArray;
