//! The device seam.
//!
//! [`RendererApi`] is the narrow interface every backend implements. Handles are
//! opaque non-zero ids handed out by the backend; resource wrappers in
//! [`crate::resources`] own them and push a [`PendingRelease`] onto the shared
//! [`ReleaseQueue`] when dropped. The queue is drained by
//! [`crate::RenderCommand::process_deletion_queue`] at the start of a frame.

use std::cell::RefCell;
use std::num::NonZeroU32;
use std::rc::Rc;

use anyhow::Result;

use crate::types::{BufferLayout, DepthFunction, PolygonOffset, TextureSpecification};
use crate::uniforms::UniformValue;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            pub(crate) const KIND: &'static str = $kind;

            pub(crate) fn new(raw: NonZeroU32) -> Self {
                Self(raw)
            }

            /// The non-zero device id.
            pub fn raw(self) -> u32 {
                self.0.get()
            }
        }
    };
}

define_handle!(BufferHandle, "buffer");
define_handle!(TextureHandle, "texture");
define_handle!(VertexArrayHandle, "vertex array");
define_handle!(FramebufferHandle, "framebuffer");
define_handle!(
    /// A compiled and linked shader program.
    ProgramHandle,
    "program"
);

/// Monotonic id source shared by all handle kinds of one backend.
#[derive(Debug, Default)]
pub(crate) struct HandleCounter {
    last: u32,
}

impl HandleCounter {
    pub(crate) fn next(&mut self) -> NonZeroU32 {
        self.last = self.last.wrapping_add(1);
        NonZeroU32::new(self.last).unwrap_or(NonZeroU32::MIN)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
}

/// Attachments a framebuffer object is assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferAttachments {
    pub width: u32,
    pub height: u32,
    pub color: Option<TextureHandle>,
    pub depth: Option<TextureHandle>,
}

/// Shader sources for one program, after file loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramSource {
    Graphics { vertex: String, fragment: String },
    Compute { compute: String },
}

/// Vertical order of rows returned by [`RendererApi::read_pixels`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrder {
    /// First row is the top of the image.
    TopDown,
    /// First row is the bottom of the image (GL convention).
    BottomUp,
}

/// Tightly packed RGBA8 pixels read back from a framebuffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readback {
    pub width: u32,
    pub height: u32,
    pub rows: RowOrder,
    pub pixels: Vec<u8>,
}

/// A device object whose owner has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingRelease {
    Buffer(BufferHandle),
    Texture(TextureHandle),
    VertexArray(VertexArrayHandle),
    Framebuffer(FramebufferHandle),
    Program(ProgramHandle),
}

/// Same-thread queue of device releases, drained once per frame.
#[derive(Debug, Clone, Default)]
pub struct ReleaseQueue {
    pending: Rc<RefCell<Vec<PendingRelease>>>,
}

impl ReleaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, release: PendingRelease) {
        self.pending.borrow_mut().push(release);
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    pub(crate) fn drain(&self) -> Vec<PendingRelease> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }
}

/// Capabilities a graphics backend provides to the renderer.
///
/// The model is GL-like: state (bound framebuffer, bound program, viewport,
/// depth settings) is set first and the draw calls pick it up. Draw and state
/// calls never fail outward; backends log problems and skip the work so a broken
/// resource cannot take the frame loop down.
pub trait RendererApi {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Row order of [`RendererApi::read_pixels`] results and texture uploads.
    fn row_order(&self) -> RowOrder;

    fn init(&mut self) -> Result<()>;

    fn create_buffer(&mut self, usage: BufferUsage, contents: &[u8]) -> Result<BufferHandle>;
    fn delete_buffer(&mut self, buffer: BufferHandle);

    fn create_texture(&mut self, spec: &TextureSpecification) -> Result<TextureHandle>;
    /// Replaces the full contents of a texture with tightly packed pixels.
    fn write_texture(&mut self, texture: TextureHandle, pixels: &[u8]) -> Result<()>;
    fn delete_texture(&mut self, texture: TextureHandle);

    fn create_vertex_array(&mut self) -> Result<VertexArrayHandle>;
    fn attach_vertex_buffer(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
        layout: &BufferLayout,
    ) -> Result<()>;
    fn attach_index_buffer(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
        count: u32,
    ) -> Result<()>;
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    /// Fails with [`crate::ResourceError::IncompleteFramebuffer`] when the
    /// attachments are missing, of the wrong kind, or sized differently.
    fn create_framebuffer(
        &mut self,
        attachments: &FramebufferAttachments,
    ) -> Result<FramebufferHandle>;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle);
    /// `None` selects the default target.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);

    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle>;
    fn delete_program(&mut self, program: ProgramHandle);
    fn bind_program(&mut self, program: Option<ProgramHandle>);
    /// Stores a uniform value for the next draw with `program`.
    fn upload_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue);

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32);
    fn set_clear_color(&mut self, color: [f32; 4]);
    /// Clears color and depth of the bound target.
    fn clear(&mut self);
    fn clear_depth(&mut self);
    fn set_depth_test(&mut self, enabled: bool);
    fn set_depth_mask(&mut self, enabled: bool);
    fn set_cull_face(&mut self, enabled: bool);
    fn set_depth_function(&mut self, function: DepthFunction);
    fn set_polygon_offset(&mut self, offset: Option<PolygonOffset>);

    fn draw_arrays(&mut self, vertex_array: VertexArrayHandle, vertex_count: u32);
    fn draw_indexed(&mut self, vertex_array: VertexArrayHandle, index_count: u32);
    fn dispatch_compute(&mut self, groups_x: u32, groups_y: u32, groups_z: u32);

    /// Copies the framebuffer's color attachment onto the presentation surface.
    fn blit_to_swapchain(
        &mut self,
        framebuffer: FramebufferHandle,
        width: u32,
        height: u32,
    ) -> Result<()>;

    /// Blocks until the color attachment is available as RGBA8.
    fn read_pixels(
        &mut self,
        framebuffer: FramebufferHandle,
        width: u32,
        height: u32,
    ) -> Result<Readback>;
}
