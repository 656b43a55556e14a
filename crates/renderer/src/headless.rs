//! Software implementation of [`RendererApi`].
//!
//! Nothing is rasterised. The backend keeps enough state to check how the
//! renderer drives a device: live objects, texture memory, per-program uniform
//! blocks, bound state and a log of draws. Framebuffer clears fill an RGBA8
//! plane that [`RendererApi::read_pixels`] returns bottom row first, like
//! `glReadPixels`.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use tracing::{debug, trace, warn};

use crate::api::{
    BufferHandle, BufferUsage, FramebufferAttachments, FramebufferHandle, HandleCounter,
    ProgramHandle, ProgramSource, Readback, RendererApi, RowOrder, TextureHandle,
    VertexArrayHandle,
};
use crate::compile::{validate_stage, wrap_program};
use crate::error::ResourceError;
use crate::types::{BufferLayout, DepthFunction, PolygonOffset, TextureSpecification};
use crate::uniforms::{UniformBlock, UniformValue};

/// What kind of work a [`DrawCall`] recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    Arrays,
    Indexed,
    Compute { groups: [u32; 3] },
}

/// One recorded draw or dispatch with the state it ran under.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub kind: DrawKind,
    pub framebuffer: Option<FramebufferHandle>,
    pub program: ProgramHandle,
    pub vertex_array: Option<VertexArrayHandle>,
    pub count: u32,
    pub viewport: [u32; 4],
    pub depth_test: bool,
}

#[derive(Debug)]
struct HeadlessBuffer {
    usage: BufferUsage,
    len: usize,
}

#[derive(Debug)]
struct HeadlessTexture {
    spec: TextureSpecification,
    pixels: Vec<u8>,
}

#[derive(Debug, Default)]
struct HeadlessVertexArray {
    vertex_buffers: Vec<(BufferHandle, BufferLayout)>,
    index_buffer: Option<(BufferHandle, u32)>,
}

#[derive(Debug)]
struct HeadlessFramebuffer {
    attachments: FramebufferAttachments,
    /// Resolved color as RGBA8, bottom row first.
    color: Vec<u8>,
}

#[derive(Debug)]
struct HeadlessProgram {
    compute: bool,
    uniforms: UniformBlock,
}

#[derive(Debug)]
pub struct HeadlessBackend {
    ids: HandleCounter,
    initialised: bool,
    buffers: HashMap<BufferHandle, HeadlessBuffer>,
    textures: HashMap<TextureHandle, HeadlessTexture>,
    vertex_arrays: HashMap<VertexArrayHandle, HeadlessVertexArray>,
    framebuffers: HashMap<FramebufferHandle, HeadlessFramebuffer>,
    programs: HashMap<ProgramHandle, HeadlessProgram>,
    bound_framebuffer: Option<FramebufferHandle>,
    bound_program: Option<ProgramHandle>,
    viewport: [u32; 4],
    clear_color: [f32; 4],
    depth_test: bool,
    depth_mask: bool,
    cull_face: bool,
    depth_function: DepthFunction,
    polygon_offset: Option<PolygonOffset>,
    draws: Vec<DrawCall>,
    presented: usize,
    fail_framebuffers: bool,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            ids: HandleCounter::default(),
            initialised: false,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            vertex_arrays: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            bound_framebuffer: None,
            bound_program: None,
            viewport: [0; 4],
            clear_color: [0.0, 0.0, 0.0, 1.0],
            depth_test: false,
            depth_mask: true,
            cull_face: false,
            depth_function: DepthFunction::Less,
            polygon_offset: None,
            draws: Vec::new(),
            presented: 0,
            fail_framebuffers: false,
        }
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn clear_draws(&mut self) {
        self.draws.clear();
    }

    /// Number of successful [`RendererApi::blit_to_swapchain`] calls.
    pub fn presented(&self) -> usize {
        self.presented
    }

    /// Current value of a uniform in a program's block.
    pub fn uniform(&self, program: ProgramHandle, name: &str) -> Option<UniformValue> {
        self.programs.get(&program)?.uniforms.read(name)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn has_texture(&self, texture: TextureHandle) -> bool {
        self.textures.contains_key(&texture)
    }

    pub fn has_framebuffer(&self, framebuffer: FramebufferHandle) -> bool {
        self.framebuffers.contains_key(&framebuffer)
    }

    pub fn has_program(&self, program: ProgramHandle) -> bool {
        self.programs.contains_key(&program)
    }

    pub fn texture_spec(&self, texture: TextureHandle) -> Option<&TextureSpecification> {
        self.textures.get(&texture).map(|texture| &texture.spec)
    }

    pub fn texture_pixels(&self, texture: TextureHandle) -> Option<&[u8]> {
        self.textures.get(&texture).map(|texture| texture.pixels.as_slice())
    }

    /// Resolved RGBA8 color plane of a framebuffer, bottom row first.
    pub fn framebuffer_pixels_mut(&mut self, framebuffer: FramebufferHandle) -> Option<&mut [u8]> {
        self.framebuffers
            .get_mut(&framebuffer)
            .map(|framebuffer| framebuffer.color.as_mut_slice())
    }

    pub fn bound_framebuffer(&self) -> Option<FramebufferHandle> {
        self.bound_framebuffer
    }

    pub fn viewport(&self) -> [u32; 4] {
        self.viewport
    }

    pub fn depth_test(&self) -> bool {
        self.depth_test
    }

    pub fn depth_mask(&self) -> bool {
        self.depth_mask
    }

    pub fn cull_face(&self) -> bool {
        self.cull_face
    }

    pub fn depth_function(&self) -> DepthFunction {
        self.depth_function
    }

    pub fn polygon_offset(&self) -> Option<PolygonOffset> {
        self.polygon_offset
    }

    /// Makes every following framebuffer creation fail, as a driver reporting
    /// an incomplete attachment set would.
    pub fn fail_framebuffer_creation(&mut self, fail: bool) {
        self.fail_framebuffers = fail;
    }

    fn invalid<T>(kind: &'static str, raw: u32) -> Result<T> {
        Err(ResourceError::InvalidHandle { kind, raw }.into())
    }

    fn record(&mut self, kind: DrawKind, vertex_array: Option<VertexArrayHandle>, count: u32) {
        let Some(program) = self.bound_program else {
            warn!(?kind, "draw without a bound program skipped");
            return;
        };
        trace!(?kind, count, program = program.raw(), "recording draw");
        self.draws.push(DrawCall {
            kind,
            framebuffer: self.bound_framebuffer,
            program,
            vertex_array,
            count,
            viewport: self.viewport,
            depth_test: self.depth_test,
        });
    }

    fn check_attachment(
        &self,
        texture: TextureHandle,
        attachments: &FramebufferAttachments,
        want_depth: bool,
    ) -> Result<(), ResourceError> {
        let Some(texture) = self.textures.get(&texture) else {
            return Err(ResourceError::IncompleteFramebuffer(format!(
                "attachment #{} does not exist",
                texture.raw()
            )));
        };
        if texture.spec.format.is_depth() != want_depth || !(want_depth || texture.spec.format.is_color()) {
            return Err(ResourceError::IncompleteFramebuffer(format!(
                "attachment format {:?} cannot be used here",
                texture.spec.format
            )));
        }
        if texture.spec.width != attachments.width || texture.spec.height != attachments.height {
            return Err(ResourceError::IncompleteFramebuffer(format!(
                "attachment is {}x{}, framebuffer is {}x{}",
                texture.spec.width, texture.spec.height, attachments.width, attachments.height
            )));
        }
        Ok(())
    }
}

fn to_rgba8(color: [f32; 4]) -> [u8; 4] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

impl RendererApi for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn row_order(&self) -> RowOrder {
        RowOrder::BottomUp
    }

    fn init(&mut self) -> Result<()> {
        self.initialised = true;
        debug!("headless backend ready");
        Ok(())
    }

    fn create_buffer(&mut self, usage: BufferUsage, contents: &[u8]) -> Result<BufferHandle> {
        let handle = BufferHandle::new(self.ids.next());
        self.buffers.insert(
            handle,
            HeadlessBuffer {
                usage,
                len: contents.len(),
            },
        );
        Ok(handle)
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer).is_none() {
            warn!(buffer = buffer.raw(), "deleting unknown buffer");
        }
    }

    fn create_texture(&mut self, spec: &TextureSpecification) -> Result<TextureHandle> {
        if spec.width == 0 || spec.height == 0 {
            return Err(anyhow!("texture of size {}x{} requested", spec.width, spec.height));
        }
        let handle = TextureHandle::new(self.ids.next());
        self.textures.insert(
            handle,
            HeadlessTexture {
                spec: *spec,
                pixels: vec![0; spec.byte_len()],
            },
        );
        Ok(handle)
    }

    fn write_texture(&mut self, texture: TextureHandle, pixels: &[u8]) -> Result<()> {
        let Some(stored) = self.textures.get_mut(&texture) else {
            return Self::invalid(TextureHandle::KIND, texture.raw());
        };
        if stored.pixels.len() != pixels.len() {
            return Err(ResourceError::SizeMismatch {
                expected: stored.pixels.len(),
                actual: pixels.len(),
            }
            .into());
        }
        stored.pixels.copy_from_slice(pixels);
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_none() {
            warn!(texture = texture.raw(), "deleting unknown texture");
        }
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayHandle> {
        let handle = VertexArrayHandle::new(self.ids.next());
        self.vertex_arrays.insert(handle, HeadlessVertexArray::default());
        Ok(handle)
    }

    fn attach_vertex_buffer(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
        layout: &BufferLayout,
    ) -> Result<()> {
        match self.buffers.get(&buffer) {
            Some(stored) if stored.usage == BufferUsage::Vertex => {}
            Some(_) => return Err(anyhow!("buffer #{} is not a vertex buffer", buffer.raw())),
            None => return Self::invalid(BufferHandle::KIND, buffer.raw()),
        }
        let Some(array) = self.vertex_arrays.get_mut(&vertex_array) else {
            return Self::invalid(VertexArrayHandle::KIND, vertex_array.raw());
        };
        array.vertex_buffers.push((buffer, layout.clone()));
        Ok(())
    }

    fn attach_index_buffer(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
        count: u32,
    ) -> Result<()> {
        match self.buffers.get(&buffer) {
            Some(stored) if stored.usage == BufferUsage::Index && stored.len >= count as usize * 4 => {}
            Some(_) => return Err(anyhow!("buffer #{} cannot hold {count} indices", buffer.raw())),
            None => return Self::invalid(BufferHandle::KIND, buffer.raw()),
        }
        let Some(array) = self.vertex_arrays.get_mut(&vertex_array) else {
            return Self::invalid(VertexArrayHandle::KIND, vertex_array.raw());
        };
        array.index_buffer = Some((buffer, count));
        Ok(())
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        if self.vertex_arrays.remove(&vertex_array).is_none() {
            warn!(vertex_array = vertex_array.raw(), "deleting unknown vertex array");
        }
    }

    fn create_framebuffer(
        &mut self,
        attachments: &FramebufferAttachments,
    ) -> Result<FramebufferHandle> {
        if self.fail_framebuffers {
            return Err(ResourceError::IncompleteFramebuffer(
                "creation disabled on this device".to_string(),
            )
            .into());
        }
        let Some(color) = attachments.color else {
            return Err(ResourceError::IncompleteFramebuffer("no color attachment".to_string()).into());
        };
        self.check_attachment(color, attachments, false)?;
        if let Some(depth) = attachments.depth {
            self.check_attachment(depth, attachments, true)?;
        }

        let handle = FramebufferHandle::new(self.ids.next());
        let len = attachments.width as usize * attachments.height as usize * 4;
        self.framebuffers.insert(
            handle,
            HeadlessFramebuffer {
                attachments: *attachments,
                color: vec![0; len],
            },
        );
        Ok(handle)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if self.framebuffers.remove(&framebuffer).is_none() {
            warn!(framebuffer = framebuffer.raw(), "deleting unknown framebuffer");
        }
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.bound_framebuffer = framebuffer;
    }

    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle> {
        let wrapped = wrap_program(source)?;
        for stage in &wrapped.stages {
            validate_stage(stage)?;
        }
        let handle = ProgramHandle::new(self.ids.next());
        self.programs.insert(
            handle,
            HeadlessProgram {
                compute: matches!(source, ProgramSource::Compute { .. }),
                uniforms: UniformBlock::new(wrapped.layout),
            },
        );
        Ok(handle)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_none() {
            warn!(program = program.raw(), "deleting unknown program");
        }
        if self.bound_program == Some(program) {
            self.bound_program = None;
        }
    }

    fn bind_program(&mut self, program: Option<ProgramHandle>) {
        self.bound_program = program;
    }

    fn upload_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue) {
        match self.programs.get_mut(&program) {
            Some(stored) => stored.uniforms.store(name, value),
            None => warn!(program = program.raw(), name, "uniform for unknown program"),
        }
    }

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.viewport = [x, y, width, height];
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    fn clear(&mut self) {
        let Some(framebuffer) = self.bound_framebuffer else {
            trace!("clear of the default target");
            return;
        };
        let rgba = to_rgba8(self.clear_color);
        if let Some(stored) = self.framebuffers.get_mut(&framebuffer) {
            for pixel in stored.color.chunks_exact_mut(4) {
                pixel.copy_from_slice(&rgba);
            }
        }
    }

    fn clear_depth(&mut self) {}

    fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
    }

    fn set_depth_mask(&mut self, enabled: bool) {
        self.depth_mask = enabled;
    }

    fn set_cull_face(&mut self, enabled: bool) {
        self.cull_face = enabled;
    }

    fn set_depth_function(&mut self, function: DepthFunction) {
        self.depth_function = function;
    }

    fn set_polygon_offset(&mut self, offset: Option<PolygonOffset>) {
        self.polygon_offset = offset;
    }

    fn draw_arrays(&mut self, vertex_array: VertexArrayHandle, vertex_count: u32) {
        if !self.vertex_arrays.contains_key(&vertex_array) {
            warn!(vertex_array = vertex_array.raw(), "draw with unknown vertex array skipped");
            return;
        }
        self.record(DrawKind::Arrays, Some(vertex_array), vertex_count);
    }

    fn draw_indexed(&mut self, vertex_array: VertexArrayHandle, index_count: u32) {
        let available = self
            .vertex_arrays
            .get(&vertex_array)
            .and_then(|array| array.index_buffer)
            .map(|(_, count)| count);
        match available {
            Some(count) if index_count <= count => {
                self.record(DrawKind::Indexed, Some(vertex_array), index_count)
            }
            Some(count) => warn!(index_count, count, "indexed draw past the index buffer skipped"),
            None => warn!(vertex_array = vertex_array.raw(), "indexed draw without indices skipped"),
        }
    }

    fn dispatch_compute(&mut self, groups_x: u32, groups_y: u32, groups_z: u32) {
        let is_compute = self
            .bound_program
            .and_then(|program| self.programs.get(&program))
            .is_some_and(|program| program.compute);
        if !is_compute {
            warn!("dispatch without a bound compute program skipped");
            return;
        }
        self.record(
            DrawKind::Compute {
                groups: [groups_x, groups_y, groups_z],
            },
            None,
            0,
        );
    }

    fn blit_to_swapchain(
        &mut self,
        framebuffer: FramebufferHandle,
        _width: u32,
        _height: u32,
    ) -> Result<()> {
        if !self.framebuffers.contains_key(&framebuffer) {
            return Self::invalid(FramebufferHandle::KIND, framebuffer.raw());
        }
        self.presented += 1;
        Ok(())
    }

    fn read_pixels(
        &mut self,
        framebuffer: FramebufferHandle,
        width: u32,
        height: u32,
    ) -> Result<Readback> {
        let Some(stored) = self.framebuffers.get(&framebuffer) else {
            return Self::invalid(FramebufferHandle::KIND, framebuffer.raw());
        };
        let full = &stored.attachments;
        if width > full.width || height > full.height {
            return Err(anyhow!(
                "read of {width}x{height} exceeds framebuffer {}x{}",
                full.width,
                full.height
            ));
        }
        let row_len = full.width as usize * 4;
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for row in stored.color.chunks_exact(row_len).take(height as usize) {
            pixels.extend_from_slice(&row[..width as usize * 4]);
        }
        Ok(Readback {
            width,
            height,
            rows: RowOrder::BottomUp,
            pixels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FramebufferSpecification, TextureFormat};

    fn framebuffer(backend: &mut HeadlessBackend, width: u32, height: u32) -> FramebufferHandle {
        let spec = FramebufferSpecification::hdr_with_depth(width, height);
        let color = backend.create_texture(&spec.color).unwrap();
        let depth = backend.create_texture(&spec.depth.unwrap()).unwrap();
        backend
            .create_framebuffer(&FramebufferAttachments {
                width,
                height,
                color: Some(color),
                depth: Some(depth),
            })
            .unwrap()
    }

    #[test]
    fn clear_fills_the_bound_framebuffer() {
        let mut backend = HeadlessBackend::new();
        let fb = framebuffer(&mut backend, 3, 2);
        backend.bind_framebuffer(Some(fb));
        backend.set_clear_color([1.0, 0.0, 0.5, 1.0]);
        backend.clear();

        let readback = backend.read_pixels(fb, 3, 2).unwrap();
        assert_eq!(readback.rows, RowOrder::BottomUp);
        assert_eq!(readback.pixels.len(), 3 * 2 * 4);
        assert_eq!(&readback.pixels[..4], &[255, 0, 128, 255]);
    }

    #[test]
    fn framebuffers_reject_mismatched_attachments() {
        let mut backend = HeadlessBackend::new();
        let color = backend
            .create_texture(&TextureSpecification::render_target(4, 4, TextureFormat::Rgba8))
            .unwrap();
        let depth = backend
            .create_texture(&TextureSpecification::render_target(2, 2, TextureFormat::Depth24Stencil8))
            .unwrap();

        let swapped = backend.create_framebuffer(&FramebufferAttachments {
            width: 4,
            height: 4,
            color: Some(depth),
            depth: None,
        });
        assert!(swapped.is_err());

        let wrong_size = backend.create_framebuffer(&FramebufferAttachments {
            width: 4,
            height: 4,
            color: Some(color),
            depth: Some(depth),
        });
        let err = wrong_size.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ResourceError>(),
            Some(ResourceError::IncompleteFramebuffer(_))
        ));
    }

    #[test]
    fn draws_need_a_program() {
        let mut backend = HeadlessBackend::new();
        let va = backend.create_vertex_array().unwrap();
        backend.draw_arrays(va, 3);
        assert!(backend.draws().is_empty());
    }

    #[test]
    fn uniforms_land_in_the_program_block() {
        let mut backend = HeadlessBackend::new();
        let program = backend
            .create_program(&ProgramSource::Graphics {
                vertex: "layout(location = 0) in vec3 a_Position;\nvoid main() { gl_Position = vec4(a_Position, 1.0); }\n".to_string(),
                fragment: "layout(location = 0) out vec4 o_Color;\nuniform float u_Zoom;\nuniform bool u_Flag;\nvoid main() { o_Color = vec4(u_Flag ? u_Zoom : 0.0); }\n".to_string(),
            })
            .unwrap();

        backend.upload_uniform(program, "u_Zoom", UniformValue::Float(2.5));
        backend.upload_uniform(program, "u_Flag", UniformValue::Bool(true));
        backend.upload_uniform(program, "u_Missing", UniformValue::Int(1));
        backend.upload_uniform(program, "u_Zoom", UniformValue::Vec2([1.0, 1.0]));

        assert_eq!(backend.uniform(program, "u_Zoom"), Some(UniformValue::Float(2.5)));
        assert_eq!(backend.uniform(program, "u_Flag"), Some(UniformValue::Bool(true)));
        assert_eq!(backend.uniform(program, "u_Missing"), None);
    }
}
