//! wgpu implementation of [`RendererApi`].
//!
//! - `context` owns the instance, device and optional window surface.
//! - `program` turns wrapped GLSL into shader modules plus a uniform buffer.
//! - `pipeline` bakes fixed-function state into cached render pipelines.
//! - `blit` copies color attachments onto the surface or a readback target.
//! - `readback` maps RGBA8 texture memory back to the CPU.
//!
//! The backend follows the GL-like contract of the trait: state calls only
//! record, and every clear, draw or dispatch is encoded and submitted on its
//! own so it sees the state current at the time of the call.

mod blit;
mod context;
mod pipeline;
mod program;
mod readback;

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, error, trace, warn};

use crate::api::{
    BufferHandle, BufferUsage, FramebufferAttachments, FramebufferHandle, HandleCounter,
    ProgramHandle, ProgramSource, Readback, RendererApi, RowOrder, TextureHandle,
    VertexArrayHandle,
};
use crate::error::ResourceError;
use crate::types::{
    BackendConfig, BufferLayout, DepthFunction, PolygonOffset, TextureFilter, TextureFormat,
    TextureSpecification, TextureWrap,
};
use crate::uniforms::UniformValue;

use blit::Blitter;
use context::GpuContext;
use pipeline::{ensure_pipeline, PipelineKey};
use program::{GpuProgram, ProgramStages};

struct GpuBuffer {
    buffer: wgpu::Buffer,
    usage: BufferUsage,
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    spec: TextureSpecification,
    format: wgpu::TextureFormat,
}

#[derive(Default)]
struct GpuVertexArray {
    vertex_buffers: Vec<(BufferHandle, BufferLayout)>,
    index_buffer: Option<(BufferHandle, u32)>,
}

struct RenderState {
    framebuffer: Option<FramebufferHandle>,
    program: Option<ProgramHandle>,
    viewport: [u32; 4],
    clear_color: [f32; 4],
    depth_test: bool,
    depth_mask: bool,
    cull_face: bool,
    depth_function: DepthFunction,
    polygon_offset: Option<PolygonOffset>,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            framebuffer: None,
            program: None,
            viewport: [0; 4],
            clear_color: [0.0, 0.0, 0.0, 1.0],
            depth_test: false,
            depth_mask: true,
            cull_face: false,
            depth_function: DepthFunction::Less,
            polygon_offset: None,
        }
    }
}

/// What a clear pass resets.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ClearMode {
    ColorAndDepth,
    DepthOnly,
}

pub struct WgpuBackend {
    context: GpuContext,
    ids: HandleCounter,
    blitter: Option<Blitter>,
    buffers: HashMap<BufferHandle, GpuBuffer>,
    textures: HashMap<TextureHandle, GpuTexture>,
    vertex_arrays: HashMap<VertexArrayHandle, GpuVertexArray>,
    framebuffers: HashMap<FramebufferHandle, FramebufferAttachments>,
    programs: HashMap<ProgramHandle, GpuProgram>,
    state: RenderState,
}

impl WgpuBackend {
    /// Offscreen device; [`RendererApi::blit_to_swapchain`] is unavailable.
    pub fn headless(config: BackendConfig) -> Result<Self> {
        Ok(Self::from_context(GpuContext::headless(&config)?))
    }

    /// Device presenting to `target`, typically an `Arc<winit::window::Window>`.
    pub fn with_surface<T>(target: T, width: u32, height: u32, config: BackendConfig) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle + Send + Sync + 'static,
    {
        Ok(Self::from_context(GpuContext::with_surface(
            target, width, height, &config,
        )?))
    }

    fn from_context(context: GpuContext) -> Self {
        Self {
            context,
            ids: HandleCounter::default(),
            blitter: None,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            vertex_arrays: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            state: RenderState::default(),
        }
    }

    pub fn adapter_name(&self) -> &str {
        &self.context.adapter_name
    }

    /// Resizes the window surface; zero sizes are ignored.
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        self.context.resize_surface(width, height);
    }

    pub fn set_vsync(&mut self, enabled: bool) {
        self.context.set_vsync(enabled);
    }

    fn blitter(&mut self) -> Result<&mut Blitter> {
        if self.blitter.is_none() {
            self.blitter = Some(Blitter::new(&self.context.device)?);
        }
        self.blitter
            .as_mut()
            .ok_or_else(|| anyhow!("blitter unavailable"))
    }

    fn target_views(
        &self,
        framebuffer: FramebufferHandle,
    ) -> Option<(&GpuTexture, Option<&GpuTexture>)> {
        let attachments = self.framebuffers.get(&framebuffer)?;
        let color = self.textures.get(&attachments.color?)?;
        let depth = attachments
            .depth
            .and_then(|depth| self.textures.get(&depth));
        Some((color, depth))
    }

    fn submit_clear(&mut self, mode: ClearMode) {
        let Some(framebuffer) = self.state.framebuffer else {
            trace!("clear of the default target skipped");
            return;
        };
        let Some((color, depth)) = self.target_views(framebuffer) else {
            warn!(framebuffer = framebuffer.raw(), "clear of unknown framebuffer skipped");
            return;
        };

        let [r, g, b, a] = self.state.clear_color.map(f64::from);
        let color_load = match mode {
            ClearMode::ColorAndDepth => wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
            ClearMode::DepthOnly => wgpu::LoadOp::Load,
        };
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("clear encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: depth.map(|depth| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view: &depth.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(0),
                            store: wgpu::StoreOp::Store,
                        }),
                    }
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
        }
        self.context.queue.submit(Some(encoder.finish()));
    }

    fn submit_draw(&mut self, vertex_array: VertexArrayHandle, count: u32, indexed: bool) {
        if let Err(err) = self.try_draw(vertex_array, count, indexed) {
            error!("draw skipped: {err:#}");
        }
    }

    fn try_draw(&mut self, vertex_array: VertexArrayHandle, count: u32, indexed: bool) -> Result<()> {
        let framebuffer = self
            .state
            .framebuffer
            .ok_or_else(|| anyhow!("no framebuffer bound"))?;
        let program_handle = self
            .state
            .program
            .ok_or_else(|| anyhow!("no program bound"))?;
        let array = self
            .vertex_arrays
            .get(&vertex_array)
            .ok_or(ResourceError::InvalidHandle {
                kind: VertexArrayHandle::KIND,
                raw: vertex_array.raw(),
            })?;
        let attachments = self
            .framebuffers
            .get(&framebuffer)
            .ok_or(ResourceError::InvalidHandle {
                kind: FramebufferHandle::KIND,
                raw: framebuffer.raw(),
            })?;
        let color = attachments
            .color
            .and_then(|color| self.textures.get(&color))
            .ok_or_else(|| anyhow!("framebuffer has no color attachment"))?;
        let depth = attachments.depth.and_then(|depth| self.textures.get(&depth));

        let key = PipelineKey {
            vertex_array,
            color_format: color.format,
            depth_format: depth.map(|depth| depth.format),
            depth_test: self.state.depth_test,
            depth_write: self.state.depth_mask,
            depth_function: self.state.depth_function,
            cull_face: self.state.cull_face,
            depth_bias: PipelineKey::depth_bias_from(self.state.polygon_offset),
        };
        let layouts: Vec<BufferLayout> = array
            .vertex_buffers
            .iter()
            .map(|(_, layout)| layout.clone())
            .collect();

        let program = self
            .programs
            .get_mut(&program_handle)
            .ok_or(ResourceError::InvalidHandle {
                kind: ProgramHandle::KIND,
                raw: program_handle.raw(),
            })?;
        program.flush_uniforms(&self.context.queue);
        ensure_pipeline(&self.context.device, program, key, &layouts)?;
        let program = &*program;
        let pipeline = program
            .pipelines
            .get(&key)
            .ok_or_else(|| anyhow!("pipeline cache lost an entry"))?;

        let [x, y, width, height] = self.state.viewport;
        let target_width = attachments.width;
        let target_height = attachments.height;
        let width = width.min(target_width.saturating_sub(x));
        let height = height.min(target_height.saturating_sub(y));
        if width == 0 || height == 0 {
            trace!("draw with an empty viewport skipped");
            return Ok(());
        }
        // GL viewports count rows from the bottom.
        let top = target_height - y - height;

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("draw encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("draw pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: depth.map(|depth| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view: &depth.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                    }
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &program.bind_group, &[]);
            pass.set_viewport(x as f32, top as f32, width as f32, height as f32, 0.0, 1.0);
            for (slot, (buffer, _)) in array.vertex_buffers.iter().enumerate() {
                let buffer = self
                    .buffers
                    .get(buffer)
                    .ok_or(ResourceError::InvalidHandle {
                        kind: BufferHandle::KIND,
                        raw: buffer.raw(),
                    })?;
                pass.set_vertex_buffer(slot as u32, buffer.buffer.slice(..));
            }
            if indexed {
                let (index_buffer, available) = array
                    .index_buffer
                    .ok_or_else(|| anyhow!("vertex array has no index buffer"))?;
                if count > available {
                    anyhow::bail!("{count} indices requested, {available} available");
                }
                let index_buffer =
                    self.buffers
                        .get(&index_buffer)
                        .ok_or(ResourceError::InvalidHandle {
                            kind: BufferHandle::KIND,
                            raw: index_buffer.raw(),
                        })?;
                pass.set_index_buffer(index_buffer.buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..count, 0, 0..1);
            } else {
                pass.draw(0..count, 0..1);
            }
        }
        self.context.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}

fn texture_format(format: TextureFormat) -> Result<wgpu::TextureFormat> {
    Ok(match format {
        TextureFormat::None => anyhow::bail!("texture format None cannot be allocated"),
        TextureFormat::R8 => wgpu::TextureFormat::R8Unorm,
        // No three-channel formats in wgpu; uploads are widened.
        TextureFormat::Rgb8 | TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba16F => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Depth24Stencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
    })
}

fn filter_mode(filter: TextureFilter) -> wgpu::FilterMode {
    match filter {
        TextureFilter::Nearest => wgpu::FilterMode::Nearest,
        TextureFilter::Linear => wgpu::FilterMode::Linear,
    }
}

fn address_mode(wrap: TextureWrap) -> wgpu::AddressMode {
    match wrap {
        TextureWrap::Repeat => wgpu::AddressMode::Repeat,
        TextureWrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        TextureWrap::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

impl RendererApi for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn row_order(&self) -> RowOrder {
        RowOrder::TopDown
    }

    fn init(&mut self) -> Result<()> {
        self.blitter()?;
        debug!(adapter = %self.context.adapter_name, "wgpu backend ready");
        Ok(())
    }

    fn create_buffer(&mut self, usage: BufferUsage, contents: &[u8]) -> Result<BufferHandle> {
        let wgpu_usage = match usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
        };
        // Buffer sizes must be a multiple of four bytes.
        let size = (contents.len() as u64).max(4).next_multiple_of(4);
        let buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vertex data"),
            size,
            usage: wgpu_usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: true,
        });
        buffer.slice(..).get_mapped_range_mut()[..contents.len()].copy_from_slice(contents);
        buffer.unmap();

        let handle = BufferHandle::new(self.ids.next());
        self.buffers.insert(handle, GpuBuffer { buffer, usage });
        Ok(handle)
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        match self.buffers.remove(&buffer) {
            Some(stored) => stored.buffer.destroy(),
            None => warn!(buffer = buffer.raw(), "deleting unknown buffer"),
        }
    }

    fn create_texture(&mut self, spec: &TextureSpecification) -> Result<TextureHandle> {
        let format = texture_format(spec.format)?;
        let usage = if spec.format.is_depth() {
            wgpu::TextureUsages::RENDER_ATTACHMENT
        } else {
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::RENDER_ATTACHMENT
        };
        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("texture"),
            size: wgpu::Extent3d {
                width: spec.width.max(1),
                height: spec.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.context.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("texture sampler"),
            address_mode_u: address_mode(spec.wrap_s),
            address_mode_v: address_mode(spec.wrap_t),
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter_mode(spec.mag_filter),
            min_filter: filter_mode(spec.min_filter),
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let handle = TextureHandle::new(self.ids.next());
        self.textures.insert(
            handle,
            GpuTexture {
                texture,
                view,
                sampler,
                spec: *spec,
                format,
            },
        );
        Ok(handle)
    }

    fn write_texture(&mut self, texture: TextureHandle, pixels: &[u8]) -> Result<()> {
        let stored = self
            .textures
            .get(&texture)
            .ok_or(ResourceError::InvalidHandle {
                kind: TextureHandle::KIND,
                raw: texture.raw(),
            })?;
        let spec = stored.spec;
        if spec.format.is_depth() {
            anyhow::bail!("depth textures cannot be written from the CPU");
        }
        let expected = spec.byte_len();
        if pixels.len() != expected {
            return Err(ResourceError::SizeMismatch {
                expected,
                actual: pixels.len(),
            }
            .into());
        }

        let widened;
        let (data, bytes_per_pixel) = if spec.format == TextureFormat::Rgb8 {
            widened = pixels
                .chunks_exact(3)
                .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], u8::MAX])
                .collect::<Vec<u8>>();
            (widened.as_slice(), 4)
        } else {
            (pixels, spec.format.bytes_per_pixel())
        };

        self.context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &stored.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(spec.width * bytes_per_pixel),
                rows_per_image: Some(spec.height),
            },
            wgpu::Extent3d {
                width: spec.width,
                height: spec.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        match self.textures.remove(&texture) {
            Some(stored) => stored.texture.destroy(),
            None => warn!(texture = texture.raw(), "deleting unknown texture"),
        }
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayHandle> {
        let handle = VertexArrayHandle::new(self.ids.next());
        self.vertex_arrays.insert(handle, GpuVertexArray::default());
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
            Some(_) => anyhow::bail!("buffer #{} is not a vertex buffer", buffer.raw()),
            None => {
                return Err(ResourceError::InvalidHandle {
                    kind: BufferHandle::KIND,
                    raw: buffer.raw(),
                }
                .into())
            }
        }
        let array = self
            .vertex_arrays
            .get_mut(&vertex_array)
            .ok_or(ResourceError::InvalidHandle {
                kind: VertexArrayHandle::KIND,
                raw: vertex_array.raw(),
            })?;
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
            Some(stored) if stored.usage == BufferUsage::Index => {}
            Some(_) => anyhow::bail!("buffer #{} is not an index buffer", buffer.raw()),
            None => {
                return Err(ResourceError::InvalidHandle {
                    kind: BufferHandle::KIND,
                    raw: buffer.raw(),
                }
                .into())
            }
        }
        let array = self
            .vertex_arrays
            .get_mut(&vertex_array)
            .ok_or(ResourceError::InvalidHandle {
                kind: VertexArrayHandle::KIND,
                raw: vertex_array.raw(),
            })?;
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
        let incomplete = |reason: String| ResourceError::IncompleteFramebuffer(reason);
        let color = attachments
            .color
            .ok_or_else(|| incomplete("no color attachment".to_string()))?;
        let color = self
            .textures
            .get(&color)
            .ok_or_else(|| incomplete(format!("color attachment #{} does not exist", color.raw())))?;
        if !color.spec.format.is_color() {
            return Err(incomplete(format!("{:?} is not a color format", color.spec.format)).into());
        }
        let mut sized = vec![&color.spec];
        if let Some(depth) = attachments.depth {
            let depth = self.textures.get(&depth).ok_or_else(|| {
                incomplete(format!("depth attachment #{} does not exist", depth.raw()))
            })?;
            if !depth.spec.format.is_depth() {
                return Err(incomplete(format!("{:?} is not a depth format", depth.spec.format)).into());
            }
            sized.push(&depth.spec);
        }
        if sized
            .iter()
            .any(|spec| spec.width != attachments.width || spec.height != attachments.height)
        {
            return Err(incomplete("attachment sizes differ from the framebuffer".to_string()).into());
        }

        let handle = FramebufferHandle::new(self.ids.next());
        self.framebuffers.insert(handle, *attachments);
        Ok(handle)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if self.framebuffers.remove(&framebuffer).is_none() {
            warn!(framebuffer = framebuffer.raw(), "deleting unknown framebuffer");
        }
        if self.state.framebuffer == Some(framebuffer) {
            self.state.framebuffer = None;
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.state.framebuffer = framebuffer;
    }

    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle> {
        let program = GpuProgram::new(&self.context.device, source)?;
        let handle = ProgramHandle::new(self.ids.next());
        self.programs.insert(handle, program);
        Ok(handle)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_none() {
            warn!(program = program.raw(), "deleting unknown program");
        }
        if self.state.program == Some(program) {
            self.state.program = None;
        }
    }

    fn bind_program(&mut self, program: Option<ProgramHandle>) {
        self.state.program = program;
    }

    fn upload_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue) {
        match self.programs.get_mut(&program) {
            Some(stored) => stored.uniforms.store(name, value),
            None => warn!(program = program.raw(), name, "uniform for unknown program"),
        }
    }

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.state.viewport = [x, y, width, height];
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.state.clear_color = color;
    }

    fn clear(&mut self) {
        self.submit_clear(ClearMode::ColorAndDepth);
    }

    fn clear_depth(&mut self) {
        self.submit_clear(ClearMode::DepthOnly);
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.state.depth_test = enabled;
    }

    fn set_depth_mask(&mut self, enabled: bool) {
        self.state.depth_mask = enabled;
    }

    fn set_cull_face(&mut self, enabled: bool) {
        self.state.cull_face = enabled;
    }

    fn set_depth_function(&mut self, function: DepthFunction) {
        self.state.depth_function = function;
    }

    fn set_polygon_offset(&mut self, offset: Option<PolygonOffset>) {
        self.state.polygon_offset = offset;
    }

    fn draw_arrays(&mut self, vertex_array: VertexArrayHandle, vertex_count: u32) {
        self.submit_draw(vertex_array, vertex_count, false);
    }

    fn draw_indexed(&mut self, vertex_array: VertexArrayHandle, index_count: u32) {
        self.submit_draw(vertex_array, index_count, true);
    }

    fn dispatch_compute(&mut self, groups_x: u32, groups_y: u32, groups_z: u32) {
        let Some(program) = self
            .state
            .program
            .and_then(|program| self.programs.get_mut(&program))
        else {
            warn!("dispatch without a bound program skipped");
            return;
        };
        let ProgramStages::Compute { pipeline } = &program.stages else {
            warn!("dispatch with a graphics program skipped");
            return;
        };
        if program.uniforms.take_dirty() {
            self.context
                .queue
                .write_buffer(&program.uniform_buffer, 0, program.uniforms.bytes());
        }

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("compute encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("compute pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &program.bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, groups_z);
        }
        self.context.queue.submit(Some(encoder.finish()));
    }

    fn blit_to_swapchain(
        &mut self,
        framebuffer: FramebufferHandle,
        width: u32,
        height: u32,
    ) -> Result<()> {
        if self.context.surface.is_none() {
            anyhow::bail!("backend has no presentation surface");
        }
        self.context.resize_surface(width, height);

        let frame = {
            let Some(state) = self.context.surface.as_ref() else {
                anyhow::bail!("backend has no presentation surface");
            };
            match state.surface.get_current_texture() {
                Ok(frame) => frame,
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    debug!("surface lost or outdated; reconfiguring");
                    self.context.reconfigure_surface();
                    return Ok(());
                }
                Err(wgpu::SurfaceError::Timeout) => {
                    debug!("surface timeout; skipping frame");
                    return Ok(());
                }
                Err(err) => return Err(err).context("failed to acquire surface texture"),
            }
        };
        let surface_format = frame.texture.format();
        let target = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let color = self
            .target_views(framebuffer)
            .map(|(color, _)| (color.view.clone(), color.sampler.clone()))
            .ok_or(ResourceError::InvalidHandle {
                kind: FramebufferHandle::KIND,
                raw: framebuffer.raw(),
            })?;

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("present encoder"),
            });
        let device = self.context.device.clone();
        self.blitter()?
            .blit(&device, &mut encoder, &color.0, &color.1, &target, surface_format)?;
        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn read_pixels(
        &mut self,
        framebuffer: FramebufferHandle,
        width: u32,
        height: u32,
    ) -> Result<Readback> {
        let (color, _) = self
            .target_views(framebuffer)
            .ok_or(ResourceError::InvalidHandle {
                kind: FramebufferHandle::KIND,
                raw: framebuffer.raw(),
            })?;
        if width == 0 || height == 0 || width > color.spec.width || height > color.spec.height {
            anyhow::bail!(
                "cannot read {width}x{height} from a {}x{} framebuffer",
                color.spec.width,
                color.spec.height
            );
        }

        let device = self.context.device.clone();
        let pixels = if color.format == wgpu::TextureFormat::Rgba8Unorm {
            let texture = color.texture.clone();
            readback::read_rgba8(&device, &self.context.queue, &texture, width, height)?
        } else {
            let (view, sampler) = (color.view.clone(), color.sampler.clone());
            let (full_width, full_height) = (color.spec.width, color.spec.height);
            let staging = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("readback staging"),
                size: wgpu::Extent3d {
                    width: full_width,
                    height: full_height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
            let staging_view = staging.create_view(&wgpu::TextureViewDescriptor::default());
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback conversion"),
            });
            self.blitter()?.blit(
                &device,
                &mut encoder,
                &view,
                &sampler,
                &staging_view,
                wgpu::TextureFormat::Rgba8Unorm,
            )?;
            self.context.queue.submit(Some(encoder.finish()));
            let pixels = readback::read_rgba8(&device, &self.context.queue, &staging, width, height);
            staging.destroy();
            pixels?
        };

        Ok(Readback {
            width,
            height,
            rows: RowOrder::TopDown,
            pixels,
        })
    }
}
