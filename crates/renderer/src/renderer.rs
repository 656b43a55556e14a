use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use fractal::{FractalParameters, NamedEnum};
use tracing::{debug, error, info, trace, warn};

use crate::api::RendererApi;
use crate::command::RenderCommand;
use crate::export;
use crate::resources::{Framebuffer, IndexBuffer, Shader, VertexArray, VertexBuffer};
use crate::types::{BufferLayout, FramebufferSpecification, RendererConfig, ShaderDataType};

#[rustfmt::skip]
const QUAD_VERTICES: [f32; 20] = [
    // a_Position       a_TexCoord
    -1.0, -1.0, 0.0,    0.0, 0.0,
     1.0, -1.0, 0.0,    1.0, 0.0,
     1.0,  1.0, 0.0,    1.0, 1.0,
    -1.0,  1.0, 0.0,    0.0, 1.0,
];

const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Draws fractal parameter sets into an offscreen framebuffer.
///
/// A frame is `begin`, `submit`, `end`, then either `present` to a window or
/// `export_frame` to disk. Parts that failed to initialise stay `None` (or,
/// for the shader, invalid) and the frame operations skip them.
pub struct Renderer<B: RendererApi> {
    command: RenderCommand<B>,
    framebuffer: Option<Framebuffer>,
    quad: Option<VertexArray>,
    shader: Shader,
    config: RendererConfig,
}

impl<B: RendererApi> Renderer<B> {
    /// Fails only when the backend cannot be initialised.
    pub fn new(backend: B, config: RendererConfig) -> Result<Self> {
        let mut command = RenderCommand::new(backend);
        command.init().context("failed to initialise render backend")?;

        let (width, height) = config.framebuffer_size;
        let framebuffer =
            match Framebuffer::new(&mut command, FramebufferSpecification::hdr_with_depth(width, height)) {
                Ok(framebuffer) => Some(framebuffer),
                Err(err) => {
                    error!(width, height, "failed to create framebuffer: {err:#}");
                    None
                }
            };

        let quad = match build_quad(&mut command) {
            Ok(quad) => Some(quad),
            Err(err) => {
                error!("failed to create fullscreen quad: {err:#}");
                None
            }
        };

        let shader = Shader::graphics(
            &mut command,
            config.vertex_shader.clone(),
            config.fragment_shader.clone(),
        );

        command.enable_depth_test(true);
        command.set_clear_color(config.clear_color);
        debug!(
            backend = command.api().name(),
            width,
            height,
            shader_valid = shader.is_valid(),
            "renderer ready"
        );

        Ok(Self {
            command,
            framebuffer,
            quad,
            shader,
            config,
        })
    }

    /// Starts a frame: releases dropped resources, then binds and clears the framebuffer.
    pub fn begin(&mut self) {
        let released = self.command.process_deletion_queue();
        if released > 0 {
            trace!(released, "processed deletion queue");
        }
        if let Some(framebuffer) = &self.framebuffer {
            framebuffer.bind(&mut self.command);
        }
        self.command.clear();
    }

    pub fn end(&mut self) {
        if let Some(framebuffer) = &self.framebuffer {
            framebuffer.unbind(&mut self.command);
        }
    }

    /// Uploads `params` to the fractal shader and draws the quad.
    pub fn submit(&mut self, params: &FractalParameters) {
        let Some(quad) = &self.quad else {
            trace!("no quad; submit skipped");
            return;
        };
        let resolution = self
            .framebuffer
            .as_ref()
            .map(|framebuffer| [framebuffer.width() as f32, framebuffer.height() as f32])
            .unwrap_or([
                self.config.framebuffer_size.0 as f32,
                self.config.framebuffer_size.1 as f32,
            ]);
        let Some(mut uniforms) = self.shader.bind(&mut self.command) else {
            trace!("no valid shader; submit skipped");
            return;
        };

        let palette = params.palette.prepare_for_shader();
        uniforms
            .set_vec2("u_Resolution", resolution)
            .set_float("u_Zoom", params.zoom)
            .set_vec2("u_Position", params.position)
            .set_float("u_Rotation", params.rotation.to_radians())
            .set_int("u_MaxIterations", params.max_iterations)
            .set_float("u_Bailout", params.bailout)
            .set_int("u_Algorithm", params.algorithm.ordinal())
            .set_float("u_Power", params.power)
            .set_bool("u_JuliaMode", params.julia_mode)
            .set_vec2("u_JuliaC", params.julia_c)
            .set_int("u_ExteriorColoring", params.exterior_coloring.ordinal())
            .set_int("u_InteriorColoring", params.interior_coloring.ordinal())
            .set_vec3("u_InteriorColor", params.interior_color)
            .set_float("u_ColorFrequency", params.color_frequency)
            .set_float("u_ColorOffset", params.color_offset)
            .set_bool("u_OrbitColoring", params.orbit_coloring)
            .set_float("u_DistanceScale", params.distance_scale)
            .set_int("u_ColorCount", palette.count_i32());
        for (index, (color, position)) in palette.entries().enumerate() {
            uniforms
                .set_vec3(&format!("u_Colors[{index}]"), color)
                .set_float(&format!("u_ColorPositions[{index}]"), position);
        }
        uniforms
            .set_int("u_TrapType", params.trap.trap_type.ordinal())
            .set_vec2("u_TrapP1", params.trap.p1)
            .set_vec2("u_TrapP2", params.trap.p2)
            .set_vec3("u_TrapColor", params.trap.color)
            .set_float("u_TrapBlend", params.trap.blend);

        uniforms.command().draw_indexed(quad, 0);
    }

    /// Resizes the offscreen target. Zero dimensions are ignored with a warning.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        match self.framebuffer.as_mut() {
            Some(framebuffer) => framebuffer.resize(&mut self.command, width, height),
            None => {
                warn!(width, height, "no framebuffer to resize");
                false
            }
        }
    }

    /// Recompiles the fractal shader; the running program stays on failure.
    pub fn reload_shader(&mut self) -> bool {
        let reloaded = self.shader.reload(&mut self.command);
        if reloaded {
            info!("shader reloaded");
        }
        reloaded
    }

    /// Copies the finished frame onto the presentation surface.
    pub fn present(&mut self, width: u32, height: u32) -> Result<()> {
        let Some(framebuffer) = &self.framebuffer else {
            trace!("no framebuffer; nothing to present");
            return Ok(());
        };
        self.command.blit_to_swapchain(framebuffer, width, height)
    }

    /// Writes the framebuffer's color attachment to `path` as PNG.
    ///
    /// Returns whether a file was written; failures are logged.
    pub fn export_frame(&mut self, path: &Path) -> bool {
        let Some(framebuffer) = &self.framebuffer else {
            error!(path = %path.display(), "cannot export: framebuffer unavailable");
            return false;
        };
        let (width, height) = (framebuffer.width(), framebuffer.height());
        if width == 0 || height == 0 {
            warn!(width, height, "cannot export a zero-sized framebuffer");
            return false;
        }

        let handle = framebuffer.handle();
        let written = self
            .command
            .api_mut()
            .read_pixels(handle, width, height)
            .and_then(|readback| export::write_png(path, readback));
        match written {
            Ok(()) => {
                info!(path = %path.display(), width, height, "exported frame");
                true
            }
            Err(err) => {
                error!(path = %path.display(), "failed to export frame: {err:#}");
                false
            }
        }
    }

    /// Exports into `dir` under a timestamped name. Returns the written path.
    pub fn export_frame_to(&mut self, dir: &Path) -> Option<PathBuf> {
        let path = dir.join(export::timestamped_file_name(chrono::Local::now()));
        self.export_frame(&path).then_some(path)
    }

    pub fn framebuffer(&self) -> Option<&Framebuffer> {
        self.framebuffer.as_ref()
    }

    pub fn shader(&self) -> &Shader {
        &self.shader
    }

    pub fn has_quad(&self) -> bool {
        self.quad.is_some()
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn command(&self) -> &RenderCommand<B> {
        &self.command
    }

    pub fn command_mut(&mut self) -> &mut RenderCommand<B> {
        &mut self.command
    }

    pub fn backend(&self) -> &B {
        self.command.api()
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.command.api_mut()
    }
}

fn build_quad<B: RendererApi>(command: &mut RenderCommand<B>) -> Result<VertexArray> {
    let mut vertices = VertexBuffer::new(command, &QUAD_VERTICES)?;
    vertices.set_layout(BufferLayout::new([
        (ShaderDataType::Float3, "a_Position"),
        (ShaderDataType::Float2, "a_TexCoord"),
    ]));
    let indices = IndexBuffer::new(command, &QUAD_INDICES)?;

    let mut quad = VertexArray::new(command)?;
    quad.add_vertex_buffer(command, Rc::new(vertices))?;
    quad.set_index_buffer(command, indices)?;
    Ok(quad)
}
