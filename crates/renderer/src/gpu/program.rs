use std::borrow::Cow;
use std::collections::HashMap;

use anyhow::Result;

use crate::api::ProgramSource;
use crate::compile::{wrap_program, WrappedStage};
use crate::error::ResourceError;
use crate::uniforms::UniformBlock;

use super::pipeline::PipelineKey;

pub(crate) enum ProgramStages {
    Graphics {
        vertex: wgpu::ShaderModule,
        fragment: wgpu::ShaderModule,
    },
    Compute {
        pipeline: wgpu::ComputePipeline,
    },
}

/// A linked program: shader modules, its uniform block and the pipelines
/// built for it so far.
pub(crate) struct GpuProgram {
    pub stages: ProgramStages,
    pub uniforms: UniformBlock,
    pub uniform_buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub pipeline_layout: wgpu::PipelineLayout,
    pub pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl GpuProgram {
    pub fn new(device: &wgpu::Device, source: &ProgramSource) -> Result<Self> {
        let wrapped = wrap_program(source)?;
        let compute = matches!(source, ProgramSource::Compute { .. });

        let visibility = if compute {
            wgpu::ShaderStages::COMPUTE
        } else {
            wgpu::ShaderStages::VERTEX_FRAGMENT
        };
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("program uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("program pipeline layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });

        let uniforms = UniformBlock::new(wrapped.layout);
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("program uniforms"),
            size: uniforms.bytes().len() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("program uniform bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let stages = match wrapped.stages.as_slice() {
            [compute_stage] if compute => {
                let module = create_module(device, compute_stage)?;
                let pipeline = checked(device, "compute pipeline", || {
                    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                        label: Some("program compute pipeline"),
                        layout: Some(&pipeline_layout),
                        module: &module,
                        entry_point: Some("main"),
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                        cache: None,
                    })
                })?;
                ProgramStages::Compute { pipeline }
            }
            [vertex, fragment] => ProgramStages::Graphics {
                vertex: create_module(device, vertex)?,
                fragment: create_module(device, fragment)?,
            },
            other => {
                return Err(ResourceError::ShaderCompilation(format!(
                    "unexpected stage count {}",
                    other.len()
                ))
                .into())
            }
        };

        Ok(Self {
            stages,
            uniforms,
            uniform_buffer,
            bind_group,
            pipeline_layout,
            pipelines: HashMap::new(),
        })
    }

    /// Copies the uniform block to the GPU when it changed since the last draw.
    pub fn flush_uniforms(&mut self, queue: &wgpu::Queue) {
        if self.uniforms.take_dirty() {
            queue.write_buffer(&self.uniform_buffer, 0, self.uniforms.bytes());
        }
    }
}

pub(crate) fn create_module(
    device: &wgpu::Device,
    stage: &WrappedStage,
) -> Result<wgpu::ShaderModule, ResourceError> {
    checked(device, "shader module", || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("program stage"),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Owned(stage.source.clone()),
                stage: stage.stage,
                defines: &[],
            },
        })
    })
    .map_err(|err| match err {
        ResourceError::ShaderCompilation(message) => {
            ResourceError::ShaderCompilation(format!("{:?} stage: {message}", stage.stage))
        }
        other => other,
    })
}

/// Runs `create` inside a validation error scope and turns a captured error
/// into [`ResourceError::ShaderCompilation`].
pub(crate) fn checked<T>(
    device: &wgpu::Device,
    what: &str,
    create: impl FnOnce() -> T,
) -> Result<T, ResourceError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let created = create();
    match pollster::block_on(device.pop_error_scope()) {
        None => Ok(created),
        Some(err) => Err(ResourceError::ShaderCompilation(format!("{what}: {err}"))),
    }
}
