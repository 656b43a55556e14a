use anyhow::Result;
use tracing::warn;

use crate::api::VertexArrayHandle;
use crate::types::{BufferLayout, DepthFunction, PolygonOffset, ShaderDataType};

use super::program::{checked, GpuProgram, ProgramStages};

/// Fixed-function state a render pipeline is baked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub vertex_array: VertexArrayHandle,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_function: DepthFunction,
    pub cull_face: bool,
    /// `(units, factor bits)` while polygon offset is enabled.
    pub depth_bias: Option<(i32, u32)>,
}

impl PipelineKey {
    pub fn depth_bias_from(offset: Option<PolygonOffset>) -> Option<(i32, u32)> {
        offset.map(|offset| (offset.units as i32, offset.factor.to_bits()))
    }
}

/// wgpu vertex formats for one attribute; matrices occupy one location per column.
fn vertex_formats(data_type: ShaderDataType) -> Option<(wgpu::VertexFormat, u32)> {
    use wgpu::VertexFormat as F;
    Some(match data_type {
        ShaderDataType::Float => (F::Float32, 1),
        ShaderDataType::Float2 => (F::Float32x2, 1),
        ShaderDataType::Float3 => (F::Float32x3, 1),
        ShaderDataType::Float4 => (F::Float32x4, 1),
        ShaderDataType::Mat3 => (F::Float32x3, 3),
        ShaderDataType::Mat4 => (F::Float32x4, 4),
        ShaderDataType::Int => (F::Sint32, 1),
        ShaderDataType::Int2 => (F::Sint32x2, 1),
        ShaderDataType::Int3 => (F::Sint32x3, 1),
        ShaderDataType::Int4 => (F::Sint32x4, 1),
        ShaderDataType::Bool => return None,
    })
}

/// Attribute lists for each vertex buffer, with locations numbered across buffers.
pub(crate) fn vertex_attributes(layouts: &[BufferLayout]) -> Vec<Vec<wgpu::VertexAttribute>> {
    let mut location = 0;
    layouts
        .iter()
        .map(|layout| {
            let mut attributes = Vec::new();
            for element in layout.elements() {
                let Some((format, columns)) = vertex_formats(element.data_type) else {
                    warn!(attribute = %element.name, "bool vertex attributes are not supported; skipping");
                    location += 1;
                    continue;
                };
                for column in 0..columns {
                    attributes.push(wgpu::VertexAttribute {
                        format,
                        offset: u64::from(element.offset + column * format.size() as u32),
                        shader_location: location,
                    });
                    location += 1;
                }
            }
            attributes
        })
        .collect()
}

fn compare(function: DepthFunction) -> wgpu::CompareFunction {
    match function {
        DepthFunction::Less => wgpu::CompareFunction::Less,
        DepthFunction::LessEqual => wgpu::CompareFunction::LessEqual,
    }
}

/// Builds and caches the pipeline for `key` unless it already exists.
pub(crate) fn ensure_pipeline(
    device: &wgpu::Device,
    program: &mut GpuProgram,
    key: PipelineKey,
    layouts: &[BufferLayout],
) -> Result<()> {
    if !program.pipelines.contains_key(&key) {
        let pipeline = build(device, program, &key, layouts)?;
        program.pipelines.insert(key, pipeline);
    }
    Ok(())
}

fn build(
    device: &wgpu::Device,
    program: &GpuProgram,
    key: &PipelineKey,
    layouts: &[BufferLayout],
) -> Result<wgpu::RenderPipeline> {
    let ProgramStages::Graphics { vertex, fragment } = &program.stages else {
        anyhow::bail!("compute programs cannot draw");
    };

    let attributes = vertex_attributes(layouts);
    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = layouts
        .iter()
        .zip(&attributes)
        .map(|(layout, attributes)| wgpu::VertexBufferLayout {
            array_stride: u64::from(layout.stride()),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        })
        .collect();

    let depth_stencil = key.depth_format.map(|format| wgpu::DepthStencilState {
        format,
        depth_write_enabled: key.depth_test && key.depth_write,
        depth_compare: if key.depth_test {
            compare(key.depth_function)
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState::default(),
        bias: key
            .depth_bias
            .map(|(units, factor)| wgpu::DepthBiasState {
                constant: units,
                slope_scale: f32::from_bits(factor),
                clamp: 0.0,
            })
            .unwrap_or_default(),
    });

    let pipeline = checked(device, "render pipeline", || {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("program pipeline"),
            layout: Some(&program.pipeline_layout),
            vertex: wgpu::VertexState {
                module: vertex,
                entry_point: Some("main"),
                buffers: &buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: key.cull_face.then_some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: fragment,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.color_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        })
    })?;
    Ok(pipeline)
}
