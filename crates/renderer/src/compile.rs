use std::collections::HashMap;

use wgpu::naga::ShaderStage;

use crate::api::ProgramSource;
use crate::error::ResourceError;
use crate::uniforms::{UniformBlockLayout, UniformDeclaration, UniformType};

const VERSION_DIRECTIVE: &str = "#version 450";
const BLOCK_NAME: &str = "ProgramUniforms";
const BLOCK_INSTANCE: &str = "program_uniforms";
const MEMBER_PREFIX: &str = "m_";

/// One stage rewritten for the Vulkan-flavoured GLSL frontend.
#[derive(Debug, Clone)]
pub(crate) struct WrappedStage {
    pub stage: ShaderStage,
    pub source: String,
}

/// All stages of a program plus the shared uniform block layout.
#[derive(Debug, Clone)]
pub(crate) struct WrappedProgram {
    pub stages: Vec<WrappedStage>,
    pub layout: UniformBlockLayout,
}

/// Rewrites GL-style sources so they compile as GLSL 450 with one uniform block.
///
/// Steps performed per stage:
///
/// 1. Blank out the `#version` line and every loose `uniform` declaration.
///    Compiler diagnostics count lines from the generated header, so they sit
///    below the matching line of the original file.
/// 2. Merge the declarations of all stages into one std140
///    [`UniformBlockLayout`].
/// 3. Prepend the block plus `#define` aliases so the original names keep
///    working. `bool` members travel as `int` and read back as `(x != 0)`.
pub(crate) fn wrap_program(source: &ProgramSource) -> Result<WrappedProgram, ResourceError> {
    let inputs: Vec<(ShaderStage, &str)> = match source {
        ProgramSource::Graphics { vertex, fragment } => vec![
            (ShaderStage::Vertex, vertex.as_str()),
            (ShaderStage::Fragment, fragment.as_str()),
        ],
        ProgramSource::Compute { compute } => vec![(ShaderStage::Compute, compute.as_str())],
    };

    let mut declarations: Vec<UniformDeclaration> = Vec::new();
    let mut bodies = Vec::with_capacity(inputs.len());
    for (stage, text) in inputs {
        if text.trim().is_empty() {
            return Err(ResourceError::ShaderCompilation(format!(
                "{stage:?} shader source is empty"
            )));
        }
        let (body, found) = strip_uniforms(text)?;
        for declaration in found {
            merge_declaration(&mut declarations, declaration)?;
        }
        bodies.push((stage, body));
    }

    let layout = UniformBlockLayout::new(&declarations);
    let header = block_header(&layout);
    let stages = bodies
        .into_iter()
        .map(|(stage, body)| WrappedStage {
            stage,
            source: format!("{VERSION_DIRECTIVE}\n{header}{body}"),
        })
        .collect();

    Ok(WrappedProgram { stages, layout })
}

/// Runs a wrapped stage through the GLSL frontend and validator.
///
/// The wgpu backend gets the same diagnostics from `create_shader_module`;
/// the headless backend calls this directly so broken shaders fail there too.
pub(crate) fn validate_stage(stage: &WrappedStage) -> Result<(), ResourceError> {
    use wgpu::naga::front::glsl::{Frontend, Options};
    use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

    let module = Frontend::default()
        .parse(&Options::from(stage.stage), &stage.source)
        .map_err(|errors| {
            ResourceError::ShaderCompilation(format!(
                "{:?} stage: {}",
                stage.stage,
                errors.emit_to_string(&stage.source)
            ))
        })?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|err| {
            ResourceError::ShaderCompilation(format!(
                "{:?} stage: {}",
                stage.stage,
                err.emit_to_string(&stage.source)
            ))
        })?;
    Ok(())
}

fn strip_uniforms(source: &str) -> Result<(String, Vec<UniformDeclaration>), ResourceError> {
    let mut defines: HashMap<String, u32> = HashMap::new();
    let mut found = Vec::new();
    let mut body = String::with_capacity(source.len());

    for line in source.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("#version") {
            body.push('\n');
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("#define") {
            let mut parts = rest.split_whitespace();
            if let (Some(name), Some(value)) = (parts.next(), parts.next()) {
                if let Ok(value) = value.parse::<u32>() {
                    defines.insert(name.to_string(), value);
                }
            }
        }
        if let Some(rest) = trimmed.strip_prefix("uniform ") {
            let code = rest.split("//").next().unwrap_or("").trim();
            if !code.contains('{') {
                parse_declarations(code, &defines, &mut found)?;
                body.push('\n');
                continue;
            }
        }
        body.push_str(line);
        body.push('\n');
    }

    Ok((body, found))
}

fn parse_declarations(
    code: &str,
    defines: &HashMap<String, u32>,
    found: &mut Vec<UniformDeclaration>,
) -> Result<(), ResourceError> {
    let statement = code.strip_suffix(';').ok_or_else(|| {
        ResourceError::ShaderCompilation(format!(
            "uniform declaration must end on the same line: `uniform {code}`"
        ))
    })?;

    let mut words = statement
        .split_whitespace()
        .filter(|word| !matches!(*word, "highp" | "mediump" | "lowp"));
    let type_name = words.next().unwrap_or("");
    let declarators = words.collect::<Vec<_>>().join(" ");

    for declarator in declarators.split(',') {
        let declarator = declarator.trim();
        let (name, array_len) = match declarator.split_once('[') {
            None => (declarator, None),
            Some((name, rest)) => {
                let length = rest.trim().strip_suffix(']').map(str::trim).unwrap_or("");
                let parsed = length
                    .parse::<u32>()
                    .ok()
                    .or_else(|| defines.get(length).copied())
                    .filter(|len| *len > 0)
                    .ok_or_else(|| ResourceError::UnsupportedUniform {
                        name: name.trim().to_string(),
                        reason: format!("array length `{length}` is not a positive constant"),
                    })?;
                (name.trim(), Some(parsed))
            }
        };

        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ResourceError::UnsupportedUniform {
                name: declarator.to_string(),
                reason: "expected a plain identifier without initializer".to_string(),
            });
        }

        let ty = UniformType::from_glsl(type_name).ok_or_else(|| {
            let reason = if type_name.starts_with("sampler")
                || type_name.starts_with("image")
                || type_name.starts_with("texture")
            {
                "opaque types need an explicit binding".to_string()
            } else {
                format!("type `{type_name}` is not supported in the uniform block")
            };
            ResourceError::UnsupportedUniform {
                name: name.to_string(),
                reason,
            }
        })?;

        if ty == UniformType::Bool && array_len.is_some() {
            return Err(ResourceError::UnsupportedUniform {
                name: name.to_string(),
                reason: "bool arrays are not supported".to_string(),
            });
        }

        found.push(UniformDeclaration {
            name: name.to_string(),
            ty,
            array_len,
        });
    }

    Ok(())
}

fn merge_declaration(
    declarations: &mut Vec<UniformDeclaration>,
    declaration: UniformDeclaration,
) -> Result<(), ResourceError> {
    match declarations.iter().find(|d| d.name == declaration.name) {
        Some(existing) if *existing == declaration => Ok(()),
        Some(existing) => Err(ResourceError::UnsupportedUniform {
            name: declaration.name.clone(),
            reason: format!(
                "declared as {:?}{} and {:?}{}",
                existing.ty,
                array_suffix(existing.array_len),
                declaration.ty,
                array_suffix(declaration.array_len)
            ),
        }),
        None => {
            declarations.push(declaration);
            Ok(())
        }
    }
}

fn array_suffix(len: Option<u32>) -> String {
    len.map(|len| format!("[{len}]")).unwrap_or_default()
}

fn block_header(layout: &UniformBlockLayout) -> String {
    if layout.members().is_empty() {
        return String::new();
    }

    let mut header = format!("layout(std140, set = 0, binding = 0) uniform {BLOCK_NAME} {{\n");
    for member in layout.members() {
        header.push_str(&format!(
            "    {} {MEMBER_PREFIX}{}{};\n",
            member.ty.block_glsl(),
            member.name,
            array_suffix(member.array_len)
        ));
    }
    header.push_str(&format!("}} {BLOCK_INSTANCE};\n\n"));

    for member in layout.members() {
        let access = format!("{BLOCK_INSTANCE}.{MEMBER_PREFIX}{}", member.name);
        if member.ty == UniformType::Bool {
            header.push_str(&format!("#define {} ({access} != 0)\n", member.name));
        } else {
            header.push_str(&format!("#define {} {access}\n", member.name));
        }
    }
    header
}

/// Full-screen triangle used to copy a color attachment onto another target.
pub(crate) const BLIT_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

pub(crate) const BLIT_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(set = 0, binding = 0) uniform texture2D blit_source;
layout(set = 0, binding = 1) uniform sampler blit_sampler;

void main() {
    outColor = texture(sampler2D(blit_source, blit_sampler), v_uv);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    fn graphics(vertex: &str, fragment: &str) -> ProgramSource {
        ProgramSource::Graphics {
            vertex: vertex.to_string(),
            fragment: fragment.to_string(),
        }
    }

    const VERTEX: &str = r"#version 330 core
layout(location = 0) in vec3 a_Position;
uniform float u_Zoom;
void main() { gl_Position = vec4(a_Position * u_Zoom, 1.0); }
";

    #[test]
    fn wrap_moves_uniforms_into_block() {
        let fragment = r"#version 330 core
#define PALETTE 16
layout(location = 0) out vec4 o_Color;
uniform float u_Zoom;
uniform bool u_JuliaMode; // toggles julia sets
uniform vec3 u_Colors[PALETTE];
uniform highp vec2 u_A, u_B;
void main() { o_Color = vec4(u_Colors[0], u_JuliaMode ? 1.0 : 0.0); }
";
        let wrapped = wrap_program(&graphics(VERTEX, fragment)).unwrap();
        assert_eq!(wrapped.stages.len(), 2);

        let names: Vec<_> = wrapped
            .layout
            .members()
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, ["u_Zoom", "u_JuliaMode", "u_Colors", "u_A", "u_B"]);
        assert_eq!(wrapped.layout.member("u_Colors").unwrap().array_len, Some(16));

        let fragment_source = &wrapped.stages[1].source;
        assert!(fragment_source.starts_with("#version 450\n"));
        assert!(!fragment_source.contains("#version 330"));
        assert!(!fragment_source.contains("uniform float u_Zoom;"));
        assert!(fragment_source.contains("    vec3 m_u_Colors[16];"));
        assert!(fragment_source.contains("    int m_u_JuliaMode;"));
        assert!(fragment_source.contains("#define u_JuliaMode (program_uniforms.m_u_JuliaMode != 0)"));
        assert!(fragment_source.contains("#define u_Zoom program_uniforms.m_u_Zoom"));
    }

    #[test]
    fn stages_share_one_block() {
        let fragment = "layout(location = 0) out vec4 c;\nuniform float u_Zoom;\nvoid main() { c = vec4(u_Zoom); }\n";
        let wrapped = wrap_program(&graphics(VERTEX, fragment)).unwrap();
        assert_eq!(wrapped.layout.members().len(), 1);
        assert!(wrapped.stages[0].source.contains("m_u_Zoom;"));
    }

    #[test]
    fn conflicting_declarations_are_rejected() {
        let fragment = "uniform int u_Zoom;\nvoid main() {}\n";
        let err = wrap_program(&graphics(VERTEX, fragment)).unwrap_err();
        assert!(matches!(err, ResourceError::UnsupportedUniform { .. }));
    }

    #[test]
    fn samplers_and_empty_sources_fail() {
        let sampler = "uniform sampler2D u_Texture;\nvoid main() {}\n";
        assert!(wrap_program(&graphics(VERTEX, sampler)).is_err());
        assert!(matches!(
            wrap_program(&graphics(VERTEX, "  \n")),
            Err(ResourceError::ShaderCompilation(_))
        ));
    }

    #[test]
    fn layout_blocks_are_left_alone() {
        let fragment = "layout(std140, binding = 1) uniform Extra { float x; } extra;\nvoid main() {}\n";
        let wrapped = wrap_program(&graphics(VERTEX, fragment)).unwrap();
        assert!(wrapped.stages[1].source.contains("uniform Extra { float x; } extra;"));
    }
    #[test]
    fn wrapped_sources_pass_the_frontend() {
        let fragment = r"#version 330 core
layout(location = 0) out vec4 o_Color;
uniform bool u_Flag;
uniform vec3 u_Colors[4];
void main() { o_Color = vec4(u_Flag ? u_Colors[1] : u_Colors[0], 1.0); }
";
        let wrapped = wrap_program(&graphics(VERTEX, fragment)).unwrap();
        for stage in &wrapped.stages {
            validate_stage(stage).unwrap();
        }

        let broken = WrappedStage {
            stage: ShaderStage::Fragment,
            source: "#version 450\nvoid main() { undefined_call(); }\n".to_string(),
        };
        assert!(matches!(
            validate_stage(&broken),
            Err(ResourceError::ShaderCompilation(_))
        ));
    }

    #[test]
    fn blit_shaders_pass_the_frontend() {
        for (stage, source) in [
            (ShaderStage::Vertex, BLIT_VERTEX_GLSL),
            (ShaderStage::Fragment, BLIT_FRAGMENT_GLSL),
        ] {
            validate_stage(&WrappedStage {
                stage,
                source: source.to_string(),
            })
            .unwrap();
        }
    }
}
