use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::{debug, error, trace};

use crate::api::{PendingRelease, ProgramHandle, ProgramSource, ReleaseQueue, RendererApi};
use crate::command::RenderCommand;
use crate::uniforms::UniformValue;

/// Files a shader program is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderSources {
    Graphics { vertex: PathBuf, fragment: PathBuf },
    Compute { compute: PathBuf },
}

impl ShaderSources {
    fn load(&self) -> Result<ProgramSource> {
        Ok(match self {
            ShaderSources::Graphics { vertex, fragment } => ProgramSource::Graphics {
                vertex: read_source(vertex)?,
                fragment: read_source(fragment)?,
            },
            ShaderSources::Compute { compute } => ProgramSource::Compute {
                compute: read_source(compute)?,
            },
        })
    }

    fn label(&self) -> String {
        match self {
            ShaderSources::Graphics { vertex, fragment } => {
                format!("{} + {}", vertex.display(), fragment.display())
            }
            ShaderSources::Compute { compute } => compute.display().to_string(),
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read shader {}", path.display()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ShaderAsset {
    shader: ShaderAssetPaths,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ShaderAssetPaths {
    vertex_path: Option<PathBuf>,
    fragment_path: Option<PathBuf>,
    compute_path: Option<PathBuf>,
}

/// A compiled program plus the files it came from.
///
/// Compilation failures are logged and leave the shader without a program;
/// [`Shader::is_valid`] reports whether one is live.
#[derive(Debug)]
pub struct Shader {
    sources: ShaderSources,
    program: Option<ProgramHandle>,
    releases: ReleaseQueue,
}

impl Shader {
    pub fn graphics<B: RendererApi>(
        command: &mut RenderCommand<B>,
        vertex: impl Into<PathBuf>,
        fragment: impl Into<PathBuf>,
    ) -> Self {
        Self::with_sources(
            command,
            ShaderSources::Graphics {
                vertex: vertex.into(),
                fragment: fragment.into(),
            },
        )
    }

    pub fn compute<B: RendererApi>(
        command: &mut RenderCommand<B>,
        compute: impl Into<PathBuf>,
    ) -> Self {
        Self::with_sources(
            command,
            ShaderSources::Compute {
                compute: compute.into(),
            },
        )
    }

    /// Reads a shader asset file:
    ///
    /// ```toml
    /// [Shader]
    /// VertexPath = "mandelbrot.vert"
    /// FragmentPath = "mandelbrot.frag"
    /// ```
    ///
    /// Relative paths resolve against the asset's directory. A `ComputePath`
    /// takes precedence over the graphics pair.
    pub fn from_asset<B: RendererApi>(command: &mut RenderCommand<B>, path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read shader asset {}", path.display()))?;
        let asset: ShaderAsset = toml::from_str(&text)
            .with_context(|| format!("failed to parse shader asset {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let resolve = |relative: PathBuf| base.join(relative);

        let paths = asset.shader;
        let sources = match (paths.compute_path, paths.vertex_path, paths.fragment_path) {
            (Some(compute), _, _) => ShaderSources::Compute {
                compute: resolve(compute),
            },
            (None, Some(vertex), Some(fragment)) => ShaderSources::Graphics {
                vertex: resolve(vertex),
                fragment: resolve(fragment),
            },
            _ => {
                return Err(anyhow!(
                    "shader asset {} needs VertexPath and FragmentPath, or ComputePath",
                    path.display()
                ))
            }
        };
        Ok(Self::with_sources(command, sources))
    }

    fn with_sources<B: RendererApi>(command: &mut RenderCommand<B>, sources: ShaderSources) -> Self {
        let program = match compile(command, &sources) {
            Ok(program) => {
                debug!(shader = %sources.label(), "shader compiled");
                Some(program)
            }
            Err(err) => {
                error!(shader = %sources.label(), "failed to build shader: {err:#}");
                None
            }
        };
        Self {
            sources,
            program,
            releases: command.releases().clone(),
        }
    }

    /// Recompiles from the stored paths. On failure the previous program stays live.
    pub fn reload<B: RendererApi>(&mut self, command: &mut RenderCommand<B>) -> bool {
        match compile(command, &self.sources) {
            Ok(program) => {
                if let Some(previous) = self.program.replace(program) {
                    self.releases.push(PendingRelease::Program(previous));
                }
                debug!(shader = %self.sources.label(), "shader reloaded");
                true
            }
            Err(err) => {
                error!(
                    shader = %self.sources.label(),
                    kept_previous = self.program.is_some(),
                    "shader reload failed: {err:#}"
                );
                false
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.program.is_some()
    }

    pub fn program(&self) -> Option<ProgramHandle> {
        self.program
    }

    pub fn sources(&self) -> &ShaderSources {
        &self.sources
    }

    /// Binds the program and returns a binder for its uniforms, or `None`
    /// when there is no live program.
    pub fn bind<'a, B: RendererApi>(
        &self,
        command: &'a mut RenderCommand<B>,
    ) -> Option<UniformBinder<'a, B>> {
        let program = self.program?;
        command.api_mut().bind_program(Some(program));
        Some(UniformBinder { command, program })
    }

    pub fn unbind<B: RendererApi>(&self, command: &mut RenderCommand<B>) {
        command.api_mut().bind_program(None);
    }

    /// Uploads one uniform without keeping a binder around.
    pub fn set_uniform<B: RendererApi>(
        &self,
        command: &mut RenderCommand<B>,
        name: &str,
        value: impl Into<UniformValue>,
    ) {
        match self.program {
            Some(program) => command.api_mut().upload_uniform(program, name, value.into()),
            None => trace!(name, "no program; uniform dropped"),
        }
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        if let Some(program) = self.program.take() {
            self.releases.push(PendingRelease::Program(program));
        }
    }
}

fn compile<B: RendererApi>(
    command: &mut RenderCommand<B>,
    sources: &ShaderSources,
) -> Result<ProgramHandle> {
    let source = sources.load()?;
    command.api_mut().create_program(&source)
}

/// Typed uniform uploads into a bound program.
pub struct UniformBinder<'a, B: RendererApi> {
    command: &'a mut RenderCommand<B>,
    program: ProgramHandle,
}

impl<B: RendererApi> UniformBinder<'_, B> {
    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) -> &mut Self {
        self.command
            .api_mut()
            .upload_uniform(self.program, name, value.into());
        self
    }

    pub fn set_int(&mut self, name: &str, value: i32) -> &mut Self {
        self.set(name, value)
    }

    pub fn set_float(&mut self, name: &str, value: f32) -> &mut Self {
        self.set(name, value)
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> &mut Self {
        self.set(name, value)
    }

    pub fn set_vec2(&mut self, name: &str, value: [f32; 2]) -> &mut Self {
        self.set(name, value)
    }

    pub fn set_vec3(&mut self, name: &str, value: [f32; 3]) -> &mut Self {
        self.set(name, value)
    }

    pub fn set_vec4(&mut self, name: &str, value: [f32; 4]) -> &mut Self {
        self.set(name, value)
    }

    pub fn set_mat4(&mut self, name: &str, value: [[f32; 4]; 4]) -> &mut Self {
        self.set(name, value)
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    /// Command access while the program stays bound, e.g. to draw.
    pub fn command(&mut self) -> &mut RenderCommand<B> {
        self.command
    }
}
