//! `.fractal` documents.
//!
//! A document is TOML with a single `[Mandelbrot]` root table:
//!
//! ```toml
//! [Mandelbrot.FractalParameters]
//! Algorithm = "Burning Ship"
//! Power = 2.0
//! Bailout = 16.0
//! MaxIterations = 512
//!
//! [Mandelbrot.ViewParameters]
//! Zoom = 1.0
//! Position = [-0.5, 0.0]
//! Rotation = 0.0
//!
//! [Mandelbrot.ColoringParameters.ColorPalette]
//! Colors = [[0.0, 0.0, 0.5], [1.0, 1.0, 0.0]]
//! ```
//!
//! Loading is lenient: every key is optional, missing keys keep the value the
//! parameters already had, and unknown enum names fall back with a warning.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::names::NamedEnum;
use crate::orbit_trap::OrbitTrapType;
use crate::palette::Palette;
use crate::params::{ColorAlgorithm, FractalAlgorithm, FractalParameters, InteriorColoring};

/// File extension used for fractal documents.
pub const FILE_EXTENSION: &str = "fractal";

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse fractal document: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize fractal document: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("fractal document has no [Mandelbrot] table")]
    MissingRoot,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FractalDocument {
    #[serde(rename = "Mandelbrot")]
    mandelbrot: Option<MandelbrotSection>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MandelbrotSection {
    fractal_parameters: Option<FractalSection>,
    view_parameters: Option<ViewSection>,
    julia_parameters: Option<JuliaSection>,
    coloring_parameters: Option<ColoringSection>,
    orbit_trap: Option<TrapSection>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FractalSection {
    algorithm: Option<String>,
    power: Option<f32>,
    bailout: Option<f32>,
    max_iterations: Option<i32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ViewSection {
    zoom: Option<f32>,
    position: Option<[f32; 2]>,
    rotation: Option<f32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JuliaSection {
    julia_mode: Option<bool>,
    julia_c: Option<[f32; 2]>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ColoringSection {
    exterior_coloring: Option<String>,
    interior_coloring: Option<String>,
    interior_color: Option<[f32; 3]>,
    color_frequency: Option<f32>,
    color_offset: Option<f32>,
    orbit_coloring: Option<bool>,
    distance_scale: Option<f32>,
    color_palette: Option<PaletteSection>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PaletteSection {
    colors: Option<Vec<[f32; 3]>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrapSection {
    #[serde(rename = "Type")]
    trap_type: Option<String>,
    #[serde(rename = "P1")]
    p1: Option<[f32; 2]>,
    #[serde(rename = "P2")]
    p2: Option<[f32; 2]>,
    color: Option<[f32; 3]>,
    blend: Option<f32>,
}

impl MandelbrotSection {
    fn from_parameters(params: &FractalParameters) -> Self {
        Self {
            fractal_parameters: Some(FractalSection {
                algorithm: Some(params.algorithm.name().to_string()),
                power: Some(params.power),
                bailout: Some(params.bailout),
                max_iterations: Some(params.max_iterations),
            }),
            view_parameters: Some(ViewSection {
                zoom: Some(params.zoom),
                position: Some(params.position),
                rotation: Some(params.rotation),
            }),
            julia_parameters: Some(JuliaSection {
                julia_mode: Some(params.julia_mode),
                julia_c: Some(params.julia_c),
            }),
            coloring_parameters: Some(ColoringSection {
                exterior_coloring: Some(params.exterior_coloring.name().to_string()),
                interior_coloring: Some(params.interior_coloring.name().to_string()),
                interior_color: Some(params.interior_color),
                color_frequency: Some(params.color_frequency),
                color_offset: Some(params.color_offset),
                orbit_coloring: Some(params.orbit_coloring),
                distance_scale: Some(params.distance_scale),
                color_palette: Some(PaletteSection {
                    colors: Some(params.palette.colors.clone()),
                }),
            }),
            orbit_trap: Some(TrapSection {
                trap_type: Some(params.trap.trap_type.name().to_string()),
                p1: Some(params.trap.p1),
                p2: Some(params.trap.p2),
                color: Some(params.trap.color),
                blend: Some(params.trap.blend),
            }),
        }
    }

    fn apply(self, params: &mut FractalParameters) {
        if let Some(section) = self.fractal_parameters {
            if let Some(name) = section.algorithm {
                params.algorithm = FractalAlgorithm::from_name_or_fallback(&name);
            }
            assign(&mut params.power, section.power);
            assign(&mut params.bailout, section.bailout);
            assign(&mut params.max_iterations, section.max_iterations);
        }

        if let Some(section) = self.view_parameters {
            assign(&mut params.zoom, section.zoom);
            assign(&mut params.position, section.position);
            assign(&mut params.rotation, section.rotation);
        }

        if let Some(section) = self.julia_parameters {
            assign(&mut params.julia_mode, section.julia_mode);
            assign(&mut params.julia_c, section.julia_c);
        }

        if let Some(section) = self.coloring_parameters {
            if let Some(name) = section.exterior_coloring {
                params.exterior_coloring = ColorAlgorithm::from_name_or_fallback(&name);
            }
            if let Some(name) = section.interior_coloring {
                params.interior_coloring = InteriorColoring::from_name_or_fallback(&name);
            }
            assign(&mut params.interior_color, section.interior_color);
            assign(&mut params.color_frequency, section.color_frequency);
            assign(&mut params.color_offset, section.color_offset);
            assign(&mut params.orbit_coloring, section.orbit_coloring);
            assign(&mut params.distance_scale, section.distance_scale);
            if let Some(colors) = section.color_palette.and_then(|palette| palette.colors) {
                params.palette = Palette::new(colors);
            }
        }

        if let Some(section) = self.orbit_trap {
            if let Some(name) = section.trap_type {
                params.trap.trap_type = OrbitTrapType::from_name_or_fallback(&name);
            }
            assign(&mut params.trap.p1, section.p1);
            assign(&mut params.trap.p2, section.p2);
            assign(&mut params.trap.color, section.color);
            assign(&mut params.trap.blend, section.blend);
        }
    }
}

fn assign<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// Serializes every field of `params` into a document string.
pub fn to_toml_string(params: &FractalParameters) -> Result<String, DocumentError> {
    let document = FractalDocument {
        mandelbrot: Some(MandelbrotSection::from_parameters(params)),
    };
    Ok(toml::to_string_pretty(&document)?)
}

/// Applies a document onto `params`.
///
/// On error `params` is left exactly as it was.
pub fn apply_toml_str(source: &str, params: &mut FractalParameters) -> Result<(), DocumentError> {
    let document: FractalDocument = toml::from_str(source)?;
    let section = document.mandelbrot.ok_or(DocumentError::MissingRoot)?;

    let mut updated = params.clone();
    section.apply(&mut updated);
    *params = updated.sanitized(params);
    Ok(())
}

/// Reads `path` and applies it onto `params`.
pub fn load_into(path: &Path, params: &mut FractalParameters) -> Result<(), DocumentError> {
    let contents = fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    apply_toml_str(&contents, params)?;
    tracing::debug!(path = %path.display(), "loaded fractal document");
    Ok(())
}

/// Reads `path` on top of the default parameters.
pub fn load(path: &Path) -> Result<FractalParameters, DocumentError> {
    let mut params = FractalParameters::default();
    load_into(path, &mut params)?;
    Ok(params)
}

/// Writes `params` to `path`, creating parent directories as needed.
pub fn save(path: &Path, params: &FractalParameters) -> Result<(), DocumentError> {
    let serialized = to_toml_string(params)?;
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| DocumentError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, serialized).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "saved fractal document");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_algorithm_falls_back_to_mandelbrot() {
        let mut params = FractalParameters {
            algorithm: FractalAlgorithm::Tricorn,
            ..FractalParameters::default()
        };
        let source = r#"
            [Mandelbrot.FractalParameters]
            Algorithm = "NotARealAlgorithm"
            MaxIterations = 77
        "#;
        apply_toml_str(source, &mut params).expect("document applies");
        assert_eq!(params.algorithm, FractalAlgorithm::Mandelbrot);
        assert_eq!(params.max_iterations, 77);
    }

    #[test]
    fn missing_keys_keep_previous_values() {
        let mut params = FractalParameters {
            zoom: 12.0,
            color_offset: 0.25,
            ..FractalParameters::default()
        };
        let source = r#"
            [Mandelbrot.ViewParameters]
            Rotation = 45.0
        "#;
        apply_toml_str(source, &mut params).expect("document applies");
        assert_eq!(params.rotation, 45.0);
        assert_eq!(params.zoom, 12.0);
        assert_eq!(params.color_offset, 0.25);
        assert_eq!(params.palette, Palette::default());
    }

    #[test]
    fn present_palette_replaces_colors() {
        let mut params = FractalParameters::default();
        let source = r#"
            [Mandelbrot.ColoringParameters.ColorPalette]
            Colors = [[1.0, 0.0, 0.0]]
        "#;
        apply_toml_str(source, &mut params).expect("document applies");
        assert_eq!(params.palette.colors, vec![[1.0, 0.0, 0.0]]);
    }

    #[test]
    fn invalid_values_fall_back_to_previous() {
        let mut params = FractalParameters::default();
        let source = r#"
            [Mandelbrot.FractalParameters]
            MaxIterations = -4
            [Mandelbrot.ViewParameters]
            Zoom = 0.0
        "#;
        apply_toml_str(source, &mut params).expect("document applies");
        assert_eq!(params.max_iterations, 256);
        assert_eq!(params.zoom, 1.0);
    }

    #[test]
    fn missing_root_is_an_error_and_leaves_params() {
        let mut params = FractalParameters {
            zoom: 3.0,
            ..FractalParameters::default()
        };
        let err = apply_toml_str("[Other]\nZoom = 9.0\n", &mut params).unwrap_err();
        assert!(matches!(err, DocumentError::MissingRoot));
        assert_eq!(params.zoom, 3.0);
    }

    #[test]
    fn syntax_errors_are_reported() {
        let mut params = FractalParameters::default();
        let err = apply_toml_str("[Mandelbrot\nZoom = ", &mut params).unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
        assert_eq!(params, FractalParameters::default());
    }

    #[test]
    fn serialized_document_uses_display_names() {
        let params = FractalParameters {
            algorithm: FractalAlgorithm::BurningShip,
            ..FractalParameters::default()
        };
        let text = to_toml_string(&params).expect("serializes");
        assert!(text.contains("Algorithm = \"Burning Ship\""));
        assert!(text.contains("InteriorColoring = \"Custom Color\""));
        assert!(text.contains("Type = \"None\""));
    }
}
