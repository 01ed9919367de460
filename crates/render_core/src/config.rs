//! Renderer and shader configuration
//!
//! TOML-backed configuration for window setup, validation, presentation
//! policy, and shader binary locations. Everything has a sensible default so
//! the demo runs without a config file.

use ash::vk;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A configured file does not exist on disk
    #[error("configured file not found: {path}")]
    MissingFile {
        /// The path that was checked
        path: String,
    },
}

/// Shader binary locations for the scaffold pipeline
///
/// Paths point at compiled SPIR-V files. Path resolution tries the common
/// output locations so the demo works whether it is run from the workspace
/// root or from a crate directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a shader configuration from explicit paths
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Create a shader config by probing the common SPIR-V output locations
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        let shader_dirs = ["target/shaders/", "shaders/", "./"];

        let resolve = |base: &str| {
            shader_dirs
                .iter()
                .map(|dir| format!("{}{}", dir, base))
                .find(|candidate| Path::new(candidate).exists())
                .unwrap_or_else(|| format!("target/shaders/{}", base))
        };

        Self {
            vertex_shader_path: resolve(base_vertex),
            fragment_shader_path: resolve(base_fragment),
        }
    }

    /// Whether both shader binaries exist on disk
    pub fn exists(&self) -> bool {
        Path::new(&self.vertex_shader_path).exists()
            && Path::new(&self.fragment_shader_path).exists()
    }

    /// Validate that both shader binaries exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        for path in [&self.vertex_shader_path, &self.fragment_shader_path] {
            if !Path::new(path).exists() {
                return Err(ConfigError::MissingFile { path: path.clone() });
            }
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution("triangle_vert.spv", "color_frag.spv")
    }
}

/// Renderer configuration
///
/// Loaded from TOML when a config file is present, otherwise defaulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name reported to the Vulkan instance
    pub application_name: String,
    /// Window title
    pub window_title: String,
    /// Window width in screen coordinates
    pub window_width: u32,
    /// Window height in screen coordinates
    pub window_height: u32,
    /// Whether to request the Khronos validation layer
    pub enable_validation: bool,
    /// Vertical sync: `true` selects FIFO presentation, `false` selects
    /// IMMEDIATE (tearing allowed)
    pub vsync: bool,
    /// Shader binary locations for the scaffold pipeline
    pub shaders: ShaderConfig,
}

impl RendererConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Load configuration from a TOML file, falling back to defaults when the
    /// file is absent or unreadable
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                log::info!("Loaded renderer config from {}", path.display());
                config
            }
            Err(err) => {
                log::debug!("Using default renderer config ({})", err);
                Self::default()
            }
        }
    }

    /// The present mode to negotiate for, derived from the vsync setting
    ///
    /// There is no fallback chain: if the surface does not offer this exact
    /// mode, swapchain creation fails.
    pub fn preferred_present_mode(&self) -> vk::PresentModeKHR {
        if self.vsync {
            vk::PresentModeKHR::FIFO
        } else {
            vk::PresentModeKHR::IMMEDIATE
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "render_core demo".to_string(),
            window_title: "Vulkan window".to_string(),
            window_width: 800,
            window_height: 600,
            enable_validation: cfg!(debug_assertions),
            vsync: true,
            shaders: ShaderConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RendererConfig::default();
        assert_eq!(config.window_width, 800);
        assert_eq!(config.window_height, 600);
        assert!(config.vsync);
    }

    #[test]
    fn test_present_mode_follows_vsync() {
        let mut config = RendererConfig::default();
        assert_eq!(config.preferred_present_mode(), vk::PresentModeKHR::FIFO);

        config.vsync = false;
        assert_eq!(
            config.preferred_present_mode(),
            vk::PresentModeKHR::IMMEDIATE
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RendererConfig =
            toml::from_str("window_title = \"demo\"\nvsync = false\n").unwrap();
        assert_eq!(config.window_title, "demo");
        assert!(!config.vsync);
        assert_eq!(config.window_width, 800);
        assert!(config.enable_validation == cfg!(debug_assertions));
    }

    #[test]
    fn test_shader_config_validation_reports_missing_path() {
        let shaders = ShaderConfig::new("does/not/exist.spv", "also/missing.spv");
        assert!(!shaders.exists());
        match shaders.validate() {
            Err(ConfigError::MissingFile { path }) => assert_eq!(path, "does/not/exist.spv"),
            other => panic!("expected MissingFile, got {:?}", other),
        }
    }
}
