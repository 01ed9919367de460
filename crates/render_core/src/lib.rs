//! # render_core
//!
//! Vulkan rendering-context bring-up and teardown over a GLFW window.
//!
//! The crate owns the ordered acquisition of driver resources (instance,
//! diagnostics channel, surface, physical/logical device, swapchain, image
//! views, render targets, pipeline) and releases them in exact reverse order.
//! The frame loop itself is the caller's business; this crate hands out the
//! handles it needs and nothing more.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_core::{prepare_environment, RendererConfig, VulkanRenderer, Window};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     prepare_environment();
//!     let config = RendererConfig::default();
//!     let mut window = Window::new(&config.window_title, config.window_width, config.window_height)?;
//!     let renderer = VulkanRenderer::new(&mut window, &config)?;
//!     while !window.should_close() {
//!         window.poll_events();
//!     }
//!     renderer.shutdown()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod vulkan;
pub mod window;

pub use config::{ConfigError, RendererConfig, ShaderConfig};
pub use vulkan::{
    context::{DeviceCandidate, DeviceClass, VulkanContext, VulkanError, VulkanResult},
    renderer::{prepare_environment, VulkanRenderer},
    swapchain::Swapchain,
};
pub use window::{Window, WindowError};
