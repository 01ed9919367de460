//! Vulkan rendering backend
//!
//! Low-level bring-up of the Vulkan resource chain. Each wrapper owns exactly
//! one driver resource and releases it on drop, so teardown order is fixed by
//! structure rather than by call discipline.

/// Read-only queries against the host's Vulkan capabilities
pub mod capability;
/// Context builder: instance, surface, device selection, logical device
pub mod context;
/// Validation-layer diagnostics channel
pub mod debug;
/// Render pass keyed on the swapchain format
pub mod render_pass;
/// Lifecycle coordination: startup and reverse-order shutdown
pub mod renderer;
/// SPIR-V shader modules and the scaffold graphics pipeline
pub mod shader;
/// Swapchain negotiation and creation
pub mod swapchain;

pub use context::{DeviceCandidate, DeviceClass, VulkanContext, VulkanError, VulkanResult};
pub use debug::{Category, DiagnosticsSink, Severity};
pub use render_pass::RenderPass;
pub use renderer::VulkanRenderer;
pub use shader::{GraphicsPipeline, ShaderModule};
pub use swapchain::Swapchain;
