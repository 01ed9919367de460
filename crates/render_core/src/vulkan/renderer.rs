//! Lifecycle coordination: startup and reverse-order shutdown
//!
//! [`VulkanRenderer`] owns the whole resource chain. Field declaration order
//! doubles as teardown order, so even an early drop (for example after an
//! error in the caller) releases everything in the reverse of acquisition.

use ash::vk;

use crate::config::{RendererConfig, ShaderConfig};
use crate::vulkan::context::{VulkanContext, VulkanResult};
use crate::vulkan::render_pass::RenderPass;
use crate::vulkan::shader::{GraphicsPipeline, ShaderModule};
use crate::vulkan::swapchain::Swapchain;
use crate::window::Window;

/// Apply compile-time loader overrides to the process environment
///
/// `VK_ICD_FILENAMES` and `VK_LAYER_PATH` can be baked in at build time for
/// hosts where the loader cannot find drivers on its own. Variables already
/// set at runtime are left alone.
pub fn prepare_environment() {
    if let Some(icd) = option_env!("VK_ICD_FILENAMES") {
        if std::env::var_os("VK_ICD_FILENAMES").is_none() {
            std::env::set_var("VK_ICD_FILENAMES", icd);
            log::info!("VK_ICD_FILENAMES set to {}", icd);
        }
    }
    if let Some(layers) = option_env!("VK_LAYER_PATH") {
        if std::env::var_os("VK_LAYER_PATH").is_none() {
            std::env::set_var("VK_LAYER_PATH", layers);
            log::info!("VK_LAYER_PATH set to {}", layers);
        }
    }
}

/// The optional scene-level resources layered on top of the swapchain
///
/// Field order is teardown order: pipeline (and its layout) first, then the
/// render pass, then the shader modules.
pub struct ScenePipeline {
    pipeline: GraphicsPipeline,
    render_pass: RenderPass,
    #[allow(dead_code)]
    vertex_shader: ShaderModule,
    #[allow(dead_code)]
    fragment_shader: ShaderModule,
}

impl ScenePipeline {
    /// The graphics pipeline
    pub fn pipeline(&self) -> &GraphicsPipeline {
        &self.pipeline
    }

    /// The render pass
    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }
}

/// Top-level renderer owning the full Vulkan resource chain
///
/// Field order is teardown order: scene resources, then the swapchain, then
/// the context (device, surface, instance, diagnostics).
pub struct VulkanRenderer {
    scene: Option<ScenePipeline>,
    swapchain: Swapchain,
    context: VulkanContext,
}

impl VulkanRenderer {
    /// Bring up the context and swapchain against a window
    pub fn new(window: &mut Window, config: &RendererConfig) -> VulkanResult<Self> {
        let context = VulkanContext::new(window, config)?;
        let swapchain = Swapchain::new(
            &context,
            window.framebuffer_size(),
            config.preferred_present_mode(),
        )?;

        log::info!(
            "Renderer ready on '{}' ({}x{})",
            context.device_name(),
            swapchain.extent().width,
            swapchain.extent().height
        );

        Ok(Self {
            scene: None,
            swapchain,
            context,
        })
    }

    /// Load shaders and build the scaffold pipeline
    ///
    /// Replaces any previously built scene; the old one is released first.
    pub fn setup_scene(&mut self, shaders: &ShaderConfig) -> VulkanResult<()> {
        // Release the previous scene before creating the next one.
        self.scene = None;

        let device = self.context.device().handle();
        let vertex_shader = ShaderModule::from_file(device, &shaders.vertex_shader_path)?;
        let fragment_shader = ShaderModule::from_file(device, &shaders.fragment_shader_path)?;
        let render_pass = RenderPass::new(device, self.swapchain.format().format)?;
        let pipeline = GraphicsPipeline::new(
            device,
            &render_pass,
            self.swapchain.extent(),
            &vertex_shader,
            &fragment_shader,
        )?;

        self.scene = Some(ScenePipeline {
            pipeline,
            render_pass,
            vertex_shader,
            fragment_shader,
        });
        log::info!("Scene pipeline ready");
        Ok(())
    }

    /// Release scene resources, keeping the swapchain and context alive
    pub fn teardown_scene(&mut self) {
        if self.scene.take().is_some() {
            log::info!("Scene pipeline released");
        }
    }

    /// The Vulkan context
    pub fn context(&self) -> &VulkanContext {
        &self.context
    }

    /// The swapchain
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// The scene pipeline, if one has been built
    pub fn scene(&self) -> Option<&ScenePipeline> {
        self.scene.as_ref()
    }

    /// The negotiated swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Tear everything down in reverse acquisition order
    ///
    /// Dropping the renderer does the same thing; this method exists to make
    /// shutdown explicit and observable in logs, and to wait for the device
    /// before releasing anything.
    pub fn shutdown(self) -> VulkanResult<()> {
        // Capture the wait result but release unconditionally: an early
        // return after destructuring would drop the locals in reverse
        // declaration order, destroying the device before its dependents.
        let wait_result = self.context.device().wait_idle();

        let Self {
            scene,
            swapchain,
            context,
        } = self;

        drop(scene);
        log::debug!("Scene released");
        drop(swapchain);
        log::debug!("Swapchain released");
        drop(context);
        log::info!("Renderer shut down");
        wait_result
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    // Guards that record their drop order let us verify the teardown
    // sequence the struct layouts encode, without a live driver.
    struct Guard {
        label: &'static str,
        order: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Drop for Guard {
        fn drop(&mut self) {
            self.order.borrow_mut().push(self.label);
        }
    }

    fn guard(label: &'static str, order: &Rc<RefCell<Vec<&'static str>>>) -> Guard {
        Guard {
            label,
            order: Rc::clone(order),
        }
    }

    // Mirrors VulkanRenderer's field layout.
    struct RendererLayout {
        scene: Option<SceneLayout>,
        swapchain: Guard,
        context: Guard,
    }

    // Mirrors ScenePipeline's field layout.
    struct SceneLayout {
        pipeline: Guard,
        render_pass: Guard,
        vertex_shader: Guard,
        fragment_shader: Guard,
    }

    #[test]
    fn test_renderer_layout_drops_in_reverse_acquisition_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let renderer = RendererLayout {
            scene: Some(SceneLayout {
                pipeline: guard("pipeline", &order),
                render_pass: guard("render_pass", &order),
                vertex_shader: guard("vertex_shader", &order),
                fragment_shader: guard("fragment_shader", &order),
            }),
            swapchain: guard("swapchain", &order),
            context: guard("context", &order),
        };
        drop(renderer);

        assert_eq!(
            *order.borrow(),
            vec![
                "pipeline",
                "render_pass",
                "vertex_shader",
                "fragment_shader",
                "swapchain",
                "context",
            ]
        );
    }

    // Mirrors VulkanRenderer::shutdown: the wait outcome is captured first,
    // the ordered drops always run, and the outcome is returned last.
    fn shutdown_layout(renderer: RendererLayout, wait_result: Result<(), ()>) -> Result<(), ()> {
        let RendererLayout {
            scene,
            swapchain,
            context,
        } = renderer;
        drop(scene);
        drop(swapchain);
        drop(context);
        wait_result
    }

    #[test]
    fn test_shutdown_failure_still_releases_in_reverse_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let renderer = RendererLayout {
            scene: Some(SceneLayout {
                pipeline: guard("pipeline", &order),
                render_pass: guard("render_pass", &order),
                vertex_shader: guard("vertex_shader", &order),
                fragment_shader: guard("fragment_shader", &order),
            }),
            swapchain: guard("swapchain", &order),
            context: guard("context", &order),
        };

        // A failed device wait must not reorder the release sequence.
        assert!(shutdown_layout(renderer, Err(())).is_err());
        assert_eq!(
            *order.borrow(),
            vec![
                "pipeline",
                "render_pass",
                "vertex_shader",
                "fragment_shader",
                "swapchain",
                "context",
            ]
        );
    }

    #[test]
    fn test_scene_teardown_leaves_swapchain_and_context_alive() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut renderer = RendererLayout {
            scene: Some(SceneLayout {
                pipeline: guard("pipeline", &order),
                render_pass: guard("render_pass", &order),
                vertex_shader: guard("vertex_shader", &order),
                fragment_shader: guard("fragment_shader", &order),
            }),
            swapchain: guard("swapchain", &order),
            context: guard("context", &order),
        };

        renderer.scene = None;
        assert_eq!(
            *order.borrow(),
            vec!["pipeline", "render_pass", "vertex_shader", "fragment_shader"]
        );

        drop(renderer);
        assert_eq!(order.borrow().len(), 6);
        assert_eq!(order.borrow()[4], "swapchain");
        assert_eq!(order.borrow()[5], "context");
    }
}
