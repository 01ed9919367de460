//! Window management using GLFW
//!
//! Thin wrapper over GLFW that produces everything the Vulkan layer needs
//! from the window system: the required instance extensions, a presentation
//! surface bound to an instance, and the framebuffer size.

use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW itself failed to initialize
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The GLFW loader found no usable Vulkan implementation
    #[error("Vulkan is not supported by this GLFW installation")]
    VulkanUnsupported,

    /// The OS refused to create the window
    #[error("Window creation failed")]
    CreationFailed,

    /// Any other GLFW-reported failure
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window wrapper with proper resource management
///
/// The window must outlive every Vulkan resource derived from it; in
/// particular the surface bound through [`Window::create_vulkan_surface`]
/// becomes invalid the moment the window is destroyed.
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    /// Create a window configured for Vulkan rendering (no client API)
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw =
            glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        if !glfw.vulkan_supported() {
            return Err(WindowError::VulkanUnsupported);
        }

        // No OpenGL context; the swapchain owns presentation. Resizing is not
        // modeled by the renderer, so the window stays fixed-size.
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(false));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);

        Ok(Self {
            glfw,
            window,
            events,
        })
    }

    /// Instance extensions the window system needs for presentation, in the
    /// order GLFW reports them
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw.get_required_instance_extensions().ok_or_else(|| {
            WindowError::GlfwError("Failed to get required instance extensions".to_string())
        })
    }

    /// Create a Vulkan surface bound to this window using GLFW's built-in
    /// surface support
    pub fn create_vulkan_surface(
        &mut self,
        instance: ash::vk::Instance,
    ) -> WindowResult<ash::vk::SurfaceKHR> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!(
                "Failed to create Vulkan surface: {:?}",
                result
            )))
        }
    }

    /// Current window size in screen coordinates
    pub fn size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_size();
        (width as u32, height as u32)
    }

    /// Current framebuffer size in pixels (what the swapchain cares about)
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width as u32, height as u32)
    }

    /// Whether the user asked the window to close
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request the window to close on the next loop iteration
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Pump the OS event queue
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
    }

    /// Drain buffered window events
    pub fn flush_events(&self) -> Vec<glfw::WindowEvent> {
        glfw::flush_messages(&self.events)
            .map(|(_, event)| event)
            .collect()
    }
}
