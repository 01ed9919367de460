//! Triangle demo application
//!
//! Brings up the full Vulkan context over a GLFW window, builds the scaffold
//! triangle pipeline when compiled shaders are present, and tears everything
//! down in reverse order on exit.

use glfw::{Action, Key, WindowEvent};
use render_core::{prepare_environment, RendererConfig, VulkanRenderer, Window};

fn run() -> Result<(), Box<dyn std::error::Error>> {
    prepare_environment();

    let config = RendererConfig::load_or_default("triangle_app.toml");
    log::info!("Starting triangle demo ({})", config.application_name);

    let mut window = Window::new(
        &config.window_title,
        config.window_width,
        config.window_height,
    )?;

    let mut renderer = VulkanRenderer::new(&mut window, &config)?;

    if config.shaders.exists() {
        renderer.setup_scene(&config.shaders)?;
    } else {
        log::warn!(
            "Compiled shaders not found ({}, {}); running context-only",
            config.shaders.vertex_shader_path,
            config.shaders.fragment_shader_path
        );
    }

    while !window.should_close() {
        window.poll_events();
        for event in window.flush_events() {
            if let WindowEvent::Key(Key::Escape, _, Action::Press, _) = event {
                window.set_should_close(true);
            }
        }
    }

    renderer.shutdown()?;
    Ok(())
}

fn main() {
    render_core::foundation::logging::init_with_default("info");

    if let Err(err) = run() {
        log::error!("Fatal: {}", err);
        std::process::exit(1);
    }
}
