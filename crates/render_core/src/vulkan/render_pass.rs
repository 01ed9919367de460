//! Render pass keyed on the swapchain format
//!
//! Single color attachment, cleared on load and stored for presentation.
//! There is no depth attachment; the scaffold pipeline does not use one.

use ash::vk;
use ash::Device;

use crate::vulkan::context::{VulkanError, VulkanResult};

/// Color-only render pass targeting swapchain images
pub struct RenderPass {
    device: Device,
    render_pass: vk::RenderPass,
}

impl RenderPass {
    /// Create a render pass whose color attachment matches `format`
    pub fn new(device: &Device, format: vk::Format) -> VulkanResult<Self> {
        let color_attachment = vk::AttachmentDescription::builder()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();

        let color_ref = vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();
        let color_refs = [color_ref];

        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .build();

        let attachments = [color_attachment];
        let subpasses = [subpass];
        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses);

        let render_pass = unsafe {
            device
                .create_render_pass(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        log::debug!("Render pass created for {:?}", format);

        Ok(Self {
            device: device.clone(),
            render_pass,
        })
    }

    /// The raw render pass handle
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
        log::debug!("Render pass destroyed");
    }
}
