//! SPIR-V shader modules and the scaffold graphics pipeline
//!
//! The pipeline is fixed-function scaffolding for a hardcoded triangle: no
//! vertex input, no depth testing, no blending, and an empty layout. It
//! exists to prove the bring-up path end to end.

use ash::vk;
use ash::Device;
use std::ffi::CStr;
use std::io::Cursor;
use std::path::Path;

use crate::vulkan::context::{VulkanError, VulkanResult};
use crate::vulkan::render_pass::RenderPass;

/// Decode SPIR-V bytes into words, copying into aligned storage
///
/// Validates word alignment and the SPIR-V magic number; does not assume the
/// input buffer itself is 4-byte aligned.
fn decode_spirv(bytes: &[u8]) -> std::io::Result<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(bytes))
}

/// Compiled SPIR-V shader module
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    fn create(device: &Device, words: &[u32]) -> VulkanResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);
        let module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device: device.clone(),
            module,
        })
    }

    /// Create a shader module from SPIR-V bytes
    pub fn from_bytes(device: &Device, bytes: &[u8]) -> VulkanResult<Self> {
        let words = decode_spirv(bytes).map_err(|e| VulkanError::InvalidShader {
            path: String::from("<embedded>"),
            reason: e.to_string(),
        })?;
        Self::create(device, &words)
    }

    /// Load a SPIR-V file and create a shader module from it
    pub fn from_file(device: &Device, path: impl AsRef<Path>) -> VulkanResult<Self> {
        let path = path.as_ref();
        let invalid = |reason: String| VulkanError::InvalidShader {
            path: path.display().to_string(),
            reason,
        };
        let bytes = std::fs::read(path).map_err(|e| invalid(e.to_string()))?;
        log::debug!("Loaded shader {} ({} bytes)", path.display(), bytes.len());
        let words = decode_spirv(&bytes).map_err(|e| invalid(e.to_string()))?;
        Self::create(device, &words)
    }

    /// The raw module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Graphics pipeline for the hardcoded triangle
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Build the scaffold pipeline against a render pass
    pub fn new(
        device: &Device,
        render_pass: &RenderPass,
        extent: vk::Extent2D,
        vertex_shader: &ShaderModule,
        fragment_shader: &ShaderModule,
    ) -> VulkanResult<Self> {
        // No interior NUL, so this cannot fail.
        let entry_point = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

        let stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_shader.handle())
                .name(entry_point)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_shader.handle())
                .name(entry_point)
                .build(),
        ];

        // Vertices live in the vertex shader; nothing comes from buffers.
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder();

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let viewports = [viewport];
        let scissors = [scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false);

        let blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build();
        let blend_attachments = [blend_attachment];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        // No descriptor sets, no push constants.
        let layout_info = vk::PipelineLayoutCreateInfo::builder();
        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .layout(layout)
            .render_pass(render_pass.handle())
            .subpass(0)
            .build();

        let pipeline = unsafe {
            match device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
            {
                Ok(pipelines) => pipelines[0],
                Err((_, err)) => {
                    device.destroy_pipeline_layout(layout, None);
                    return Err(VulkanError::Api(err));
                }
            }
        };
        log::debug!("Graphics pipeline created");

        Ok(Self {
            device: device.clone(),
            pipeline,
            layout,
        })
    }

    /// The raw pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// The pipeline layout
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
        log::debug!("Graphics pipeline destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // SPIR-V magic number, little-endian on disk.
    const MAGIC: [u8; 4] = [0x03, 0x02, 0x23, 0x07];

    #[test]
    fn test_spirv_decoding_accepts_unaligned_buffers() {
        // Slice at an odd offset so the buffer start is misaligned; decoding
        // copies into aligned storage and must still succeed.
        let mut padded = vec![0u8; 1];
        padded.extend_from_slice(&MAGIC);
        padded.extend_from_slice(&[0x00, 0x01, 0x00, 0x00]);
        let words = decode_spirv(&padded[1..]).unwrap();
        assert_eq!(words[0], 0x0723_0203);
        assert_eq!(words.len(), 2);
    }

    #[test]
    fn test_spirv_decoding_rejects_partial_words() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[0x00, 0x01, 0x00]);
        assert!(decode_spirv(&bytes).is_err());
    }

    #[test]
    fn test_spirv_decoding_rejects_wrong_magic() {
        let bytes = [0xde, 0xad, 0xbe, 0xef, 0x00, 0x00, 0x00, 0x00];
        assert!(decode_spirv(&bytes).is_err());
    }
}
