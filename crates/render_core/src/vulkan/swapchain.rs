//! Swapchain negotiation and creation
//!
//! Negotiation is deliberately strict: the requested format, present mode,
//! and image count must be available exactly, or creation fails with a named
//! error. There are no silent fallbacks that would mask a host mismatch.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;
use ash::Device;

use crate::vulkan::capability;
use crate::vulkan::context::{VulkanContext, VulkanError, VulkanResult};

/// The pixel format the renderer asks for
pub const PREFERRED_FORMAT: vk::Format = vk::Format::B8G8R8A8_UNORM;

/// The fixed number of swapchain images (double buffering)
pub const TARGET_IMAGE_COUNT: u32 = 2;

/// Resolve the swapchain extent against surface capabilities
///
/// When the surface reports a defined current extent it is used verbatim and
/// the window size is ignored. Only the sentinel value (`u32::MAX` width)
/// hands control to the window size, clamped per axis to the supported range.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_size: (u32, u32),
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: window_size.0.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: window_size.1.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Validate the fixed image count against surface limits
///
/// A max of 0 means unbounded. If the surface cannot do exactly
/// [`TARGET_IMAGE_COUNT`] images, creation fails rather than adapting.
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> VulkanResult<u32> {
    let min = capabilities.min_image_count;
    let max = capabilities.max_image_count;
    if min > TARGET_IMAGE_COUNT || (max != 0 && max < TARGET_IMAGE_COUNT) {
        return Err(VulkanError::ImageCountUnsupported { min, max });
    }
    Ok(TARGET_IMAGE_COUNT)
}

/// Find the first surface format matching the preferred pixel format
///
/// The color space is taken as the surface reports it; only the format field
/// is matched. No fallback format is substituted.
pub fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
    preferred: vk::Format,
) -> VulkanResult<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|f| f.format == preferred)
        .copied()
        .ok_or(VulkanError::FormatUnavailable { format: preferred })
}

/// Require the exact preferred present mode
pub fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> VulkanResult<vk::PresentModeKHR> {
    available
        .iter()
        .find(|m| **m == preferred)
        .copied()
        .ok_or(VulkanError::PresentModeUnavailable { mode: preferred })
}

/// Swapchain with its images and views
///
/// Views are destroyed before the chain; the chain before the device. The
/// device handle is cloned here only to destroy the views, so this struct
/// must not outlive the [`VulkanContext`] it came from.
pub struct Swapchain {
    device: Device,
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Negotiate and create a swapchain for the context's surface
    pub fn new(
        context: &VulkanContext,
        window_size: (u32, u32),
        preferred_present_mode: vk::PresentModeKHR,
    ) -> VulkanResult<Self> {
        let surface = context.surface();
        let physical = context.physical_device();

        let capabilities =
            capability::surface_capabilities(surface.loader(), physical, surface.handle())?;
        let formats = capability::surface_formats(surface.loader(), physical, surface.handle())?;
        let modes = capability::present_modes(surface.loader(), physical, surface.handle())?;

        let extent = choose_extent(&capabilities, window_size);
        let image_count = choose_image_count(&capabilities)?;
        let format = choose_surface_format(&formats, PREFERRED_FORMAT)?;
        let present_mode = choose_present_mode(&modes, preferred_present_mode)?;

        log::info!(
            "Swapchain: {}x{}, {:?}/{:?}, {:?}, {} images",
            extent.width,
            extent.height,
            format.format,
            format.color_space,
            present_mode,
            image_count
        );

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            // One queue family drives both graphics and presentation.
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let loader = SwapchainLoader::new(context.instance().handle(), context.device().handle());
        let swapchain = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        let images = unsafe {
            loader
                .get_swapchain_images(swapchain)
                .map_err(VulkanError::Api)?
        };

        // Build Self before creating views so a view failure unwinds through
        // Drop and still releases the chain.
        let mut this = Self {
            device: context.device().handle().clone(),
            loader,
            swapchain,
            images,
            image_views: Vec::new(),
            format,
            extent,
            present_mode,
        };

        for image in &this.images {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(*image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(this.format.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe {
                this.device
                    .create_image_view(&view_info, None)
                    .map_err(VulkanError::Api)?
            };
            this.image_views.push(view);
        }

        Ok(this)
    }

    /// The negotiated surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// The negotiated extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// The negotiated present mode
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// The swapchain images
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// One view per swapchain image, in image order
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// The raw swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for view in self.image_views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
        log::debug!("Swapchain destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(
        current: (u32, u32),
        min_extent: (u32, u32),
        max_extent: (u32, u32),
        min_images: u32,
        max_images: u32,
    ) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min_extent.0,
                height: min_extent.1,
            },
            max_image_extent: vk::Extent2D {
                width: max_extent.0,
                height: max_extent.1,
            },
            min_image_count: min_images,
            max_image_count: max_images,
            ..Default::default()
        }
    }

    #[test]
    fn test_defined_current_extent_wins_over_window_size() {
        let caps = capabilities((800, 600), (1, 1), (4096, 4096), 2, 4);
        let extent = choose_extent(&caps, (1024, 768));
        assert_eq!(extent.width, 800);
        assert_eq!(extent.height, 600);
    }

    #[test]
    fn test_undefined_extent_clamps_window_size() {
        let caps = capabilities((u32::MAX, u32::MAX), (640, 480), (1280, 720), 2, 4);
        let extent = choose_extent(&caps, (1920, 1080));
        assert_eq!(extent.width, 1280);
        assert_eq!(extent.height, 720);

        let extent = choose_extent(&caps, (320, 200));
        assert_eq!(extent.width, 640);
        assert_eq!(extent.height, 480);
    }

    #[test]
    fn test_image_count_fixed_at_two() {
        let caps = capabilities((800, 600), (1, 1), (4096, 4096), 2, 4);
        assert_eq!(choose_image_count(&caps).unwrap(), 2);

        // max of 0 means unbounded
        let caps = capabilities((800, 600), (1, 1), (4096, 4096), 1, 0);
        assert_eq!(choose_image_count(&caps).unwrap(), 2);

        let caps = capabilities((800, 600), (1, 1), (4096, 4096), 2, 2);
        assert_eq!(choose_image_count(&caps).unwrap(), 2);
    }

    #[test]
    fn test_image_count_rejects_out_of_range_surfaces() {
        let caps = capabilities((800, 600), (1, 1), (4096, 4096), 3, 8);
        assert!(matches!(
            choose_image_count(&caps),
            Err(VulkanError::ImageCountUnsupported { min: 3, max: 8 })
        ));

        let caps = capabilities((800, 600), (1, 1), (4096, 4096), 1, 1);
        assert!(matches!(
            choose_image_count(&caps),
            Err(VulkanError::ImageCountUnsupported { min: 1, max: 1 })
        ));
    }

    fn surface_format(format: vk::Format, space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: space,
        }
    }

    #[test]
    fn test_format_matches_first_occurrence() {
        let available = [
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
        ];
        let chosen = choose_surface_format(&available, vk::Format::B8G8R8A8_UNORM).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn test_format_has_no_fallback() {
        let available = [surface_format(
            vk::Format::R8G8B8A8_UNORM,
            vk::ColorSpaceKHR::SRGB_NONLINEAR,
        )];
        assert!(matches!(
            choose_surface_format(&available, vk::Format::B8G8R8A8_UNORM),
            Err(VulkanError::FormatUnavailable {
                format: vk::Format::B8G8R8A8_UNORM
            })
        ));
    }

    #[test]
    fn test_present_mode_exact_match_only() {
        let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&available, vk::PresentModeKHR::FIFO).unwrap(),
            vk::PresentModeKHR::FIFO
        );
        // MAILBOX is not substituted for IMMEDIATE.
        assert!(matches!(
            choose_present_mode(&available, vk::PresentModeKHR::IMMEDIATE),
            Err(VulkanError::PresentModeUnavailable {
                mode: vk::PresentModeKHR::IMMEDIATE
            })
        ));
    }
}
