//! Vulkan context: instance, surface, device selection, logical device
//!
//! Resources are acquired strictly in dependency order and each wrapper owns
//! exactly one native handle. Release order is the reverse of acquisition,
//! enforced by struct field order rather than by explicit shutdown calls, so
//! a failure partway through bring-up still unwinds cleanly.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk;
use ash::{Device, Entry, Instance};
use std::collections::HashSet;
use std::ffi::{c_char, CStr, CString};
use thiserror::Error;

use crate::config::RendererConfig;
use crate::vulkan::capability;
use crate::vulkan::debug::DebugMessenger;
use crate::window::{Window, WindowError};

/// The standard Khronos validation layer
pub const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Vulkan context errors
#[derive(Error, Debug)]
pub enum VulkanError {
    /// No Vulkan loader could be found on this host
    #[error("Vulkan loader unavailable: {0}")]
    LoaderUnavailable(String),

    /// A Vulkan API call failed
    #[error("Vulkan API error: {0}")]
    Api(vk::Result),

    /// A requested instance layer is not installed on this host
    #[error("required layer not available: {name}")]
    MissingLayer {
        /// The layer name that was requested
        name: String,
    },

    /// A requested extension is not available on this host
    #[error("required extension not available: {name}")]
    MissingExtension {
        /// The extension name that was requested
        name: String,
    },

    /// No physical device satisfies the device requirements
    #[error("no suitable physical device found")]
    NoSuitableDevice,

    /// The surface does not offer the requested pixel format
    #[error("surface format {format:?} not available")]
    FormatUnavailable {
        /// The format that was requested
        format: vk::Format,
    },

    /// The surface does not offer the requested present mode
    #[error("present mode {mode:?} not available")]
    PresentModeUnavailable {
        /// The mode that was requested
        mode: vk::PresentModeKHR,
    },

    /// The surface cannot operate with the fixed image count
    #[error("surface image count range [{min}, {max}] excludes the required count")]
    ImageCountUnsupported {
        /// Minimum image count the surface supports
        min: u32,
        /// Maximum image count the surface supports (0 means unbounded)
        max: u32,
    },

    /// A shader binary could not be read or decoded as SPIR-V
    #[error("shader {path}: {reason}")]
    InvalidShader {
        /// Where the shader came from
        path: String,
        /// What went wrong reading or decoding it
        reason: String,
    },

    /// A window-system operation failed
    #[error("window error: {0}")]
    Window(#[from] WindowError),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// The instance extensions required for this renderer
///
/// The debug-utils extension always comes first, followed by the window
/// system's extensions with duplicates removed. The returned list preserves
/// first-occurrence order.
pub fn required_instance_extensions(window_extensions: &[CString]) -> Vec<CString> {
    let mut names = vec![DebugUtils::name().to_owned()];
    let mut seen: HashSet<CString> = names.iter().cloned().collect();

    for ext in window_extensions {
        if seen.insert(ext.clone()) {
            names.push(ext.clone());
        }
    }
    names
}

/// Owned Vulkan instance with its optional diagnostics channel
///
/// Layer and extension preconditions are verified against the host inventory
/// before the instance is created, so a misconfigured host fails with a
/// named error instead of a generic driver code.
pub struct VulkanInstance {
    entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,
}

impl VulkanInstance {
    /// Create an instance configured from `config`, with the window system's
    /// extension requirements merged in
    pub fn new(config: &RendererConfig, window_extensions: &[String]) -> VulkanResult<Self> {
        let entry = unsafe {
            Entry::load().map_err(|e| VulkanError::LoaderUnavailable(e.to_string()))?
        };

        // CString::new only fails on interior NULs, which extension name
        // strings never contain.
        let window_extensions: Vec<CString> = window_extensions
            .iter()
            .filter_map(|s| CString::new(s.as_str()).ok())
            .collect();
        let mut extensions = required_instance_extensions(&window_extensions);

        let mut layers: Vec<CString> = Vec::new();
        if config.enable_validation {
            layers.push(CString::new(VALIDATION_LAYER).unwrap_or_default());
        }

        // Verify every requested layer exists before touching the driver.
        let available_layers = capability::instance_layer_names(&entry)?;
        if let Some(missing) = capability::missing_names(&layers, &available_layers).first() {
            return Err(VulkanError::MissingLayer {
                name: missing.to_string_lossy().into_owned(),
            });
        }

        // A missing debug-utils extension degrades the diagnostics channel;
        // any other missing extension is fatal.
        let available_extensions = capability::instance_extension_names(&entry)?;
        let missing = capability::missing_names(&extensions, &available_extensions);
        let mut debug_available = true;
        for name in &missing {
            if name.as_c_str() == DebugUtils::name() {
                log::warn!("Debug-utils extension not available; diagnostics channel disabled");
                debug_available = false;
            } else {
                return Err(VulkanError::MissingExtension {
                    name: name.to_string_lossy().into_owned(),
                });
            }
        }
        if !debug_available {
            extensions.retain(|name| name.as_c_str() != DebugUtils::name());
        }

        let app_name = CString::new(config.application_name.as_str()).unwrap_or_default();
        let engine_name = CString::new("render_core").unwrap_or_default();
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let layer_ptrs: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();
        let extension_ptrs: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(&layer_ptrs)
            .enabled_extension_names(&extension_ptrs);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        log::info!(
            "Vulkan instance created ({} layers, {} extensions)",
            layers.len(),
            extensions.len()
        );

        // From here on the instance is owned; a messenger failure must still
        // release it, so build Self before installing the channel.
        let mut this = Self {
            entry,
            instance,
            debug: None,
        };
        if debug_available {
            this.debug = Some(DebugMessenger::install(&this.entry, &this.instance)?);
        }
        Ok(this)
    }

    /// The loader entry point
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// The raw instance
    pub fn handle(&self) -> &Instance {
        &self.instance
    }

    /// Whether the diagnostics channel is active
    pub fn has_diagnostics(&self) -> bool {
        self.debug.is_some()
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        // The messenger is registered on the instance and must go first.
        drop(self.debug.take());
        unsafe {
            self.instance.destroy_instance(None);
        }
        log::debug!("Vulkan instance destroyed");
    }
}

/// A presentation surface together with the loader that manages it
pub struct SurfaceBinding {
    loader: Surface,
    surface: vk::SurfaceKHR,
}

impl SurfaceBinding {
    /// Bind a window-created surface to its instance
    pub fn new(instance: &VulkanInstance, surface: vk::SurfaceKHR) -> Self {
        let loader = Surface::new(instance.entry(), instance.handle());
        log::debug!("Surface bound");
        Self { loader, surface }
    }

    /// The surface loader
    pub fn loader(&self) -> &Surface {
        &self.loader
    }

    /// The raw surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }
}

impl Drop for SurfaceBinding {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
        log::debug!("Surface destroyed");
    }
}

/// Broad classification of a physical device for selection purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    /// A dedicated GPU
    Discrete,
    /// A GPU sharing memory with the CPU
    Integrated,
    /// Anything else (virtual, CPU, unknown); never selected
    Other,
}

impl From<vk::PhysicalDeviceType> for DeviceClass {
    fn from(ty: vk::PhysicalDeviceType) -> Self {
        match ty {
            vk::PhysicalDeviceType::DISCRETE_GPU => Self::Discrete,
            vk::PhysicalDeviceType::INTEGRATED_GPU => Self::Integrated,
            _ => Self::Other,
        }
    }
}

/// One enumerated physical device and the facts selection needs about it
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    /// The raw device handle
    pub device: vk::PhysicalDevice,
    /// Driver-reported device name
    pub name: String,
    /// Device classification
    pub class: DeviceClass,
    /// Whether every required device extension is present
    pub supports_required_extensions: bool,
    /// The first queue family usable for graphics and presentation, if any
    pub queue_family: Option<u32>,
}

impl DeviceCandidate {
    /// Whether this candidate can run the renderer at all
    pub fn qualifies(&self) -> bool {
        self.supports_required_extensions && self.queue_family.is_some()
    }
}

/// The first queue family that offers at least one queue, graphics support,
/// and presentation to the target surface
///
/// `present_support[i]` states whether family `i` can present.
pub fn find_queue_family(
    families: &[vk::QueueFamilyProperties],
    present_support: &[bool],
) -> Option<u32> {
    families
        .iter()
        .zip(present_support.iter())
        .position(|(family, present)| {
            family.queue_count > 0
                && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                && *present
        })
        .map(|index| index as u32)
}

/// Pick the device to use from the qualifying candidates
///
/// Discrete GPUs beat integrated GPUs; within a class, enumeration order
/// decides. Candidates classified as [`DeviceClass::Other`] are never
/// selected even when nothing else qualifies.
pub fn select_device(candidates: &[DeviceCandidate]) -> VulkanResult<&DeviceCandidate> {
    let first_of = |class: DeviceClass| {
        candidates
            .iter()
            .find(|c| c.class == class && c.qualifies())
    };

    first_of(DeviceClass::Discrete)
        .or_else(|| first_of(DeviceClass::Integrated))
        .ok_or(VulkanError::NoSuitableDevice)
}

/// The device extensions every candidate must offer
pub fn required_device_extensions() -> Vec<CString> {
    vec![SwapchainLoader::name().to_owned()]
}

fn evaluate_candidate(
    instance: &Instance,
    surface: &SurfaceBinding,
    device: vk::PhysicalDevice,
    required_extensions: &[CString],
) -> VulkanResult<DeviceCandidate> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();
    let class = DeviceClass::from(properties.device_type);

    let available = capability::device_extension_names(instance, device)?;
    let supports_required_extensions =
        capability::missing_names(required_extensions, &available).is_empty();

    let families = capability::queue_families(instance, device);
    let mut present_support = Vec::with_capacity(families.len());
    for index in 0..families.len() {
        let supported = unsafe {
            surface
                .loader()
                .get_physical_device_surface_support(device, index as u32, surface.handle())
                .map_err(VulkanError::Api)?
        };
        present_support.push(supported);
    }
    let queue_family = find_queue_family(&families, &present_support);

    log::debug!(
        "Device '{}' ({:?}): extensions ok = {}, queue family = {:?}",
        name,
        class,
        supports_required_extensions,
        queue_family
    );

    Ok(DeviceCandidate {
        device,
        name,
        class,
        supports_required_extensions,
        queue_family,
    })
}

/// Logical device with its single graphics/present queue
pub struct LogicalDevice {
    device: Device,
    graphics_queue: vk::Queue,
    queue_family: u32,
}

impl LogicalDevice {
    /// Create a logical device on `physical_device` with one queue from
    /// `queue_family`
    pub fn new(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        enable_validation: bool,
    ) -> VulkanResult<Self> {
        let priorities = [1.0_f32];
        let queue_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family)
            .queue_priorities(&priorities);
        let queue_infos = [queue_info.build()];

        let extensions = required_device_extensions();
        let extension_ptrs: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();

        // Device layers are ignored by modern drivers but older loaders
        // still read them, so mirror the instance layer set.
        let mut layers: Vec<CString> = Vec::new();
        if enable_validation {
            layers.push(CString::new(VALIDATION_LAYER).unwrap_or_default());
        }
        let layer_ptrs: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

        let features = vk::PhysicalDeviceFeatures::default();
        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .create_device(physical_device, &create_info, None)
                .map_err(VulkanError::Api)?
        };
        let graphics_queue = unsafe { device.get_device_queue(queue_family, 0) };
        log::info!("Logical device created (queue family {})", queue_family);

        Ok(Self {
            device,
            graphics_queue,
            queue_family,
        })
    }

    /// The raw device
    pub fn handle(&self) -> &Device {
        &self.device
    }

    /// The graphics/present queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// The queue family the graphics queue came from
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Block until the device is idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle().map_err(VulkanError::Api) }
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            // In-flight work must finish before destruction.
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
        log::debug!("Logical device destroyed");
    }
}

/// The assembled Vulkan context
///
/// Field order is teardown order: the logical device goes first, then the
/// surface, then the instance (which takes the diagnostics channel with it).
pub struct VulkanContext {
    device: LogicalDevice,
    surface: SurfaceBinding,
    instance: VulkanInstance,
    physical_device: vk::PhysicalDevice,
    device_name: String,
}

impl VulkanContext {
    /// Bring up the full context against a window
    pub fn new(window: &mut Window, config: &RendererConfig) -> VulkanResult<Self> {
        let window_extensions = window.required_instance_extensions()?;
        let instance = VulkanInstance::new(config, &window_extensions)?;

        let raw_surface = window.create_vulkan_surface(instance.handle().handle())?;
        let surface = SurfaceBinding::new(&instance, raw_surface);

        let required_extensions = required_device_extensions();
        let devices = capability::physical_devices(instance.handle())?;
        let mut candidates = Vec::with_capacity(devices.len());
        for device in devices {
            candidates.push(evaluate_candidate(
                instance.handle(),
                &surface,
                device,
                &required_extensions,
            )?);
        }

        let selected = select_device(&candidates)?;
        log::info!("Selected device '{}' ({:?})", selected.name, selected.class);
        let physical_device = selected.device;
        let device_name = selected.name.clone();
        // qualifies() guarantees a queue family on the selected candidate.
        let queue_family = selected.queue_family.ok_or(VulkanError::NoSuitableDevice)?;

        let device = LogicalDevice::new(
            instance.handle(),
            physical_device,
            queue_family,
            config.enable_validation,
        )?;

        Ok(Self {
            device,
            surface,
            instance,
            physical_device,
            device_name,
        })
    }

    /// The instance wrapper
    pub fn instance(&self) -> &VulkanInstance {
        &self.instance
    }

    /// The logical device wrapper
    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    /// The selected physical device
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Driver-reported name of the selected device
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// The surface binding
    pub fn surface(&self) -> &SurfaceBinding {
        &self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cstrings(raw: &[&str]) -> Vec<CString> {
        raw.iter().map(|s| CString::new(*s).unwrap()).collect()
    }

    #[test]
    fn test_required_extensions_put_debug_utils_first() {
        let window = cstrings(&["VK_KHR_surface", "VK_KHR_xcb_surface"]);
        let merged = required_instance_extensions(&window);
        assert_eq!(merged[0].as_c_str(), DebugUtils::name());
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_required_extensions_deduplicate() {
        let debug_name = DebugUtils::name().to_owned();
        let window = vec![
            CString::new("VK_KHR_surface").unwrap(),
            debug_name.clone(),
            CString::new("VK_KHR_surface").unwrap(),
        ];
        let merged = required_instance_extensions(&window);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], debug_name);
        assert_eq!(merged[1].as_c_str(), CString::new("VK_KHR_surface").unwrap().as_c_str());
    }

    #[test]
    fn test_required_extensions_with_empty_window_list() {
        let merged = required_instance_extensions(&[]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].as_c_str(), DebugUtils::name());
    }

    fn family(count: u32, flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_count: count,
            queue_flags: flags,
            ..Default::default()
        }
    }

    #[test]
    fn test_find_queue_family_picks_lowest_qualifying_index() {
        let families = [
            family(1, vk::QueueFlags::TRANSFER),
            family(1, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(1, vk::QueueFlags::GRAPHICS),
        ];
        let present = [true, true, true];
        assert_eq!(find_queue_family(&families, &present), Some(1));
    }

    #[test]
    fn test_find_queue_family_requires_present_support() {
        let families = [
            family(1, vk::QueueFlags::GRAPHICS),
            family(1, vk::QueueFlags::GRAPHICS),
        ];
        let present = [false, true];
        assert_eq!(find_queue_family(&families, &present), Some(1));
    }

    #[test]
    fn test_find_queue_family_rejects_empty_families() {
        let families = [family(0, vk::QueueFlags::GRAPHICS)];
        let present = [true];
        assert_eq!(find_queue_family(&families, &present), None);
    }

    fn candidate(name: &str, class: DeviceClass, qualifies: bool) -> DeviceCandidate {
        DeviceCandidate {
            device: vk::PhysicalDevice::null(),
            name: name.to_string(),
            class,
            supports_required_extensions: qualifies,
            queue_family: qualifies.then_some(0),
        }
    }

    #[test]
    fn test_select_device_prefers_discrete() {
        let candidates = [
            candidate("igpu", DeviceClass::Integrated, true),
            candidate("dgpu", DeviceClass::Discrete, true),
        ];
        assert_eq!(select_device(&candidates).unwrap().name, "dgpu");
    }

    #[test]
    fn test_select_device_first_wins_within_class() {
        let candidates = [
            candidate("dgpu-a", DeviceClass::Discrete, true),
            candidate("dgpu-b", DeviceClass::Discrete, true),
        ];
        assert_eq!(select_device(&candidates).unwrap().name, "dgpu-a");
    }

    #[test]
    fn test_select_device_falls_back_to_integrated() {
        let candidates = [
            candidate("dgpu", DeviceClass::Discrete, false),
            candidate("igpu", DeviceClass::Integrated, true),
        ];
        assert_eq!(select_device(&candidates).unwrap().name, "igpu");
    }

    #[test]
    fn test_select_device_never_picks_other() {
        let candidates = [candidate("llvmpipe", DeviceClass::Other, true)];
        assert!(matches!(
            select_device(&candidates),
            Err(VulkanError::NoSuitableDevice)
        ));
    }

    #[test]
    fn test_select_device_fails_when_nothing_qualifies() {
        let candidates = [
            candidate("dgpu", DeviceClass::Discrete, false),
            candidate("igpu", DeviceClass::Integrated, false),
        ];
        assert!(matches!(
            select_device(&candidates),
            Err(VulkanError::NoSuitableDevice)
        ));
    }

    #[test]
    fn test_device_class_from_physical_device_type() {
        assert_eq!(
            DeviceClass::from(vk::PhysicalDeviceType::DISCRETE_GPU),
            DeviceClass::Discrete
        );
        assert_eq!(
            DeviceClass::from(vk::PhysicalDeviceType::INTEGRATED_GPU),
            DeviceClass::Integrated
        );
        assert_eq!(
            DeviceClass::from(vk::PhysicalDeviceType::CPU),
            DeviceClass::Other
        );
        assert_eq!(
            DeviceClass::from(vk::PhysicalDeviceType::VIRTUAL_GPU),
            DeviceClass::Other
        );
    }
}
