//! Read-only queries against the host's Vulkan capabilities
//!
//! Every function here is a pure request-response against the driver: no
//! side effects, no ownership transfer, callable repeatedly. Callers decide
//! whether an empty or incomplete result is fatal.

use ash::extensions::khr::Surface;
use ash::vk;
use ash::{Entry, Instance};
use std::collections::HashSet;
use std::ffi::{c_char, CStr, CString};

use crate::vulkan::context::{VulkanError, VulkanResult};

/// Convert a driver-reported fixed-size name buffer to an owned string
fn name_from_raw(raw: &[c_char]) -> CString {
    // Vulkan guarantees these buffers are null-terminated.
    unsafe { CStr::from_ptr(raw.as_ptr()) }.to_owned()
}

/// Names of all instance layers the host offers
pub fn instance_layer_names(entry: &Entry) -> VulkanResult<Vec<CString>> {
    let layers = entry
        .enumerate_instance_layer_properties()
        .map_err(VulkanError::Api)?;
    let names: Vec<CString> = layers.iter().map(|l| name_from_raw(&l.layer_name)).collect();
    log::debug!("{} instance layers available: {:?}", names.len(), names);
    Ok(names)
}

/// Names of all instance extensions the host offers
pub fn instance_extension_names(entry: &Entry) -> VulkanResult<Vec<CString>> {
    let extensions = entry
        .enumerate_instance_extension_properties(None)
        .map_err(VulkanError::Api)?;
    let names: Vec<CString> = extensions
        .iter()
        .map(|e| name_from_raw(&e.extension_name))
        .collect();
    log::debug!("{} instance extensions available: {:?}", names.len(), names);
    Ok(names)
}

/// Names of all extensions a physical device offers
pub fn device_extension_names(
    instance: &Instance,
    device: vk::PhysicalDevice,
) -> VulkanResult<Vec<CString>> {
    let extensions = unsafe {
        instance
            .enumerate_device_extension_properties(device)
            .map_err(VulkanError::Api)?
    };
    Ok(extensions
        .iter()
        .map(|e| name_from_raw(&e.extension_name))
        .collect())
}

/// All physical devices the instance can enumerate
pub fn physical_devices(instance: &Instance) -> VulkanResult<Vec<vk::PhysicalDevice>> {
    let devices = unsafe {
        instance
            .enumerate_physical_devices()
            .map_err(VulkanError::Api)?
    };
    log::debug!("{} physical devices found", devices.len());
    Ok(devices)
}

/// Queue family descriptors for a physical device
pub fn queue_families(
    instance: &Instance,
    device: vk::PhysicalDevice,
) -> Vec<vk::QueueFamilyProperties> {
    unsafe { instance.get_physical_device_queue_family_properties(device) }
}

/// Surface capabilities for a device/surface pair
pub fn surface_capabilities(
    loader: &Surface,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> VulkanResult<vk::SurfaceCapabilitiesKHR> {
    unsafe {
        loader
            .get_physical_device_surface_capabilities(device, surface)
            .map_err(VulkanError::Api)
    }
}

/// Surface formats a device can present to a surface
pub fn surface_formats(
    loader: &Surface,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> VulkanResult<Vec<vk::SurfaceFormatKHR>> {
    let formats = unsafe {
        loader
            .get_physical_device_surface_formats(device, surface)
            .map_err(VulkanError::Api)?
    };
    log::debug!("{} surface formats available", formats.len());
    Ok(formats)
}

/// Present modes a device can use with a surface
pub fn present_modes(
    loader: &Surface,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> VulkanResult<Vec<vk::PresentModeKHR>> {
    let modes = unsafe {
        loader
            .get_physical_device_surface_present_modes(device, surface)
            .map_err(VulkanError::Api)?
    };
    log::debug!("{} present modes available: {:?}", modes.len(), modes);
    Ok(modes)
}

/// The subset of `required` that does not appear in `available`, by exact
/// name equality, in the order required names were given
pub fn missing_names(required: &[CString], available: &[CString]) -> Vec<CString> {
    let available: HashSet<&CStr> = available.iter().map(CString::as_c_str).collect();
    required
        .iter()
        .filter(|name| !available.contains(name.as_c_str()))
        .cloned()
        .collect()
}
