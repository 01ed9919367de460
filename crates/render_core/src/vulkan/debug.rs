//! Validation-layer diagnostics channel
//!
//! Routes driver and validation-layer messages into the logging system. The
//! channel is optional: when the host lacks the debug-utils extension the
//! renderer runs without it and every other subsystem behaves identically.

use ash::extensions::ext::DebugUtils;
use ash::vk;
use ash::{Entry, Instance};
use std::ffi::CStr;
use std::sync::OnceLock;

use crate::vulkan::context::{VulkanError, VulkanResult};

/// Importance of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Chatty loader and layer output
    Verbose,
    /// Suspicious but recoverable usage
    Warning,
    /// Invalid API usage
    Error,
}

/// Origin of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// General driver messages
    General,
    /// Validation-layer findings
    Validation,
    /// Performance advisories
    Performance,
}

/// Receiver for diagnostic messages
///
/// The default sink forwards to the `log` crate; applications can install
/// their own before the context is created to capture messages elsewhere.
pub trait DiagnosticsSink: Send + Sync {
    /// Handle one diagnostic message
    fn message(&self, severity: Severity, category: Category, text: &str);
}

struct LogSink;

impl DiagnosticsSink for LogSink {
    fn message(&self, severity: Severity, category: Category, text: &str) {
        match severity {
            Severity::Error => log::error!("[vulkan:{:?}] {}", category, text),
            Severity::Warning => log::warn!("[vulkan:{:?}] {}", category, text),
            Severity::Verbose => log::trace!("[vulkan:{:?}] {}", category, text),
        }
    }
}

static SINK: OnceLock<Box<dyn DiagnosticsSink>> = OnceLock::new();

/// Install a custom diagnostics sink
///
/// Takes effect only if called before the first message arrives; returns the
/// sink back if one was already installed.
pub fn set_diagnostics_sink(sink: Box<dyn DiagnosticsSink>) -> Result<(), Box<dyn DiagnosticsSink>> {
    SINK.set(sink)
}

fn sink() -> &'static dyn DiagnosticsSink {
    SINK.get_or_init(|| Box::new(LogSink)).as_ref()
}

pub(crate) fn severity_from_flags(flags: vk::DebugUtilsMessageSeverityFlagsEXT) -> Severity {
    if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        Severity::Error
    } else if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        Severity::Warning
    } else {
        Severity::Verbose
    }
}

pub(crate) fn category_from_flags(flags: vk::DebugUtilsMessageTypeFlagsEXT) -> Category {
    if flags.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        Category::Validation
    } else if flags.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        Category::Performance
    } else {
        Category::General
    }
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let text = if callback_data.is_null() || (*callback_data).p_message.is_null() {
        String::from("<no message>")
    } else {
        CStr::from_ptr((*callback_data).p_message)
            .to_string_lossy()
            .into_owned()
    };

    sink().message(
        severity_from_flags(message_severity),
        category_from_flags(message_type),
        &text,
    );

    // Never abort the triggering call.
    vk::FALSE
}

/// The messenger create info used for the diagnostics channel
///
/// All severities and all categories are requested; filtering happens in the
/// sink, not in the driver.
pub(crate) fn messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
        .build()
}

/// Installed debug-utils messenger
///
/// Dropping unregisters the messenger. Must be dropped before the instance
/// it was installed on.
pub struct DebugMessenger {
    debug_utils: DebugUtils,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    /// Register the diagnostics callback on an instance
    pub fn install(entry: &Entry, instance: &Instance) -> VulkanResult<Self> {
        let debug_utils = DebugUtils::new(entry, instance);
        let create_info = messenger_create_info();

        let messenger = unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        log::debug!("Debug messenger installed");
        Ok(Self {
            debug_utils,
            messenger,
        })
    }
}

impl Drop for DebugMessenger {
    fn drop(&mut self) {
        unsafe {
            self.debug_utils
                .destroy_debug_utils_messenger(self.messenger, None);
        }
        log::debug!("Debug messenger destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping_picks_highest() {
        assert_eq!(
            severity_from_flags(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR),
            Severity::Error
        );
        assert_eq!(
            severity_from_flags(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING),
            Severity::Warning
        );
        assert_eq!(
            severity_from_flags(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE),
            Severity::Verbose
        );
        assert_eq!(
            severity_from_flags(vk::DebugUtilsMessageSeverityFlagsEXT::INFO),
            Severity::Verbose
        );
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(
            category_from_flags(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION),
            Category::Validation
        );
        assert_eq!(
            category_from_flags(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE),
            Category::Performance
        );
        assert_eq!(
            category_from_flags(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL),
            Category::General
        );
    }

    #[test]
    fn test_messenger_requests_all_severities_and_categories() {
        let info = messenger_create_info();
        assert!(info
            .message_severity
            .contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));
        assert!(info
            .message_severity
            .contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING));
        assert!(info
            .message_severity
            .contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR));
        assert!(info
            .message_type
            .contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION));
        assert!(info.pfn_user_callback.is_some());
    }
}
