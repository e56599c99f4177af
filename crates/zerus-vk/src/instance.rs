// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_char, CStr};
use std::rc::Rc;

use ash::vk;
use tracing::{error, info, warn, Level};
use zerus_core::AllocatorRef;

use crate::config::BootstrapConfig;
use crate::driver::Driver;
use crate::error::BootstrapError;
use crate::negotiate::{name_pointers, ExtensionList};
use crate::owned::{Owned, OwnedDebugMessenger, OwnedInstance};

const ENGINE_NAME: &CStr = c"Zerus Engine";

/// Outcome of diagnostic sink registration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DiagnosticsStatus {
    #[default]
    Disabled,
    Active,
    /// Validation was requested but the messenger could not be registered.
    Unavailable(vk::Result),
}

pub fn create_instance<D: Driver>(
    driver: &Rc<D>,
    alloc: &AllocatorRef,
    config: &BootstrapConfig,
    extensions: &ExtensionList,
) -> Result<OwnedInstance<D>, BootstrapError> {
    let version = config.engine_version_packed();
    let app_info = vk::ApplicationInfo::default()
        .application_name(&config.app_name)
        .application_version(version)
        .engine_name(ENGINE_NAME)
        .engine_version(version)
        .api_version(vk::API_VERSION_1_3);

    let ext_ptrs = name_pointers(extensions, alloc)?;
    let validation_layers: [*const c_char; 1] = [config.validation_layer.as_ptr()];
    let layers: &[*const c_char] = if config.validation {
        &validation_layers
    } else {
        &[]
    };

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&ext_ptrs)
        .enabled_layer_names(layers);

    let handle = driver.create_instance(&create_info).map_err(|e| {
        error!("vkCreateInstance: {e}");
        BootstrapError::InstanceCreationFailed(e)
    })?;
    info!(
        "Vulkan instance created ({} extension(s), validation={})",
        extensions.len(),
        config.validation
    );

    // SAFETY: freshly created by this driver; nobody else holds it.
    Ok(unsafe { Owned::adopt(driver.clone(), (), handle) })
}

/// Registers the validation message sink. Failure downgrades diagnostics
/// and never aborts the bootstrap.
pub fn register_diagnostics<D: Driver>(
    driver: &Rc<D>,
    instance: &OwnedInstance<D>,
) -> (Option<OwnedDebugMessenger<D>>, DiagnosticsStatus) {
    let info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    match driver.create_debug_messenger(instance.handle(), &info) {
        Ok(messenger) => {
            info!("validation messages routed to tracing");
            // SAFETY: freshly created under `instance`.
            let owned = unsafe { Owned::adopt(driver.clone(), instance.handle(), messenger) };
            (Some(owned), DiagnosticsStatus::Active)
        }
        Err(e) => {
            warn!("debug messenger unavailable ({e}); continuing without validation output");
            (None, DiagnosticsStatus::Unavailable(e))
        }
    }
}

pub(crate) fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        Level::ERROR
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        Level::WARN
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        Level::INFO
    } else {
        Level::TRACE
    }
}

fn category(types: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if types.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "VALIDATION"
    } else if types.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "PERFORMANCE"
    } else if types.contains(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL) {
        "GENERAL"
    } else {
        "UNKNOWN"
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut std::ffi::c_void,
) -> vk::Bool32 {
    // SAFETY: the loader passes either null or a valid callback struct.
    let Some(data) = (unsafe { data.as_ref() }) else {
        return vk::FALSE;
    };
    if data.p_message.is_null() {
        return vk::FALSE;
    }
    // SAFETY: p_message is a NUL-terminated string valid for this call.
    let message = unsafe { CStr::from_ptr(data.p_message) }.to_string_lossy();
    let kind = category(types);

    let level = severity_level(severity);
    if level == Level::ERROR {
        tracing::error!(target: "zerus::vulkan", "[{}] {}", kind, message);
    } else if level == Level::WARN {
        tracing::warn!(target: "zerus::vulkan", "[{}] {}", kind, message);
    } else if level == Level::INFO {
        tracing::info!(target: "zerus::vulkan", "[{}] {}", kind, message);
    } else {
        tracing::trace!(target: "zerus::vulkan", "[{}] {}", kind, message);
    }
    vk::FALSE
}
