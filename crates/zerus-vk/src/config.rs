// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CString;

use ash::vk;
use zerus_platform::WindowDesc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VsyncMode {
    /// Always FIFO; capped at the display refresh rate.
    Fifo,
    /// MAILBOX when offered, FIFO otherwise.
    #[default]
    Mailbox,
}

pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Everything the bootstrap stages need to know up front.
///
/// Passed by reference into each stage; no stage reads process-wide state.
#[derive(Clone, Debug)]
pub struct BootstrapConfig {
    pub app_name: CString,
    pub engine_version: (u32, u32, u32),
    pub validation: bool,
    pub validation_layer: CString,
    pub extra_instance_extensions: Vec<CString>,
    pub device_extensions: Vec<CString>,
    /// Upper bound on negotiated instance extension names.
    pub max_extension_names: usize,
    pub vsync: VsyncMode,
    pub preferred_format: vk::SurfaceFormatKHR,
    pub window: WindowDesc,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        BootstrapConfig {
            app_name: c"Zerus".to_owned(),
            engine_version: (1, 0, 0),
            validation: cfg!(debug_assertions),
            validation_layer: c"VK_LAYER_KHRONOS_validation".to_owned(),
            extra_instance_extensions: Vec::new(),
            device_extensions: default_device_extensions(),
            max_extension_names: 256,
            vsync: VsyncMode::default(),
            preferred_format: PREFERRED_SURFACE_FORMAT,
            window: WindowDesc::default(),
        }
    }
}

impl BootstrapConfig {
    pub fn engine_version_packed(&self) -> u32 {
        let (major, minor, patch) = self.engine_version;
        vk::make_api_version(0, major, minor, patch)
    }
}

pub fn default_device_extensions() -> Vec<CString> {
    [
        ash::khr::swapchain::NAME,
        ash::khr::spirv_1_4::NAME,
        ash::khr::synchronization2::NAME,
        ash::khr::create_renderpass2::NAME,
    ]
    .into_iter()
    .map(|n| n.to_owned())
    .collect()
}
