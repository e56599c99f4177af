// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Vulkan bootstrap: instance, diagnostics, device, surface and swapchain,
//! built in order into one [`Context`] and torn down in reverse.

mod ash_driver;
mod config;
mod context;
mod device;
mod driver;
mod error;
mod instance;
mod negotiate;
mod owned;
mod surface;

#[cfg(test)]
mod mock;

pub use ash;
pub use ash_driver::AshDriver;
pub use config::{default_device_extensions, BootstrapConfig, VsyncMode, PREFERRED_SURFACE_FORMAT};
pub use context::{Context, Status};
pub use device::{pick_discrete, select_device, DeviceInfo, QueuePlan};
pub use driver::Driver;
pub use error::BootstrapError;
pub use instance::{create_instance, register_diagnostics, DiagnosticsStatus};
pub use negotiate::{name_pointers, negotiate, ExtensionList};
pub use owned::{
    NativeHandle, Owned, OwnedDebugMessenger, OwnedDevice, OwnedImageView, OwnedInstance,
    OwnedSurface, OwnedSwapchain,
};
pub use surface::{
    choose_composite_alpha, choose_extent, choose_image_count, choose_present_mode,
    choose_surface_format, SurfaceInfo, SurfaceStage,
};
