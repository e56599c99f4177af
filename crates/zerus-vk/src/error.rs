// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use thiserror::Error;
use zerus_core::AllocError;

/// First failure hit by the bootstrap chain. Nothing after it is attempted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("platform could not report its required instance extensions")]
    PlatformExtensionsUnavailable,
    #[error("validation layer requested but not present")]
    ValidationLayerUnavailable,
    #[error("{count} instance extensions exceed the negotiation limit of {limit}")]
    TooManyExtensions { count: usize, limit: usize },
    #[error("instance creation failed: {0}")]
    InstanceCreationFailed(vk::Result),
    #[error("no discrete GPU found")]
    DeviceNotFound,
    #[error("selected device reports no queue families")]
    QueueFamilyNotFound,
    #[error("no queue family with graphics capability")]
    GraphicsQueueNotFound,
    #[error("logical device creation failed: {0}")]
    DeviceCreationFailed(vk::Result),
    #[error("window or surface creation failed")]
    SurfaceCreationFailed,
    #[error("device reports no surface formats")]
    SurfaceFormatNotFound,
    #[error("device reports no present modes")]
    PresentModeNotFound,
    #[error("swapchain creation failed: {0}")]
    SwapchainCreationFailed(vk::Result),
    #[error("swapchain images unavailable")]
    SwapchainImagesNotFound,
    #[error("image view {index} creation failed: {result}")]
    ImageViewCreationFailed { index: usize, result: vk::Result },
    #[error(transparent)]
    HostAllocation(#[from] AllocError),
}
