// SPDX-License-Identifier: CEPL-1.0
//! The native graphics API as seen by the bootstrap stages.
//!
//! One method per Vulkan entry point the bootstrap touches. Enumerations use
//! the count-then-fetch protocol and land in allocator-backed [`List`]s.
//! Release methods are `unsafe` and are only called from [`crate::owned`].

use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use zerus_core::{AllocatorRef, List};

pub trait Driver {
    fn instance_layers(&self, alloc: &AllocatorRef) -> VkResult<List<vk::LayerProperties>>;
    fn create_instance(&self, info: &vk::InstanceCreateInfo<'_>) -> VkResult<vk::Instance>;
    /// # Safety
    /// `instance` must be live, created by this driver, with no live children.
    unsafe fn destroy_instance(&self, instance: vk::Instance);

    fn create_debug_messenger(
        &self,
        instance: vk::Instance,
        info: &vk::DebugUtilsMessengerCreateInfoEXT<'_>,
    ) -> VkResult<vk::DebugUtilsMessengerEXT>;
    /// # Safety
    /// `messenger` must be live and created from `instance`.
    unsafe fn destroy_debug_messenger(
        &self,
        instance: vk::Instance,
        messenger: vk::DebugUtilsMessengerEXT,
    );

    fn physical_devices(
        &self,
        instance: vk::Instance,
        alloc: &AllocatorRef,
    ) -> VkResult<List<vk::PhysicalDevice>>;
    fn physical_device_properties(
        &self,
        instance: vk::Instance,
        physical: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties;
    fn queue_families(
        &self,
        instance: vk::Instance,
        physical: vk::PhysicalDevice,
        alloc: &AllocatorRef,
    ) -> VkResult<List<vk::QueueFamilyProperties>>;
    fn create_device(
        &self,
        instance: vk::Instance,
        physical: vk::PhysicalDevice,
        info: &vk::DeviceCreateInfo<'_>,
    ) -> VkResult<vk::Device>;
    fn device_queue(&self, device: vk::Device, family: u32, index: u32) -> vk::Queue;
    /// # Safety
    /// `device` must be live, created by this driver, with no live children.
    unsafe fn destroy_device(&self, device: vk::Device);

    fn create_surface(
        &self,
        instance: vk::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR>;
    /// # Safety
    /// `surface` must be live, created from `instance`, with no swapchain on it.
    unsafe fn destroy_surface(&self, instance: vk::Instance, surface: vk::SurfaceKHR);
    fn surface_formats(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        alloc: &AllocatorRef,
    ) -> VkResult<List<vk::SurfaceFormatKHR>>;
    fn surface_capabilities(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    fn present_modes(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        alloc: &AllocatorRef,
    ) -> VkResult<List<vk::PresentModeKHR>>;

    fn create_swapchain(
        &self,
        device: vk::Device,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR>;
    /// # Safety
    /// `swapchain` must be live, created from `device`, with no live views
    /// of its images.
    unsafe fn destroy_swapchain(&self, device: vk::Device, swapchain: vk::SwapchainKHR);
    fn swapchain_images(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
        alloc: &AllocatorRef,
    ) -> VkResult<List<vk::Image>>;

    fn create_image_view(
        &self,
        device: vk::Device,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView>;
    /// # Safety
    /// `view` must be live and created from `device`.
    unsafe fn destroy_image_view(&self, device: vk::Device, view: vk::ImageView);
}
