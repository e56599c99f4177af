// SPDX-License-Identifier: CEPL-1.0
//! [`Driver`] over the system Vulkan loader.
//!
//! ash hands out per-object function tables, so the driver keeps the tables
//! for the instance and device it created. It serves one instance and one
//! device at a time, which is all the bootstrap ever builds.

use std::cell::{Ref, RefCell};
use std::ptr;

use ash::khr::{surface, swapchain};
use ash::prelude::VkResult;
use ash::{ext::debug_utils, vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use tracing::{debug, warn};
use zerus_core::{AllocatorRef, List};

use crate::driver::Driver;

pub struct AshDriver {
    entry: Entry,
    instance: RefCell<Option<ash::Instance>>,
    surface: RefCell<Option<surface::Instance>>,
    debug_utils: RefCell<Option<debug_utils::Instance>>,
    device: RefCell<Option<ash::Device>>,
    swapchain: RefCell<Option<swapchain::Device>>,
}

impl AshDriver {
    pub fn new() -> Self {
        Self {
            entry: Entry::linked(),
            instance: RefCell::new(None),
            surface: RefCell::new(None),
            debug_utils: RefCell::new(None),
            device: RefCell::new(None),
            swapchain: RefCell::new(None),
        }
    }
}

impl Default for AshDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn loaded<T>(slot: &RefCell<Option<T>>) -> VkResult<Ref<'_, T>> {
    Ref::filter_map(slot.borrow(), Option::as_ref)
        .map_err(|_| vk::Result::ERROR_INITIALIZATION_FAILED)
}

// Passes over the count-then-fetch pair before giving up with INCOMPLETE.
const ENUMERATE_ATTEMPTS: usize = 4;

/// What to do when the fetch writes fewer elements than the count promised.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ShortFetch {
    /// The set shrank between the calls; keep what was written.
    Accept,
    /// The count is fixed (swapchain images); a shortfall is an error.
    Reject,
}

/// Count-then-fetch into an allocator-backed list. Restarts when the set grew
/// between the two calls, at most [`ENUMERATE_ATTEMPTS`] times.
fn enumerate<T>(
    alloc: &AllocatorRef,
    short: ShortFetch,
    mut call: impl FnMut(*mut u32, *mut T) -> vk::Result,
) -> VkResult<List<T>> {
    for attempt in 1..=ENUMERATE_ATTEMPTS {
        let mut count = 0u32;
        call(&mut count, ptr::null_mut()).result()?;

        let mut list = List::with_capacity(alloc.clone(), count as usize)
            .map_err(|_| vk::Result::ERROR_OUT_OF_HOST_MEMORY)?;
        let mut written = count;
        match call(&mut written, list.as_mut_ptr()) {
            vk::Result::INCOMPLETE => {
                debug!("enumeration grew past {count} (attempt {attempt}); retrying");
                continue;
            }
            status => status.result()?,
        }
        if written < count && short == ShortFetch::Reject {
            warn!("driver reported {count} element(s) but wrote {written}");
            return Err(vk::Result::INCOMPLETE);
        }
        // SAFETY: the driver initialized `written` elements, capped at the capacity.
        unsafe { list.set_len(written.min(count) as usize) };
        return Ok(list);
    }
    warn!("enumeration still incomplete after {ENUMERATE_ATTEMPTS} attempt(s)");
    Err(vk::Result::INCOMPLETE)
}

impl Driver for AshDriver {
    fn instance_layers(&self, alloc: &AllocatorRef) -> VkResult<List<vk::LayerProperties>> {
        let fp = self.entry.fp_v1_0();
        // SAFETY: count/pointer pairs come from `enumerate`.
        enumerate(alloc, ShortFetch::Accept, |n, p| unsafe {
            (fp.enumerate_instance_layer_properties)(n, p)
        })
    }

    fn create_instance(&self, info: &vk::InstanceCreateInfo<'_>) -> VkResult<vk::Instance> {
        // SAFETY: `info` and everything it points at outlive the call.
        let instance = unsafe { self.entry.create_instance(info, None)? };
        let handle = instance.handle();
        *self.surface.borrow_mut() = Some(surface::Instance::new(&self.entry, &instance));
        *self.debug_utils.borrow_mut() = Some(debug_utils::Instance::new(&self.entry, &instance));
        *self.instance.borrow_mut() = Some(instance);
        Ok(handle)
    }

    unsafe fn destroy_instance(&self, _instance: vk::Instance) {
        self.surface.borrow_mut().take();
        self.debug_utils.borrow_mut().take();
        match self.instance.borrow_mut().take() {
            // SAFETY: caller guarantees no live children.
            Some(instance) => unsafe { instance.destroy_instance(None) },
            None => warn!("destroy_instance without a live instance"),
        }
    }

    fn create_debug_messenger(
        &self,
        _instance: vk::Instance,
        info: &vk::DebugUtilsMessengerCreateInfoEXT<'_>,
    ) -> VkResult<vk::DebugUtilsMessengerEXT> {
        let loader = loaded(&self.debug_utils)?;
        // SAFETY: valid create-info; loader belongs to the live instance.
        unsafe { loader.create_debug_utils_messenger(info, None) }
    }

    unsafe fn destroy_debug_messenger(
        &self,
        _instance: vk::Instance,
        messenger: vk::DebugUtilsMessengerEXT,
    ) {
        if let Ok(loader) = loaded(&self.debug_utils) {
            // SAFETY: caller guarantees `messenger` is live and ours.
            unsafe { loader.destroy_debug_utils_messenger(messenger, None) }
        }
    }

    fn physical_devices(
        &self,
        _instance: vk::Instance,
        alloc: &AllocatorRef,
    ) -> VkResult<List<vk::PhysicalDevice>> {
        let instance = loaded(&self.instance)?;
        let raw = instance.handle();
        let fp = instance.fp_v1_0();
        // SAFETY: count/pointer pairs come from `enumerate`.
        enumerate(alloc, ShortFetch::Accept, |n, p| unsafe {
            (fp.enumerate_physical_devices)(raw, n, p)
        })
    }

    fn physical_device_properties(
        &self,
        _instance: vk::Instance,
        physical: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties {
        match loaded(&self.instance) {
            // SAFETY: `physical` was enumerated from this instance.
            Ok(instance) => unsafe { instance.get_physical_device_properties(physical) },
            Err(_) => {
                warn!("physical_device_properties without a live instance");
                vk::PhysicalDeviceProperties::default()
            }
        }
    }

    fn queue_families(
        &self,
        _instance: vk::Instance,
        physical: vk::PhysicalDevice,
        alloc: &AllocatorRef,
    ) -> VkResult<List<vk::QueueFamilyProperties>> {
        let instance = loaded(&self.instance)?;
        let fp = instance.fp_v1_0();
        enumerate(alloc, ShortFetch::Accept, |n, p| {
            // SAFETY: count/pointer pairs come from `enumerate`.
            unsafe { (fp.get_physical_device_queue_family_properties)(physical, n, p) };
            vk::Result::SUCCESS
        })
    }

    fn create_device(
        &self,
        _instance: vk::Instance,
        physical: vk::PhysicalDevice,
        info: &vk::DeviceCreateInfo<'_>,
    ) -> VkResult<vk::Device> {
        let instance = loaded(&self.instance)?;
        // SAFETY: `info` outlives the call; `physical` belongs to `instance`.
        let device = unsafe { instance.create_device(physical, info, None)? };
        let handle = device.handle();
        *self.swapchain.borrow_mut() = Some(swapchain::Device::new(&instance, &device));
        *self.device.borrow_mut() = Some(device);
        Ok(handle)
    }

    fn device_queue(&self, _device: vk::Device, family: u32, index: u32) -> vk::Queue {
        match loaded(&self.device) {
            // SAFETY: family/index were requested at device creation.
            Ok(device) => unsafe { device.get_device_queue(family, index) },
            Err(_) => vk::Queue::null(),
        }
    }

    unsafe fn destroy_device(&self, _device: vk::Device) {
        self.swapchain.borrow_mut().take();
        match self.device.borrow_mut().take() {
            // SAFETY: caller guarantees no live children.
            Some(device) => unsafe { device.destroy_device(None) },
            None => warn!("destroy_device without a live device"),
        }
    }

    fn create_surface(
        &self,
        _instance: vk::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        let instance = loaded(&self.instance)?;
        // SAFETY: the handles come from a live window that outlives the surface.
        unsafe { ash_window::create_surface(&self.entry, &instance, display, window, None) }
    }

    unsafe fn destroy_surface(&self, _instance: vk::Instance, surface: vk::SurfaceKHR) {
        if let Ok(loader) = loaded(&self.surface) {
            // SAFETY: caller guarantees no swapchain remains on it.
            unsafe { loader.destroy_surface(surface, None) }
        }
    }

    fn surface_formats(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        alloc: &AllocatorRef,
    ) -> VkResult<List<vk::SurfaceFormatKHR>> {
        let loader = loaded(&self.surface)?;
        let fp = loader.fp();
        enumerate(alloc, ShortFetch::Accept, |n, p| {
            // SAFETY: count/pointer pairs come from `enumerate`.
            unsafe { (fp.get_physical_device_surface_formats_khr)(physical, surface, n, p) }
        })
    }

    fn surface_capabilities(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        let loader = loaded(&self.surface)?;
        // SAFETY: both handles are live.
        unsafe { loader.get_physical_device_surface_capabilities(physical, surface) }
    }

    fn present_modes(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        alloc: &AllocatorRef,
    ) -> VkResult<List<vk::PresentModeKHR>> {
        let loader = loaded(&self.surface)?;
        let fp = loader.fp();
        enumerate(alloc, ShortFetch::Accept, |n, p| {
            // SAFETY: count/pointer pairs come from `enumerate`.
            unsafe { (fp.get_physical_device_surface_present_modes_khr)(physical, surface, n, p) }
        })
    }

    fn create_swapchain(
        &self,
        _device: vk::Device,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        let loader = loaded(&self.swapchain)?;
        // SAFETY: `info` outlives the call and names a live surface.
        unsafe { loader.create_swapchain(info, None) }
    }

    unsafe fn destroy_swapchain(&self, _device: vk::Device, swapchain: vk::SwapchainKHR) {
        if let Ok(loader) = loaded(&self.swapchain) {
            // SAFETY: caller guarantees no views of its images remain.
            unsafe { loader.destroy_swapchain(swapchain, None) }
        }
    }

    fn swapchain_images(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
        alloc: &AllocatorRef,
    ) -> VkResult<List<vk::Image>> {
        let loader = loaded(&self.swapchain)?;
        let fp = loader.fp();
        enumerate(alloc, ShortFetch::Reject, |n, p| {
            // SAFETY: count/pointer pairs come from `enumerate`.
            unsafe { (fp.get_swapchain_images_khr)(device, swapchain, n, p) }
        })
    }

    fn create_image_view(
        &self,
        _device: vk::Device,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView> {
        let device = loaded(&self.device)?;
        // SAFETY: `info` names a live swapchain image.
        unsafe { device.create_image_view(info, None) }
    }

    unsafe fn destroy_image_view(&self, _device: vk::Device, view: vk::ImageView) {
        if let Ok(device) = loaded(&self.device) {
            // SAFETY: caller guarantees `view` is live and ours.
            unsafe { device.destroy_image_view(view, None) }
        }
    }
}
