// SPDX-License-Identifier: CEPL-1.0
//! Recording driver and platform for exercising the bootstrap without a GPU
//! or a display server.

use std::cell::{Cell, RefCell};
use std::ffi::{c_char, CStr, CString};
use std::rc::Rc;

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use raw_window_handle::{
    RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle,
};
use zerus_core::{AllocatorRef, List};
use zerus_platform::{Platform, PlatformError, PlatformStatus, PlatformWindow, WindowDesc};

use crate::driver::Driver;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Instance,
    Messenger,
    Device,
    Surface,
    Swapchain,
    ImageView,
    Window,
    Platform,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Created(Kind, u64),
    Destroyed(Kind, u64),
}

pub type Journal = Rc<RefCell<Vec<Event>>>;

pub fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

/// Objects created and not yet destroyed, in creation order.
pub fn live_in(journal: &Journal) -> Vec<(Kind, u64)> {
    let mut live = Vec::new();
    for event in journal.borrow().iter() {
        match *event {
            Event::Created(k, id) => live.push((k, id)),
            Event::Destroyed(k, id) => live.retain(|&(lk, lid)| (lk, lid) != (k, id)),
        }
    }
    live
}

/// Destroy order recorded after `mark`.
pub fn destroyed_since(journal: &Journal, mark: usize) -> Vec<Kind> {
    journal.borrow()[mark..]
        .iter()
        .filter_map(|e| match e {
            Event::Destroyed(k, _) => Some(*k),
            Event::Created(..) => None,
        })
        .collect()
}

#[derive(Clone, Debug)]
pub struct FakeGpu {
    pub device_type: vk::PhysicalDeviceType,
    pub name: &'static str,
    pub families: Vec<vk::QueueFlags>,
}

impl FakeGpu {
    pub fn discrete(name: &'static str, families: &[vk::QueueFlags]) -> Self {
        Self {
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            name,
            families: families.to_vec(),
        }
    }

    pub fn integrated(name: &'static str) -> Self {
        Self {
            device_type: vk::PhysicalDeviceType::INTEGRATED_GPU,
            name,
            families: vec![vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE],
        }
    }
}

#[derive(Debug, Default)]
pub struct Failures {
    pub layers: bool,
    pub instance: bool,
    pub messenger: bool,
    pub device: bool,
    pub surface: bool,
    pub swapchain: bool,
    pub images: bool,
    /// Zero-based image view call that fails.
    pub view_at: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainRequest {
    pub min_image_count: u32,
    pub image_format: vk::Format,
    pub image_extent: vk::Extent2D,
    pub image_array_layers: u32,
    pub image_usage: vk::ImageUsageFlags,
    pub image_sharing_mode: vk::SharingMode,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
    pub clipped: bool,
}

#[derive(Debug, Default)]
pub struct Seen {
    pub instance_layers: Vec<CString>,
    pub instance_extensions: Vec<CString>,
    pub app_name: Option<CString>,
    pub api_version: u32,
    pub queue_families: Vec<u32>,
    pub device_extensions: Vec<CString>,
    pub swapchain: Option<SwapchainRequest>,
}

pub struct MockDriver {
    pub journal: Journal,
    pub layers: Vec<&'static CStr>,
    pub gpus: Vec<FakeGpu>,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub caps: vk::SurfaceCapabilitiesKHR,
    pub fail: RefCell<Failures>,
    pub seen: RefCell<Seen>,
    next: Cell<u64>,
    views_made: Cell<usize>,
    image_count: Cell<u32>,
}

const PHYSICAL_BASE: u64 = 0x1000;
const QUEUE_BASE: u64 = 0x2000;
const IMAGE_BASE: u64 = 0x3000;

impl MockDriver {
    /// Validation layer installed, one discrete GPU with a combined
    /// graphics/compute family, the preferred format, FIFO and MAILBOX.
    pub fn healthy(journal: Journal) -> Self {
        Self {
            journal,
            layers: vec![c"VK_LAYER_KHRONOS_validation"],
            gpus: vec![FakeGpu::discrete(
                "Mock Discrete",
                &[vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE],
            )],
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::R8G8B8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                crate::config::PREFERRED_SURFACE_FORMAT,
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            caps: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE
                    | vk::CompositeAlphaFlagsKHR::INHERIT,
                supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            },
            fail: RefCell::default(),
            seen: RefCell::default(),
            next: Cell::new(1),
            views_made: Cell::new(0),
            image_count: Cell::new(0),
        }
    }

    pub fn live(&self) -> Vec<(Kind, u64)> {
        live_in(&self.journal)
    }

    fn create(&self, kind: Kind) -> u64 {
        let id = self.next.get();
        self.next.set(id + 1);
        self.journal.borrow_mut().push(Event::Created(kind, id));
        id
    }

    fn destroy(&self, kind: Kind, id: u64) {
        assert!(
            self.live().contains(&(kind, id)),
            "{kind:?} {id:#x} released twice or never created"
        );
        self.journal.borrow_mut().push(Event::Destroyed(kind, id));
    }

    fn gpu(&self, physical: vk::PhysicalDevice) -> &FakeGpu {
        &self.gpus[(physical.as_raw() - PHYSICAL_BASE) as usize]
    }
}

/// # Safety
/// `ptrs` must point at `count` NUL-terminated strings, or `count` must be 0.
unsafe fn names(ptrs: *const *const c_char, count: u32) -> Vec<CString> {
    if count == 0 || ptrs.is_null() {
        return Vec::new();
    }
    unsafe { std::slice::from_raw_parts(ptrs, count as usize) }
        .iter()
        .map(|&p| unsafe { CStr::from_ptr(p) }.to_owned())
        .collect()
}

fn oom<T>(r: Result<T, zerus_core::AllocError>) -> VkResult<T> {
    r.map_err(|_| vk::Result::ERROR_OUT_OF_HOST_MEMORY)
}

impl Driver for MockDriver {
    fn instance_layers(&self, alloc: &AllocatorRef) -> VkResult<List<vk::LayerProperties>> {
        if self.fail.borrow().layers {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        let mut out = List::new(alloc.clone());
        for name in &self.layers {
            let mut props = vk::LayerProperties::default();
            for (dst, &src) in props.layer_name.iter_mut().zip(name.to_bytes()) {
                *dst = src as c_char;
            }
            oom(out.push(props))?;
        }
        Ok(out)
    }

    fn create_instance(&self, info: &vk::InstanceCreateInfo<'_>) -> VkResult<vk::Instance> {
        if self.fail.borrow().instance {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        let mut seen = self.seen.borrow_mut();
        // SAFETY: create-infos built by the stages point at live name arrays.
        unsafe {
            seen.instance_layers = names(info.pp_enabled_layer_names, info.enabled_layer_count);
            seen.instance_extensions =
                names(info.pp_enabled_extension_names, info.enabled_extension_count);
            if let Some(app) = info.p_application_info.as_ref() {
                seen.api_version = app.api_version;
                if !app.p_application_name.is_null() {
                    seen.app_name = Some(CStr::from_ptr(app.p_application_name).to_owned());
                }
            }
        }
        Ok(vk::Instance::from_raw(self.create(Kind::Instance)))
    }

    unsafe fn destroy_instance(&self, instance: vk::Instance) {
        self.destroy(Kind::Instance, instance.as_raw());
    }

    fn create_debug_messenger(
        &self,
        _instance: vk::Instance,
        _info: &vk::DebugUtilsMessengerCreateInfoEXT<'_>,
    ) -> VkResult<vk::DebugUtilsMessengerEXT> {
        if self.fail.borrow().messenger {
            return Err(vk::Result::ERROR_EXTENSION_NOT_PRESENT);
        }
        Ok(vk::DebugUtilsMessengerEXT::from_raw(self.create(Kind::Messenger)))
    }

    unsafe fn destroy_debug_messenger(
        &self,
        _instance: vk::Instance,
        messenger: vk::DebugUtilsMessengerEXT,
    ) {
        self.destroy(Kind::Messenger, messenger.as_raw());
    }

    fn physical_devices(
        &self,
        _instance: vk::Instance,
        alloc: &AllocatorRef,
    ) -> VkResult<List<vk::PhysicalDevice>> {
        let mut out = List::new(alloc.clone());
        for i in 0..self.gpus.len() {
            oom(out.push(vk::PhysicalDevice::from_raw(PHYSICAL_BASE + i as u64)))?;
        }
        Ok(out)
    }

    fn physical_device_properties(
        &self,
        _instance: vk::Instance,
        physical: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties {
        let gpu = self.gpu(physical);
        let mut props = vk::PhysicalDeviceProperties {
            device_type: gpu.device_type,
            ..Default::default()
        };
        for (dst, &src) in props.device_name.iter_mut().zip(gpu.name.as_bytes()) {
            *dst = src as c_char;
        }
        props
    }

    fn queue_families(
        &self,
        _instance: vk::Instance,
        physical: vk::PhysicalDevice,
        alloc: &AllocatorRef,
    ) -> VkResult<List<vk::QueueFamilyProperties>> {
        let mut out = List::new(alloc.clone());
        for &flags in &self.gpu(physical).families {
            oom(out.push(vk::QueueFamilyProperties {
                queue_flags: flags,
                queue_count: 1,
                ..Default::default()
            }))?;
        }
        Ok(out)
    }

    fn create_device(
        &self,
        _instance: vk::Instance,
        _physical: vk::PhysicalDevice,
        info: &vk::DeviceCreateInfo<'_>,
    ) -> VkResult<vk::Device> {
        if self.fail.borrow().device {
            return Err(vk::Result::ERROR_FEATURE_NOT_PRESENT);
        }
        let mut seen = self.seen.borrow_mut();
        // SAFETY: create-infos built by the stages point at live arrays.
        unsafe {
            seen.queue_families = if info.queue_create_info_count == 0 {
                Vec::new()
            } else {
                std::slice::from_raw_parts(
                    info.p_queue_create_infos,
                    info.queue_create_info_count as usize,
                )
                .iter()
                .map(|q| q.queue_family_index)
                .collect()
            };
            seen.device_extensions =
                names(info.pp_enabled_extension_names, info.enabled_extension_count);
        }
        Ok(vk::Device::from_raw(self.create(Kind::Device)))
    }

    fn device_queue(&self, _device: vk::Device, family: u32, index: u32) -> vk::Queue {
        vk::Queue::from_raw(QUEUE_BASE + u64::from(family) * 16 + u64::from(index))
    }

    unsafe fn destroy_device(&self, device: vk::Device) {
        self.destroy(Kind::Device, device.as_raw());
    }

    fn create_surface(
        &self,
        _instance: vk::Instance,
        _display: RawDisplayHandle,
        _window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        if self.fail.borrow().surface {
            return Err(vk::Result::ERROR_NATIVE_WINDOW_IN_USE_KHR);
        }
        Ok(vk::SurfaceKHR::from_raw(self.create(Kind::Surface)))
    }

    unsafe fn destroy_surface(&self, _instance: vk::Instance, surface: vk::SurfaceKHR) {
        self.destroy(Kind::Surface, surface.as_raw());
    }

    fn surface_formats(
        &self,
        _physical: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
        alloc: &AllocatorRef,
    ) -> VkResult<List<vk::SurfaceFormatKHR>> {
        oom(List::from_slice(alloc.clone(), &self.formats))
    }

    fn surface_capabilities(
        &self,
        _physical: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        Ok(self.caps)
    }

    fn present_modes(
        &self,
        _physical: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
        alloc: &AllocatorRef,
    ) -> VkResult<List<vk::PresentModeKHR>> {
        oom(List::from_slice(alloc.clone(), &self.present_modes))
    }

    fn create_swapchain(
        &self,
        _device: vk::Device,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        self.seen.borrow_mut().swapchain = Some(SwapchainRequest {
            min_image_count: info.min_image_count,
            image_format: info.image_format,
            image_extent: info.image_extent,
            image_array_layers: info.image_array_layers,
            image_usage: info.image_usage,
            image_sharing_mode: info.image_sharing_mode,
            pre_transform: info.pre_transform,
            composite_alpha: info.composite_alpha,
            present_mode: info.present_mode,
            clipped: info.clipped == vk::TRUE,
        });
        if self.fail.borrow().swapchain {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        self.image_count.set(info.min_image_count);
        Ok(vk::SwapchainKHR::from_raw(self.create(Kind::Swapchain)))
    }

    unsafe fn destroy_swapchain(&self, _device: vk::Device, swapchain: vk::SwapchainKHR) {
        self.destroy(Kind::Swapchain, swapchain.as_raw());
    }

    fn swapchain_images(
        &self,
        _device: vk::Device,
        _swapchain: vk::SwapchainKHR,
        alloc: &AllocatorRef,
    ) -> VkResult<List<vk::Image>> {
        if self.fail.borrow().images {
            return Err(vk::Result::ERROR_DEVICE_LOST);
        }
        let mut out = List::new(alloc.clone());
        for i in 0..u64::from(self.image_count.get()) {
            oom(out.push(vk::Image::from_raw(IMAGE_BASE + i)))?;
        }
        Ok(out)
    }

    fn create_image_view(
        &self,
        _device: vk::Device,
        _info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView> {
        let call = self.views_made.get();
        self.views_made.set(call + 1);
        if self.fail.borrow().view_at == Some(call) {
            return Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        }
        Ok(vk::ImageView::from_raw(self.create(Kind::ImageView)))
    }

    unsafe fn destroy_image_view(&self, _device: vk::Device, view: vk::ImageView) {
        self.destroy(Kind::ImageView, view.as_raw());
    }
}

const WINDOW_ID_BASE: u64 = 0x9000_0000;

/// Headless platform. Journals itself and each window it creates.
pub struct MockPlatform {
    journal: Journal,
    id: u64,
    windows_made: u64,
    pumps: usize,
    pub framebuffer: (u32, u32),
    /// Report `ShouldClose` on this pump call (1-based) and every later one.
    pub close_after: Option<usize>,
    pub fail_window: bool,
    pub fail_extensions: bool,
}

impl MockPlatform {
    pub fn new(journal: Journal) -> Self {
        let id = WINDOW_ID_BASE;
        journal.borrow_mut().push(Event::Created(Kind::Platform, id));
        Self {
            journal,
            id,
            windows_made: 0,
            pumps: 0,
            framebuffer: (800, 600),
            close_after: None,
            fail_window: false,
            fail_extensions: false,
        }
    }

    pub fn pumps(&self) -> usize {
        self.pumps
    }
}

impl Drop for MockPlatform {
    fn drop(&mut self) {
        self.journal
            .borrow_mut()
            .push(Event::Destroyed(Kind::Platform, self.id));
    }
}

impl Platform for MockPlatform {
    type Window = MockWindow;

    fn required_extensions(&self) -> Result<Vec<&'static CStr>, PlatformError> {
        if self.fail_extensions {
            return Err(PlatformError::Extensions("no presentation support".into()));
        }
        Ok(vec![ash::khr::surface::NAME, ash::khr::xlib_surface::NAME])
    }

    fn create_window(&mut self, desc: &WindowDesc) -> Result<MockWindow, PlatformError> {
        if self.fail_window {
            return Err(PlatformError::NotResumed);
        }
        self.windows_made += 1;
        let id = self.id + self.windows_made;
        self.journal
            .borrow_mut()
            .push(Event::Created(Kind::Window, id));
        Ok(MockWindow {
            journal: self.journal.clone(),
            id,
            title: desc.title.clone(),
            framebuffer: self.framebuffer,
        })
    }

    fn pump_events(&mut self) -> PlatformStatus {
        self.pumps += 1;
        match self.close_after {
            Some(n) if self.pumps >= n => PlatformStatus::ShouldClose,
            _ => PlatformStatus::Continue,
        }
    }
}

pub struct MockWindow {
    journal: Journal,
    id: u64,
    pub title: String,
    framebuffer: (u32, u32),
}

impl PlatformWindow for MockWindow {
    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), PlatformError> {
        let display = XlibDisplayHandle::new(None, 0);
        let window = XlibWindowHandle::new(self.id as std::ffi::c_ulong);
        Ok((RawDisplayHandle::Xlib(display), RawWindowHandle::Xlib(window)))
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.framebuffer
    }
}

impl Drop for MockWindow {
    fn drop(&mut self) {
        self.journal
            .borrow_mut()
            .push(Event::Destroyed(Kind::Window, self.id));
    }
}
