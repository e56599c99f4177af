// SPDX-License-Identifier: CEPL-1.0
//! One owning wrapper per native handle category.
//!
//! An [`Owned`] releases its handle exactly once, when dropped. Aggregates
//! declare their owned fields child-first so that field drop order is the
//! required teardown order.

use std::fmt;
use std::rc::Rc;

use ash::vk;
use tracing::debug;

use crate::driver::Driver;

pub trait NativeHandle: vk::Handle + Copy + fmt::Debug {
    /// Handle the release call needs besides this one.
    type Parent: Copy + fmt::Debug;
    const KIND: &'static str;

    /// # Safety
    /// `handle` must be live, owned by the caller, and created by `driver`
    /// under `parent`.
    unsafe fn release<D: Driver>(driver: &D, parent: Self::Parent, handle: Self);
}

impl NativeHandle for vk::Instance {
    type Parent = ();
    const KIND: &'static str = "instance";

    unsafe fn release<D: Driver>(driver: &D, _parent: (), handle: Self) {
        unsafe { driver.destroy_instance(handle) }
    }
}

impl NativeHandle for vk::DebugUtilsMessengerEXT {
    type Parent = vk::Instance;
    const KIND: &'static str = "debug messenger";

    unsafe fn release<D: Driver>(driver: &D, parent: vk::Instance, handle: Self) {
        unsafe { driver.destroy_debug_messenger(parent, handle) }
    }
}

impl NativeHandle for vk::Device {
    type Parent = ();
    const KIND: &'static str = "logical device";

    unsafe fn release<D: Driver>(driver: &D, _parent: (), handle: Self) {
        unsafe { driver.destroy_device(handle) }
    }
}

impl NativeHandle for vk::SurfaceKHR {
    type Parent = vk::Instance;
    const KIND: &'static str = "surface";

    unsafe fn release<D: Driver>(driver: &D, parent: vk::Instance, handle: Self) {
        unsafe { driver.destroy_surface(parent, handle) }
    }
}

impl NativeHandle for vk::SwapchainKHR {
    type Parent = vk::Device;
    const KIND: &'static str = "swapchain";

    unsafe fn release<D: Driver>(driver: &D, parent: vk::Device, handle: Self) {
        unsafe { driver.destroy_swapchain(parent, handle) }
    }
}

impl NativeHandle for vk::ImageView {
    type Parent = vk::Device;
    const KIND: &'static str = "image view";

    unsafe fn release<D: Driver>(driver: &D, parent: vk::Device, handle: Self) {
        unsafe { driver.destroy_image_view(parent, handle) }
    }
}

pub struct Owned<D: Driver, H: NativeHandle> {
    driver: Rc<D>,
    parent: H::Parent,
    handle: H,
}

pub type OwnedInstance<D> = Owned<D, vk::Instance>;
pub type OwnedDebugMessenger<D> = Owned<D, vk::DebugUtilsMessengerEXT>;
pub type OwnedDevice<D> = Owned<D, vk::Device>;
pub type OwnedSurface<D> = Owned<D, vk::SurfaceKHR>;
pub type OwnedSwapchain<D> = Owned<D, vk::SwapchainKHR>;
pub type OwnedImageView<D> = Owned<D, vk::ImageView>;

impl<D: Driver, H: NativeHandle> Owned<D, H> {
    /// # Safety
    /// `handle` must have just been created by `driver` under `parent`, and
    /// nothing else may release it.
    pub(crate) unsafe fn adopt(driver: Rc<D>, parent: H::Parent, handle: H) -> Self {
        Self {
            driver,
            parent,
            handle,
        }
    }

    pub fn handle(&self) -> H {
        self.handle
    }
}

impl<D: Driver, H: NativeHandle> Drop for Owned<D, H> {
    fn drop(&mut self) {
        debug!("destroying {} {:?}", H::KIND, self.handle);
        // SAFETY: `adopt` made us the sole owner; this is the only release.
        unsafe { H::release(&*self.driver, self.parent, self.handle) }
    }
}

impl<D: Driver, H: NativeHandle> fmt::Debug for Owned<D, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owned")
            .field("kind", &H::KIND)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
