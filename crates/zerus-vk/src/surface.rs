// SPDX-License-Identifier: CEPL-1.0
use std::rc::Rc;

use ash::vk;
use tracing::{debug, error, info, warn};
use zerus_core::{AllocatorRef, List};
use zerus_platform::{Platform, PlatformWindow};

use crate::config::{BootstrapConfig, VsyncMode};
use crate::device::DeviceInfo;
use crate::driver::Driver;
use crate::error::BootstrapError;
use crate::owned::{Owned, OwnedImageView, OwnedInstance, OwnedSurface, OwnedSwapchain};

/// Progress of [`SurfaceInfo::create`]. Each stage implies all earlier ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceStage {
    Uninitialized,
    WindowCreated,
    SurfaceBound,
    FormatChosen,
    SwapchainBuilt,
    ImagesRetrieved,
    Ready,
    Failed(BootstrapError),
}

/// Window, surface binding, swapchain and per-image views.
///
/// Fields are declared child-first: dropping releases views, then the
/// swapchain, then the surface, then the window.
pub struct SurfaceInfo<D: Driver, W> {
    views: Option<List<OwnedImageView<D>>>,
    // Owned by the swapchain; never released individually.
    images: Option<List<vk::Image>>,
    swapchain: Option<OwnedSwapchain<D>>,
    surface: Option<OwnedSurface<D>>,
    window: Option<W>,

    stage: SurfaceStage,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
}

impl<D: Driver, W: PlatformWindow> SurfaceInfo<D, W> {
    pub fn new() -> Self {
        Self {
            views: None,
            images: None,
            swapchain: None,
            surface: None,
            window: None,
            stage: SurfaceStage::Uninitialized,
            format: vk::SurfaceFormatKHR::default(),
            present_mode: vk::PresentModeKHR::FIFO,
            extent: vk::Extent2D::default(),
        }
    }

    /// Runs every presentation stage. On failure the returned value holds
    /// whatever was built and reports [`SurfaceStage::Failed`].
    pub fn create<P>(
        platform: &mut P,
        driver: &Rc<D>,
        alloc: &AllocatorRef,
        instance: &OwnedInstance<D>,
        device: &DeviceInfo<D>,
        config: &BootstrapConfig,
    ) -> Self
    where
        P: Platform<Window = W>,
    {
        let mut info = Self::new();
        if let Err(e) = info.build(platform, driver, alloc, instance, device, config) {
            error!("presentation setup stopped at {:?}: {e}", info.stage);
            info.stage = SurfaceStage::Failed(e);
        }
        info
    }

    fn build<P>(
        &mut self,
        platform: &mut P,
        driver: &Rc<D>,
        alloc: &AllocatorRef,
        instance: &OwnedInstance<D>,
        device: &DeviceInfo<D>,
        config: &BootstrapConfig,
    ) -> Result<(), BootstrapError>
    where
        P: Platform<Window = W>,
    {
        // 1) Window, then a surface bound to it.
        let window = platform.create_window(&config.window).map_err(|e| {
            error!("window creation: {e}");
            BootstrapError::SurfaceCreationFailed
        })?;
        let handles = window.raw_handles();
        let framebuffer = window.framebuffer_size();
        self.window = Some(window);
        self.stage = SurfaceStage::WindowCreated;

        let (display, raw_window) = handles.map_err(|e| {
            error!("window handles: {e}");
            BootstrapError::SurfaceCreationFailed
        })?;
        let surface = driver
            .create_surface(instance.handle(), display, raw_window)
            .map_err(|e| {
                error!("surface creation: {e}");
                BootstrapError::SurfaceCreationFailed
            })?;
        // SAFETY: freshly created under `instance`.
        self.surface = Some(unsafe { Owned::adopt(driver.clone(), instance.handle(), surface) });
        self.stage = SurfaceStage::SurfaceBound;

        // 2) Pixel format.
        let physical = device.physical();
        let formats = driver
            .surface_formats(physical, surface, alloc)
            .map_err(|_| BootstrapError::SurfaceFormatNotFound)?;
        let format = choose_surface_format(&formats, config.preferred_format)
            .ok_or(BootstrapError::SurfaceFormatNotFound)?;
        if !same_format(format, config.preferred_format) {
            warn!(
                "preferred surface format {:?}/{:?} not offered; using {:?}/{:?}",
                config.preferred_format.format,
                config.preferred_format.color_space,
                format.format,
                format.color_space
            );
        }
        drop(formats);
        self.format = format;
        self.stage = SurfaceStage::FormatChosen;

        // 3-5) Extent, image count, present mode.
        let caps = driver
            .surface_capabilities(physical, surface)
            .map_err(|e| {
                error!("surface capabilities: {e}");
                BootstrapError::SurfaceCreationFailed
            })?;
        let extent = choose_extent(&caps, framebuffer);
        let image_count = choose_image_count(&caps);

        let modes = driver
            .present_modes(physical, surface, alloc)
            .map_err(|_| BootstrapError::PresentModeNotFound)?;
        if modes.is_empty() {
            return Err(BootstrapError::PresentModeNotFound);
        }
        let present_mode = choose_present_mode(&modes, config.vsync);
        drop(modes);

        // 6) Swapchain.
        let swapchain_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.current_transform)
            .composite_alpha(choose_composite_alpha(caps.supported_composite_alpha))
            .present_mode(present_mode)
            .clipped(true);
        let swapchain = driver
            .create_swapchain(device.handle(), &swapchain_info)
            .map_err(|e| {
                error!("vkCreateSwapchainKHR: {e}");
                BootstrapError::SwapchainCreationFailed(e)
            })?;
        // SAFETY: freshly created under `device`.
        self.swapchain = Some(unsafe { Owned::adopt(driver.clone(), device.handle(), swapchain) });
        self.extent = extent;
        self.present_mode = present_mode;
        self.stage = SurfaceStage::SwapchainBuilt;

        // 7) Images.
        let images = driver
            .swapchain_images(device.handle(), swapchain, alloc)
            .map_err(|e| {
                error!("vkGetSwapchainImagesKHR: {e}");
                BootstrapError::SwapchainImagesNotFound
            })?;
        if images.is_empty() {
            return Err(BootstrapError::SwapchainImagesNotFound);
        }
        debug!("swapchain holds {} image(s), requested {}", images.len(), image_count);
        self.images = Some(images);
        self.stage = SurfaceStage::ImagesRetrieved;

        // 8) One view per image.
        let images = self.images.as_deref().unwrap_or_default();
        let views = create_views(driver, alloc, device.handle(), format.format, images)?;
        self.views = Some(views);
        self.stage = SurfaceStage::Ready;

        info!(
            "swapchain ready ({}x{}, {:?}, {:?}, {} image(s))",
            extent.width,
            extent.height,
            format.format,
            present_mode,
            self.image_count()
        );
        Ok(())
    }

    pub fn stage(&self) -> SurfaceStage {
        self.stage
    }

    pub fn is_ready(&self) -> bool {
        self.stage == SurfaceStage::Ready
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.as_ref().map_or(0, |i| i.len())
    }

    pub fn images(&self) -> &[vk::Image] {
        self.images.as_deref().unwrap_or_default()
    }

    pub fn image_views(&self) -> impl Iterator<Item = vk::ImageView> + '_ {
        self.views.iter().flat_map(|v| v.iter().map(Owned::handle))
    }

    pub fn swapchain(&self) -> Option<vk::SwapchainKHR> {
        self.swapchain.as_ref().map(Owned::handle)
    }

    pub fn surface(&self) -> Option<vk::SurfaceKHR> {
        self.surface.as_ref().map(Owned::handle)
    }

    pub fn window(&self) -> Option<&W> {
        self.window.as_ref()
    }
}

impl<D: Driver, W: PlatformWindow> Default for SurfaceInfo<D, W> {
    fn default() -> Self {
        Self::new()
    }
}

fn create_views<D: Driver>(
    driver: &Rc<D>,
    alloc: &AllocatorRef,
    device: vk::Device,
    format: vk::Format,
    images: &[vk::Image],
) -> Result<List<OwnedImageView<D>>, BootstrapError> {
    let mut views = List::with_capacity(alloc.clone(), images.len())?;
    for (index, &image) in images.iter().enumerate() {
        let info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        // Views already in the list are released when it drops on error.
        let view = driver.create_image_view(device, &info).map_err(|result| {
            error!("image view {index}: {result}");
            BootstrapError::ImageViewCreationFailed { index, result }
        })?;
        // SAFETY: freshly created under `device`.
        views.push(unsafe { Owned::adopt(driver.clone(), device, view) })?;
    }
    Ok(views)
}

fn same_format(a: vk::SurfaceFormatKHR, b: vk::SurfaceFormatKHR) -> bool {
    a.format == b.format && a.color_space == b.color_space
}

/// Exact match for `preferred`, else the first reported format.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    preferred: vk::SurfaceFormatKHR,
) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|&f| same_format(f, preferred))
        .or_else(|| formats.first().copied())
}

pub fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: VsyncMode) -> vk::PresentModeKHR {
    match vsync {
        VsyncMode::Mailbox if modes.contains(&vk::PresentModeKHR::MAILBOX) => {
            vk::PresentModeKHR::MAILBOX
        }
        // FIFO support is guaranteed.
        _ => vk::PresentModeKHR::FIFO,
    }
}

/// The surface's fixed extent when it has one, else the framebuffer size,
/// clamped into the supported range on each axis.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, framebuffer: (u32, u32)) -> vk::Extent2D {
    let (width, height) = if caps.current_extent.width != u32::MAX {
        (caps.current_extent.width, caps.current_extent.height)
    } else {
        framebuffer
    };
    vk::Extent2D {
        width: clamp_axis(width, caps.min_image_extent.width, caps.max_image_extent.width),
        height: clamp_axis(height, caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

fn clamp_axis(value: u32, min: u32, max: u32) -> u32 {
    value.max(min).min(max.max(min))
}

/// One more than the minimum, bounded by the maximum unless that is 0
/// (unbounded).
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count.saturating_add(1);
    if caps.max_image_count > 0 && wanted > caps.max_image_count {
        caps.max_image_count
    } else {
        wanted
    }
}

pub fn choose_composite_alpha(supported: vk::CompositeAlphaFlagsKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::INHERIT,
    ]
    .into_iter()
    .find(|&a| supported.contains(a))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}
