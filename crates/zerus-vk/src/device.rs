// SPDX-License-Identifier: CEPL-1.0
use std::rc::Rc;

use ash::vk;
use tracing::{debug, error, info, warn};
use zerus_core::{AllocatorRef, List};

use crate::config::BootstrapConfig;
use crate::driver::Driver;
use crate::error::BootstrapError;
use crate::negotiate::name_pointers;
use crate::owned::{Owned, OwnedDevice, OwnedInstance};

const DEFAULT_QUEUE_PRIORITY: f32 = 1.0;

/// Which queue families the logical device is built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueuePlan {
    pub graphics: u32,
    /// Dedicated compute family; `None` means compute shares graphics.
    pub compute: Option<u32>,
}

impl QueuePlan {
    /// First graphics-capable family, plus the first compute-capable family
    /// when it is a different index.
    pub fn from_families(families: &[vk::QueueFamilyProperties]) -> Result<Self, BootstrapError> {
        if families.is_empty() {
            return Err(BootstrapError::QueueFamilyNotFound);
        }
        let first_with = |flag: vk::QueueFlags| {
            families
                .iter()
                .position(|f| f.queue_flags.contains(flag))
                .map(|i| i as u32)
        };

        let graphics =
            first_with(vk::QueueFlags::GRAPHICS).ok_or(BootstrapError::GraphicsQueueNotFound)?;
        let compute = first_with(vk::QueueFlags::COMPUTE).filter(|&c| c != graphics);
        Ok(Self { graphics, compute })
    }

    /// Distinct family indices, graphics first.
    pub fn families(&self) -> impl Iterator<Item = u32> {
        std::iter::once(self.graphics).chain(self.compute)
    }
}

/// Index of the first discrete GPU, in enumeration order.
pub fn pick_discrete<I>(types: I) -> Option<usize>
where
    I: IntoIterator<Item = vk::PhysicalDeviceType>,
{
    types
        .into_iter()
        .position(|t| t == vk::PhysicalDeviceType::DISCRETE_GPU)
}

pub struct DeviceInfo<D: Driver> {
    physical: vk::PhysicalDevice,
    name: String,
    device_type: vk::PhysicalDeviceType,
    queues: QueuePlan,
    graphics_queue: vk::Queue,
    compute_queue: vk::Queue,
    device: OwnedDevice<D>,
}

impl<D: Driver> DeviceInfo<D> {
    pub fn physical(&self) -> vk::PhysicalDevice {
        self.physical
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device_type(&self) -> vk::PhysicalDeviceType {
        self.device_type
    }

    pub fn queues(&self) -> QueuePlan {
        self.queues
    }

    pub fn handle(&self) -> vk::Device {
        self.device.handle()
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Equals [`DeviceInfo::graphics_queue`] when there is no dedicated
    /// compute family.
    pub fn compute_queue(&self) -> vk::Queue {
        self.compute_queue
    }
}

pub fn select_device<D: Driver>(
    driver: &Rc<D>,
    alloc: &AllocatorRef,
    instance: &OwnedInstance<D>,
    config: &BootstrapConfig,
) -> Result<DeviceInfo<D>, BootstrapError> {
    let instance = instance.handle();

    let physicals = driver.physical_devices(instance, alloc).map_err(|e| {
        warn!("physical device enumeration failed: {e}");
        BootstrapError::DeviceNotFound
    })?;
    debug!("{} physical device(s)", physicals.len());

    let mut types = List::with_capacity(alloc.clone(), physicals.len())?;
    for &p in &physicals {
        types.push(driver.physical_device_properties(instance, p).device_type)?;
    }
    let Some(index) = pick_discrete(types.iter().copied()) else {
        error!("no discrete GPU among {} device(s): {:?}", physicals.len(), types);
        return Err(BootstrapError::DeviceNotFound);
    };
    let physical = physicals[index];
    drop(types);
    drop(physicals);

    let props = driver.physical_device_properties(instance, physical);
    let name = props
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    info!("selected discrete GPU #{index} '{name}'");

    let families = driver
        .queue_families(instance, physical, alloc)
        .map_err(|_| BootstrapError::QueueFamilyNotFound)?;
    for (i, f) in families.iter().enumerate() {
        debug!("queue family {i}: {:?} x{}", f.queue_flags, f.queue_count);
    }
    let queues = QueuePlan::from_families(&families)?;
    drop(families);

    let priorities = [DEFAULT_QUEUE_PRIORITY];
    let mut requests = List::with_capacity(alloc.clone(), 2)?;
    for family in queues.families() {
        requests.push(
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(&priorities),
        )?;
    }
    let ext_ptrs = name_pointers(&config.device_extensions, alloc)?;

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&requests)
        .enabled_extension_names(&ext_ptrs);

    let handle = driver
        .create_device(instance, physical, &create_info)
        .map_err(|e| {
            error!("vkCreateDevice: {e}");
            BootstrapError::DeviceCreationFailed(e)
        })?;
    // SAFETY: freshly created by this driver; nobody else holds it.
    let device = unsafe { Owned::adopt(driver.clone(), (), handle) };

    let graphics_queue = driver.device_queue(handle, queues.graphics, 0);
    let compute_queue = match queues.compute {
        Some(family) => driver.device_queue(handle, family, 0),
        None => graphics_queue,
    };
    info!(
        "logical device ready (graphics family {}, compute family {:?})",
        queues.graphics, queues.compute
    );

    Ok(DeviceInfo {
        physical,
        name,
        device_type: props.device_type,
        queues,
        graphics_queue,
        compute_queue,
        device,
    })
}
