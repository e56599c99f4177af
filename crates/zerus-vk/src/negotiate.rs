// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_char, CStr, CString};

use tracing::{debug, error, warn};
use zerus_core::{AllocError, AllocatorRef, List};

use crate::config::BootstrapConfig;
use crate::driver::Driver;
use crate::error::BootstrapError;

pub type ExtensionList = List<CString>;

/// Builds the instance extension list: platform names, then configured
/// extras, then debug-utils when validation is on. Duplicates are dropped.
///
/// Fails before any instance exists if validation is requested but the
/// layer is not installed.
pub fn negotiate<D: Driver>(
    driver: &D,
    alloc: &AllocatorRef,
    platform_extensions: &[&CStr],
    config: &BootstrapConfig,
) -> Result<ExtensionList, BootstrapError> {
    if config.validation {
        ensure_layer(driver, alloc, &config.validation_layer)?;
    }

    let requested = platform_extensions
        .iter()
        .copied()
        .chain(config.extra_instance_extensions.iter().map(CString::as_c_str))
        .chain(config.validation.then_some(ash::ext::debug_utils::NAME));

    let mut names = ExtensionList::new(alloc.clone());
    for name in requested {
        if names.iter().any(|n| n.as_c_str() == name) {
            continue;
        }
        names.push(name.to_owned())?;
    }

    if names.len() > config.max_extension_names {
        return Err(BootstrapError::TooManyExtensions {
            count: names.len(),
            limit: config.max_extension_names,
        });
    }

    debug!("negotiated instance extensions: {:?}", names);
    Ok(names)
}

fn ensure_layer<D: Driver>(
    driver: &D,
    alloc: &AllocatorRef,
    wanted: &CStr,
) -> Result<(), BootstrapError> {
    let layers = driver.instance_layers(alloc).map_err(|e| {
        warn!("instance layer enumeration failed: {e}");
        BootstrapError::ValidationLayerUnavailable
    })?;

    let found = layers
        .iter()
        .any(|l| l.layer_name_as_c_str().is_ok_and(|n| n == wanted));
    if !found {
        error!(
            "{:?} requested but not among {} installed layer(s)",
            wanted,
            layers.len()
        );
        return Err(BootstrapError::ValidationLayerUnavailable);
    }
    Ok(())
}

/// Pointer array for a create-info, sized to the list.
pub fn name_pointers(names: &[CString], alloc: &AllocatorRef) -> Result<List<*const c_char>, AllocError> {
    let mut ptrs = List::with_capacity(alloc.clone(), names.len())?;
    for name in names {
        ptrs.push(name.as_ptr())?;
    }
    Ok(ptrs)
}
