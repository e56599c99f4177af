// SPDX-License-Identifier: CEPL-1.0
use std::rc::Rc;

use tracing::{debug, error, info};
use zerus_core::AllocatorRef;
use zerus_platform::{Platform, PlatformStatus};

use crate::config::BootstrapConfig;
use crate::device::{select_device, DeviceInfo};
use crate::driver::Driver;
use crate::error::BootstrapError;
use crate::instance::{create_instance, register_diagnostics, DiagnosticsStatus};
use crate::negotiate::{negotiate, ExtensionList};
use crate::owned::{OwnedDebugMessenger, OwnedInstance};
use crate::surface::{SurfaceInfo, SurfaceStage};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Continue,
    ShouldClose,
}

/// Everything the bootstrap built, owned in one place.
///
/// Fields are declared in teardown order: presentation objects, then the
/// window system, then the device, the debug messenger and the instance.
pub struct Context<D: Driver, P: Platform> {
    surface: Option<SurfaceInfo<D, P::Window>>,
    platform: Option<P>,
    device: Option<DeviceInfo<D>>,
    debug_messenger: Option<OwnedDebugMessenger<D>>,
    instance: Option<OwnedInstance<D>>,
    extensions: Option<ExtensionList>,

    initialized: bool,
    error: Option<BootstrapError>,
    diagnostics: DiagnosticsStatus,
    config: BootstrapConfig,
    driver: Rc<D>,
    allocator: AllocatorRef,
}

impl<D: Driver, P: Platform> Context<D, P> {
    /// Runs every bootstrap stage in order and stops at the first failure.
    ///
    /// The result is never half-initialized silently: either
    /// [`Context::is_initialized`] is true, or [`Context::error`] names the
    /// stage that failed and the objects built before it are still held.
    pub fn init(config: BootstrapConfig, allocator: AllocatorRef, driver: Rc<D>, mut platform: P) -> Self {
        let mut ctx = Self {
            surface: None,
            platform: None,
            device: None,
            debug_messenger: None,
            instance: None,
            extensions: None,
            initialized: false,
            error: None,
            diagnostics: DiagnosticsStatus::Disabled,
            config,
            driver,
            allocator,
        };
        let outcome = ctx.bootstrap(&mut platform);
        ctx.platform = Some(platform);
        match outcome {
            Ok(()) => {
                ctx.initialized = true;
                info!("bootstrap complete");
            }
            Err(e) => {
                error!("bootstrap failed: {e}");
                ctx.error = Some(e);
            }
        }
        ctx
    }

    /// Like [`Context::init`], but partial state is released on failure.
    pub fn try_init(
        config: BootstrapConfig,
        allocator: AllocatorRef,
        driver: Rc<D>,
        platform: P,
    ) -> Result<Self, BootstrapError> {
        let ctx = Self::init(config, allocator, driver, platform);
        if let Some(e) = ctx.error {
            return Err(e);
        }
        Ok(ctx)
    }

    fn bootstrap(&mut self, platform: &mut P) -> Result<(), BootstrapError> {
        let platform_extensions = platform.required_extensions().map_err(|e| {
            error!("{e}");
            BootstrapError::PlatformExtensionsUnavailable
        })?;

        let extensions = negotiate(&*self.driver, &self.allocator, &platform_extensions, &self.config)?;
        let extensions = self.extensions.insert(extensions);

        let instance = create_instance(&self.driver, &self.allocator, &self.config, extensions)?;
        let instance = self.instance.insert(instance);

        if self.config.validation {
            let (messenger, status) = register_diagnostics(&self.driver, instance);
            self.debug_messenger = messenger;
            self.diagnostics = status;
        }

        let device = select_device(&self.driver, &self.allocator, instance, &self.config)?;
        let device = self.device.insert(device);

        let surface: SurfaceInfo<D, P::Window> = SurfaceInfo::create(
            platform,
            &self.driver,
            &self.allocator,
            instance,
            device,
            &self.config,
        );
        let stage = surface.stage();
        self.surface = Some(surface);
        match stage {
            SurfaceStage::Failed(e) => Err(e),
            _ => Ok(()),
        }
    }

    /// Processes pending window events once, waiting at most the platform's
    /// idle wait.
    pub fn update(&mut self) -> Status {
        match self.platform.as_mut().map(P::pump_events) {
            Some(PlatformStatus::Continue) => Status::Continue,
            Some(PlatformStatus::ShouldClose) | None => Status::ShouldClose,
        }
    }

    /// Releases everything held, children before parents. Calling it again
    /// does nothing.
    pub fn shutdown(&mut self) {
        let held = self.holds_anything();
        if held {
            debug!("shutting down bootstrap context");
        }
        drop(self.surface.take());
        drop(self.platform.take());
        drop(self.device.take());
        drop(self.debug_messenger.take());
        drop(self.instance.take());
        drop(self.extensions.take());
        self.initialized = false;
        if held {
            info!("bootstrap context released");
        }
    }

    /// Runs the event loop until a close is requested, then shuts down.
    pub fn start(&mut self) {
        let mut frames: u64 = 0;
        while self.update() == Status::Continue {
            frames += 1;
        }
        debug!("event loop stopped after {frames} update(s)");
        self.shutdown();
    }

    fn holds_anything(&self) -> bool {
        self.surface.is_some()
            || self.platform.is_some()
            || self.device.is_some()
            || self.debug_messenger.is_some()
            || self.instance.is_some()
            || self.extensions.is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn error(&self) -> Option<BootstrapError> {
        self.error
    }

    pub fn diagnostics(&self) -> DiagnosticsStatus {
        self.diagnostics
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    pub fn allocator(&self) -> &AllocatorRef {
        &self.allocator
    }

    pub fn enabled_extensions(&self) -> &[std::ffi::CString] {
        self.extensions.as_deref().unwrap_or_default()
    }

    pub fn instance(&self) -> Option<ash::vk::Instance> {
        self.instance.as_ref().map(|i| i.handle())
    }

    pub fn device(&self) -> Option<&DeviceInfo<D>> {
        self.device.as_ref()
    }

    pub fn surface(&self) -> Option<&SurfaceInfo<D, P::Window>> {
        self.surface.as_ref()
    }

    pub fn platform(&self) -> Option<&P> {
        self.platform.as_ref()
    }
}

impl<D: Driver, P: Platform> Drop for Context<D, P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
