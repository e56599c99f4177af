// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CStr;
use std::time::Duration;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use tracing::{debug, info};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    error::OsError,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowId},
};

use crate::{Platform, PlatformError, PlatformStatus, PlatformWindow, WindowDesc};

// Resumed normally arrives on the first pump; this bounds the wait.
const WINDOW_PUMP_LIMIT: usize = 64;

/// winit event loop driven by `pump_app_events`, one pump per `update`.
///
/// Must be created on the main thread, at most once per process.
pub struct WinitPlatform {
    event_loop: EventLoop<()>,
    pump: Pump,
    idle_wait: Duration,
}

#[derive(Default)]
struct Pump {
    resumed: bool,
    pending: Option<WindowDesc>,
    created: Option<Result<Window, OsError>>,
    close_requested: bool,
}

impl Pump {
    fn try_create(&mut self, event_loop: &ActiveEventLoop) {
        let Some(desc) = self.pending.take() else {
            return;
        };
        let attrs = Window::default_attributes()
            .with_title(desc.title)
            .with_inner_size(LogicalSize::new(desc.width, desc.height));
        self.created = Some(event_loop.create_window(attrs));
    }
}

impl ApplicationHandler for Pump {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        self.resumed = true;
        self.try_create(event_loop);
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let WindowEvent::CloseRequested = event {
            info!("CloseRequested");
            self.close_requested = true;
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.resumed {
            self.try_create(event_loop);
        }
    }
}

impl WinitPlatform {
    pub fn new() -> Result<Self, PlatformError> {
        let event_loop = EventLoop::new()?;
        Ok(Self {
            event_loop,
            pump: Pump::default(),
            idle_wait: Duration::ZERO,
        })
    }

    /// Longest time `pump_events` may wait for an event. Zero never blocks.
    pub fn with_idle_wait(mut self, wait: Duration) -> Self {
        self.idle_wait = wait;
        self
    }

    fn pump_once(&mut self, wait: Duration) -> PumpStatus {
        self.event_loop.pump_app_events(Some(wait), &mut self.pump)
    }
}

impl Platform for WinitPlatform {
    type Window = Window;

    fn required_extensions(&self) -> Result<Vec<&'static CStr>, PlatformError> {
        let display = self.event_loop.display_handle()?.as_raw();
        let names = ash_window::enumerate_required_extensions(display)
            .map_err(|e| PlatformError::Extensions(e.to_string()))?;
        // SAFETY: ash-window hands back pointers to static NUL-terminated names.
        Ok(names.iter().map(|&p| unsafe { CStr::from_ptr(p) }).collect())
    }

    fn create_window(&mut self, desc: &WindowDesc) -> Result<Window, PlatformError> {
        self.pump.pending = Some(desc.clone());
        for attempt in 0..WINDOW_PUMP_LIMIT {
            if let PumpStatus::Exit(code) = self.pump_once(Duration::ZERO) {
                self.pump.pending = None;
                return Err(PlatformError::Exited(code));
            }
            if let Some(created) = self.pump.created.take() {
                let window = created?;
                debug!("window created after {} pump(s)", attempt + 1);
                return Ok(window);
            }
        }
        self.pump.pending = None;
        Err(PlatformError::NotResumed)
    }

    fn pump_events(&mut self) -> PlatformStatus {
        let status = self.pump_once(self.idle_wait);
        if self.pump.close_requested || matches!(status, PumpStatus::Exit(_)) {
            PlatformStatus::ShouldClose
        } else {
            PlatformStatus::Continue
        }
    }
}

impl PlatformWindow for Window {
    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), PlatformError> {
        let dh = self.display_handle()?.as_raw();
        let wh = self.window_handle()?.as_raw();
        Ok((dh, wh))
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.inner_size();
        (size.width, size.height)
    }
}
