// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Windowing layer consumed by the bootstrap core.

use std::ffi::CStr;

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use thiserror::Error;

mod desktop;

pub use desktop::WinitPlatform;
pub use winit;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowDesc {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowDesc {
    fn default() -> Self {
        WindowDesc {
            title: "Zerus".to_owned(),
            width: 800,
            height: 600,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformStatus {
    Continue,
    ShouldClose,
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("window creation: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("raw handle: {0}")]
    Handle(#[from] raw_window_handle::HandleError),
    #[error("required instance extensions unavailable: {0}")]
    Extensions(String),
    #[error("event loop never resumed; no window could be created")]
    NotResumed,
    #[error("event loop exited with code {0}")]
    Exited(i32),
}

pub trait PlatformWindow {
    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), PlatformError>;
    /// Current drawable size in physical pixels.
    fn framebuffer_size(&self) -> (u32, u32);
}

pub trait Platform {
    type Window: PlatformWindow;

    /// Instance extensions the platform needs for presenting to its windows.
    fn required_extensions(&self) -> Result<Vec<&'static CStr>, PlatformError>;

    fn create_window(&mut self, desc: &WindowDesc) -> Result<Self::Window, PlatformError>;

    /// Processes pending events, waiting at most the platform's idle wait.
    /// The desktop platform's idle wait is zero unless configured.
    fn pump_events(&mut self) -> PlatformStatus;
}
