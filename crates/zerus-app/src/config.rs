// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CString;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;
use zerus_platform::WindowDesc;
use zerus_vk::{BootstrapConfig, VsyncMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AllocatorKind {
    #[default]
    System,
    Arena,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VsyncCfg {
    Fifo,
    #[default]
    Mailbox,
}

impl From<VsyncCfg> for VsyncMode {
    fn from(v: VsyncCfg) -> Self {
        match v {
            VsyncCfg::Fifo => VsyncMode::Fifo,
            VsyncCfg::Mailbox => VsyncMode::Mailbox,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        let d = WindowDesc::default();
        WindowCfg {
            title: d.title,
            width: d.width,
            height: d.height,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VulkanCfg {
    pub app_name: String,
    /// Unset follows the build profile.
    pub validation: Option<bool>,
    pub vsync_mode: VsyncCfg,
    pub extra_instance_extensions: Vec<String>,
    /// Unset keeps the built-in list.
    pub device_extensions: Option<Vec<String>>,
    pub max_extension_names: usize,
}

impl Default for VulkanCfg {
    fn default() -> Self {
        VulkanCfg {
            app_name: "Zerus".to_owned(),
            validation: None,
            vsync_mode: VsyncCfg::default(),
            extra_instance_extensions: Vec::new(),
            device_extensions: None,
            max_extension_names: 256,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HostCfg {
    pub allocator: AllocatorKind,
    /// Initial arena chunk in bytes; 0 lets the arena grow on demand.
    pub arena_capacity: usize,
    /// Upper bound on how long one update waits for window events; 0 never blocks.
    pub idle_wait_ms: u64,
}

impl Default for HostCfg {
    fn default() -> Self {
        HostCfg {
            allocator: AllocatorKind::System,
            arena_capacity: 0,
            idle_wait_ms: 0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct AppCfg {
    #[serde(default)]
    pub window: WindowCfg,
    #[serde(default)]
    pub vulkan: VulkanCfg,
    #[serde(default)]
    pub host: HostCfg,
}

/// Command-line overrides applied on top of the file.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub validation: Option<bool>,
    pub allocator: Option<AllocatorKind>,
}

impl AppCfg {
    /// A missing file means defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(s) => Self::parse(&s).with_context(|| format!("parsing {}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("{} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn apply(&mut self, o: Overrides) {
        if let Some(v) = o.validation {
            self.vulkan.validation = Some(v);
        }
        if let Some(a) = o.allocator {
            self.host.allocator = a;
        }
    }

    pub fn bootstrap_config(&self) -> Result<BootstrapConfig> {
        let mut cfg = BootstrapConfig {
            app_name: cstring(&self.vulkan.app_name)?,
            vsync: self.vulkan.vsync_mode.into(),
            max_extension_names: self.vulkan.max_extension_names,
            extra_instance_extensions: cstrings(&self.vulkan.extra_instance_extensions)?,
            window: WindowDesc {
                title: self.window.title.clone(),
                width: self.window.width,
                height: self.window.height,
            },
            ..BootstrapConfig::default()
        };
        if let Some(v) = self.vulkan.validation {
            cfg.validation = v;
        }
        if let Some(names) = &self.vulkan.device_extensions {
            cfg.device_extensions = cstrings(names)?;
        }
        Ok(cfg)
    }
}

fn cstring(s: &str) -> Result<CString> {
    CString::new(s).with_context(|| format!("{s:?} contains a NUL byte"))
}

fn cstrings(names: &[String]) -> Result<Vec<CString>> {
    names.iter().map(|n| cstring(n)).collect()
}
