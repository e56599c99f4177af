// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use zerus_core::{init_tracing, AllocStats, AllocatorRef, ArenaAllocator, SystemAllocator, TrackingAllocator};
use zerus_platform::WinitPlatform;
use zerus_vk::{AshDriver, Context};

mod config;

use config::{AllocatorKind, AppCfg, Overrides};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file; missing means defaults
    #[arg(long, default_value = "zerus.toml")]
    config: PathBuf,

    /// Force the validation layer on
    #[arg(long, overrides_with = "no_validation")]
    validation: bool,

    /// Force the validation layer off
    #[arg(long, overrides_with = "validation")]
    no_validation: bool,

    /// Host allocator for bootstrap bookkeeping
    #[arg(long, value_enum)]
    allocator: Option<AllocatorKind>,

    /// Report host allocator usage after shutdown
    #[arg(long)]
    trace_alloc: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        let validation = match (self.validation, self.no_validation) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        Overrides {
            validation,
            allocator: self.allocator,
        }
    }
}

/// Host allocator with counters, whichever backing was chosen.
enum HostAlloc {
    System(Rc<TrackingAllocator<SystemAllocator>>),
    Arena(Rc<TrackingAllocator<ArenaAllocator>>),
}

impl HostAlloc {
    fn new(kind: AllocatorKind, arena_capacity: usize) -> Self {
        match kind {
            AllocatorKind::System => HostAlloc::System(Rc::new(TrackingAllocator::new(SystemAllocator))),
            AllocatorKind::Arena => {
                let arena = if arena_capacity > 0 {
                    ArenaAllocator::with_capacity(arena_capacity)
                } else {
                    ArenaAllocator::new()
                };
                HostAlloc::Arena(Rc::new(TrackingAllocator::new(arena)))
            }
        }
    }

    fn handle(&self) -> AllocatorRef {
        match self {
            HostAlloc::System(a) => a.clone(),
            HostAlloc::Arena(a) => a.clone(),
        }
    }

    fn stats(&self) -> AllocStats {
        match self {
            HostAlloc::System(a) => a.stats(),
            HostAlloc::Arena(a) => a.stats(),
        }
    }

    fn report(&self) {
        let s = self.stats();
        info!(
            "host allocator: {} live block(s), {} live byte(s), {} block(s) total, peak {} byte(s)",
            s.live_blocks, s.live_bytes, s.total_blocks, s.peak_bytes
        );
        if let HostAlloc::Arena(a) = self {
            info!("arena reserved {} byte(s)", a.inner().allocated_bytes());
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut cfg = AppCfg::load(&args.config)?;
    cfg.apply(args.overrides());
    let boot = cfg.bootstrap_config()?;
    info!(
        "starting '{}' (validation={}, vsync={:?}, allocator={:?})",
        cfg.window.title, boot.validation, boot.vsync, cfg.host.allocator
    );

    let host = HostAlloc::new(cfg.host.allocator, cfg.host.arena_capacity);
    let platform = WinitPlatform::new()?.with_idle_wait(Duration::from_millis(cfg.host.idle_wait_ms));
    let driver = Rc::new(AshDriver::new());

    let mut ctx = Context::init(boot, host.handle(), driver, platform);
    if let Some(e) = ctx.error() {
        error!("bootstrap failed: {e}");
        drop(ctx);
        if args.trace_alloc {
            host.report();
        }
        return Err(e.into());
    }

    if let Some(dev) = ctx.device() {
        info!("running on '{}'", dev.name());
    }
    ctx.start();

    if args.trace_alloc {
        host.report();
    }
    Ok(())
}
