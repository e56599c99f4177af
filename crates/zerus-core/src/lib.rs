// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]

pub mod alloc;
pub mod list;

pub use alloc::{
    AllocError, AllocStats, AllocatorRef, ArenaAllocator, HostAllocator, SystemAllocator,
    TrackingAllocator,
};
pub use list::List;

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}
