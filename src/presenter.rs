//! Presentation API
//!
//! `Presenter` is the public surface of the pipeline: one
//! explicitly-constructed context object owning the swapchain, with the
//! display service and graphics backend injected at construction. There
//! is no hidden global state; tests run several presenters side by side.

use tracing::debug;

use crate::config::PresentConfig;
use crate::error::{PresentError, Result};
use crate::service::{DisplayService, GraphicsBackend};
use crate::swapchain::Swapchain;

/// View of the currently-held framebuffer slot.
///
/// The pointer stays valid until the next successful `swap_buffers` (the
/// held slot changes) or `exit` (the pool is unmapped). The caller writes
/// pixels through it and must call `flush_caches` before presenting on
/// hardware without coherent display DMA.
#[derive(Debug, Clone, Copy)]
pub struct Framebuffer {
    /// Base address of the held slot
    pub ptr: *mut u8,
    /// Bytes in the slot
    pub len: usize,
    /// Fixed surface width
    pub width: u32,
    /// Fixed surface height
    pub height: u32,
}

/// Double-buffered presentation pipeline to a remote compositor
pub struct Presenter {
    chain: Swapchain,
}

impl Presenter {
    /// Build a presenter over the given display service and graphics
    /// backend. No remote calls happen until [`Self::init`].
    pub fn new(service: Box<dyn DisplayService>, backend: Box<dyn GraphicsBackend>) -> Self {
        Self {
            chain: Swapchain::new(service, backend),
        }
    }

    /// Open the display path and prime the buffer pool. Returns success
    /// without touching the service if already initialized. On failure
    /// every partially-acquired resource has been released.
    pub fn init(&mut self, config: &PresentConfig) -> Result<()> {
        self.chain.init(config)
    }

    /// Tear the pipeline down. Safe to call at any time; does nothing if
    /// not initialized.
    pub fn exit(&mut self) {
        self.chain.exit();
    }

    /// Block until the next vertical blank strictly after this call.
    pub fn wait_for_vsync(&mut self) -> Result<()> {
        self.chain.wait_for_vsync()
    }

    /// Present the held buffer and acquire the next one. With double
    /// buffering disabled this is a no-op and the caller keeps the same
    /// slot. Errors are fatal to presentation; do not retry.
    pub fn swap_buffers(&mut self) -> Result<()> {
        self.chain.swap_buffers()
    }

    /// Base address and resolution of the slot the caller should render
    /// into right now.
    pub fn framebuffer(&self) -> Result<Framebuffer> {
        let Some(pool) = self.chain.pool() else {
            return Err(PresentError::NotReady);
        };
        let offset = self.chain.current_slot() as usize * pool.slot_size;
        // Offset is in bounds: init validated len >= total_slots * slot_size
        // and current_slot stays below total_slots.
        let ptr = unsafe { pool.base.add(offset) };
        Ok(Framebuffer {
            ptr,
            len: pool.slot_size,
            width: pool.width,
            height: pool.height,
        })
    }

    /// Toggle double buffering. Takes effect on the next `swap_buffers`;
    /// no flush required.
    pub fn set_double_buffering(&mut self, enabled: bool) {
        debug!("Double buffering {}", if enabled { "on" } else { "off" });
        self.chain.set_double_buffering(enabled);
    }

    /// Flush the data cache over the currently-held slot's byte range.
    pub fn flush_caches(&mut self) -> Result<()> {
        self.chain.flush_held_slot()
    }

    /// Ask the display service for the display's resolution. Independent
    /// of swapchain state; requires an open display.
    pub fn display_resolution(&mut self) -> Result<(u64, u64)> {
        self.chain.display_resolution()
    }

    /// Whether the pipeline is initialized and presentable.
    pub fn is_ready(&self) -> bool {
        self.chain.is_ready()
    }

    /// Pool index of the slot the caller renders into.
    pub fn current_slot(&self) -> u32 {
        self.chain.current_slot()
    }

    /// Compositor-side slot currently held, if any. `None` outside
    /// double-buffered operation.
    pub fn current_producer_slot(&self) -> Option<i32> {
        self.chain.current_producer_slot()
    }

    /// Configured number of buffer slots.
    pub fn total_slots(&self) -> u32 {
        self.chain.total_slots()
    }

    /// Whether swap_buffers cycles buffers or no-ops.
    pub fn double_buffered(&self) -> bool {
        self.chain.double_buffered()
    }
}

impl Drop for Presenter {
    fn drop(&mut self) {
        self.chain.exit();
    }
}
