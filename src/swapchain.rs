//! Swapchain State Machine
//!
//! Owns the display session, layer, vsync event, producer client, and
//! framebuffer pool, and cycles buffer slots through acquire/present
//! states. Lifecycle:
//!
//! ```text
//! Uninitialized -> Initializing -> Ready -> Exiting -> Uninitialized
//! ```
//!
//! Initialization is atomic: any failure unwinds every resource acquired
//! so far, in reverse order, and leaves the machine exactly as it
//! started. The acquisition stages are recorded in the `Option`/flag
//! fields below; `unwind` walks them back and each step tolerates its
//! stage never having run.
//!
//! Single-threaded by contract: every call is a blocking round trip and
//! the `&mut self` receivers give one caller exclusive access.

use std::sync::OnceLock;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::PresentConfig;
use crate::error::{PresentError, Result};
use crate::parcel;
use crate::producer::{BufferProducer, QueueSubmission};
use crate::service::{
    ConnectApi, DisplayHandle, DisplayService, FramebufferPool, GraphicsBackend, LayerHandle,
    ScalingMode, VsyncHandle,
};

/// Monotonic tick stamped into every queue submission.
fn monotonic_ticks() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = *EPOCH.get_or_init(Instant::now);
    Instant::now().duration_since(epoch).as_nanos() as u64
}

/// Buffer-queue manager for one display layer
pub(crate) struct Swapchain {
    service: Box<dyn DisplayService>,
    backend: Box<dyn GraphicsBackend>,

    ready: bool,

    // Acquisition stages, in order. `unwind` releases them in reverse.
    display: Option<DisplayHandle>,
    vsync: Option<VsyncHandle>,
    layer: Option<LayerHandle>,
    producer: Option<BufferProducer>,
    backend_up: bool,
    pool: Option<FramebufferPool>,

    total_slots: u32,
    current_slot: u32,
    current_producer_slot: Option<i32>,
    slot_registered: Vec<bool>,
    double_buffered: bool,

    format: u32,
    usage: u32,
}

impl Swapchain {
    pub(crate) fn new(service: Box<dyn DisplayService>, backend: Box<dyn GraphicsBackend>) -> Self {
        Self {
            service,
            backend,
            ready: false,
            display: None,
            vsync: None,
            layer: None,
            producer: None,
            backend_up: false,
            pool: None,
            total_slots: 2,
            current_slot: 0,
            current_producer_slot: None,
            slot_registered: Vec::new(),
            double_buffered: true,
            format: 0,
            usage: 0,
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.ready
    }

    pub(crate) fn total_slots(&self) -> u32 {
        self.total_slots
    }

    pub(crate) fn current_slot(&self) -> u32 {
        self.current_slot
    }

    pub(crate) fn current_producer_slot(&self) -> Option<i32> {
        self.current_producer_slot
    }

    pub(crate) fn double_buffered(&self) -> bool {
        self.double_buffered
    }

    pub(crate) fn set_double_buffering(&mut self, enabled: bool) {
        self.double_buffered = enabled;
    }

    pub(crate) fn pool(&self) -> Option<&FramebufferPool> {
        if self.ready { self.pool.as_ref() } else { None }
    }

    /// Bring the pipeline to Ready. Idempotent: a second call while Ready
    /// succeeds without touching the service.
    pub(crate) fn init(&mut self, config: &PresentConfig) -> Result<()> {
        if self.ready {
            return Ok(());
        }
        if config.total_slots == 0 || !config.total_slots.is_power_of_two() {
            return Err(PresentError::BadSlotCount(config.total_slots));
        }

        self.total_slots = config.total_slots;
        self.slot_registered = vec![false; config.total_slots as usize];
        // Advances to 0 on the first dequeue.
        self.current_slot = config.total_slots - 1;
        self.current_producer_slot = None;
        self.double_buffered = true;
        self.format = config.format;
        self.usage = config.usage;

        match self.try_init(config) {
            Ok(()) => {
                self.ready = true;
                info!(
                    "Presentation pipeline ready on display {:?} ({} slots)",
                    config.display_name, self.total_slots
                );
                Ok(())
            }
            Err(e) => {
                debug!("Init failed, rolling back: {}", e);
                self.unwind();
                Err(e)
            }
        }
    }

    fn try_init(&mut self, config: &PresentConfig) -> Result<()> {
        debug!("Opening display {:?}", config.display_name);
        let display = self.service.open_display(&config.display_name)?;
        self.display = Some(display);

        let vsync = self.service.get_vsync_event(&display)?;
        self.vsync = Some(vsync);

        let (layer, descriptor) =
            self.service
                .open_layer(&display, config.layer_flags, config.layer_id.unwrap_or(0))?;
        self.layer = Some(layer);

        self.service
            .set_layer_scaling_mode(&layer, ScalingMode::Default)?;

        let window_id = parcel::decode_window_id(&descriptor)?;
        debug!("Layer open, native window id {}", window_id);

        let channel = self.service.open_producer(window_id)?;
        let mut producer = BufferProducer::new(channel, window_id);

        self.backend.init(config.transfer_mem_size)?;
        self.backend_up = true;

        producer.connect(ConnectApi::Cpu)?;
        self.producer = Some(producer);

        let pool = self.backend.framebuffer()?;
        let needed = pool.slot_size * self.total_slots as usize;
        if pool.len < needed {
            return Err(PresentError::transport(format!(
                "framebuffer pool is {} bytes, need {}",
                pool.len, needed
            )));
        }
        self.pool = Some(pool);

        // Warm-up cycle: run every slot once through dequeue/request/queue
        // so the compositor allocates its side of the pool. No pixel
        // content is valid yet.
        for _ in 0..self.total_slots {
            self.dequeue_next()?;
            let slot = self
                .current_producer_slot
                .ok_or_else(|| PresentError::transport("dequeue returned no slot"))?;
            self.register_slot(slot)?;

            let queued = self.queue_held();
            self.current_producer_slot = None;
            queued?;
        }

        // Leave one buffer acquired for the caller.
        self.dequeue_next()?;

        // Settling delay: the display needs two vblank periods before the
        // first real present is safe.
        for _ in 0..2 {
            self.vsync_cycle()?;
        }

        Ok(())
    }

    /// Present the held slot and acquire the next one.
    ///
    /// A failure here is unrecoverable: the queue cannot be resynchronized
    /// mid-frame, so the error is surfaced and nothing is retried.
    pub(crate) fn swap_buffers(&mut self) -> Result<()> {
        if !self.ready {
            return Err(PresentError::NotReady);
        }
        if !self.double_buffered {
            // Single-buffer mode: the caller keeps rendering into the
            // same slot and nothing crosses the producer channel.
            self.current_producer_slot = None;
            return Ok(());
        }

        self.queue_held()?;
        self.current_producer_slot = None;
        self.dequeue_next()
    }

    /// Block until the next vblank strictly after this call.
    pub(crate) fn wait_for_vsync(&mut self) -> Result<()> {
        if !self.ready {
            return Err(PresentError::NotReady);
        }
        self.vsync_cycle()
    }

    /// Flush the data cache over the currently-held slot.
    pub(crate) fn flush_held_slot(&mut self) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Err(PresentError::NotReady);
        };
        let slot_size = pool.slot_size;
        let offset = self.current_slot as usize * slot_size;
        self.backend.flush_cache(offset, slot_size);
        Ok(())
    }

    /// Resolution query straight to the display service; independent of
    /// swapchain state beyond needing the open display.
    pub(crate) fn display_resolution(&mut self) -> Result<(u64, u64)> {
        let Some(display) = self.display else {
            return Err(PresentError::NotReady);
        };
        self.service.display_resolution(&display)
    }

    /// Tear the pipeline down. No-op unless Ready.
    pub(crate) fn exit(&mut self) {
        if !self.ready {
            return;
        }
        info!("Shutting down presentation pipeline");
        self.ready = false;
        self.unwind();
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Clear-then-wait on the vsync event. The clear discards a stale
    /// signal from a previous frame; a pulse landing between clear and
    /// wait is an accepted missed wakeup.
    fn vsync_cycle(&mut self) -> Result<()> {
        let Some(event) = self.vsync else {
            return Err(PresentError::NotReady);
        };
        self.service.clear_event(&event)?;
        self.service.wait_event(&event)
    }

    /// Acquire the next slot from the producer and advance the pool index.
    fn dequeue_next(&mut self) -> Result<()> {
        let Some(pool) = self.pool.as_ref() else {
            return Err(PresentError::NotReady);
        };
        let (width, height) = (pool.width, pool.height);
        let Some(producer) = self.producer.as_mut() else {
            return Err(PresentError::NotReady);
        };

        let slot = producer.dequeue(width, height, self.format, self.usage)?;
        self.current_producer_slot = Some(slot);
        self.current_slot = (self.current_slot + 1) & (self.total_slots - 1);
        Ok(())
    }

    /// Queue the held slot back to the compositor, stamped with the
    /// current tick. No-op when nothing is held.
    fn queue_held(&mut self) -> Result<()> {
        let Some(slot) = self.current_producer_slot else {
            return Ok(());
        };
        let Some(producer) = self.producer.as_mut() else {
            return Err(PresentError::NotReady);
        };
        producer.queue_buffer(slot, &QueueSubmission::with_timestamp(monotonic_ticks()))
    }

    /// Confirm a dequeued slot with the compositor and remember that it
    /// must be detached on teardown.
    fn register_slot(&mut self, slot: i32) -> Result<()> {
        let idx = usize::try_from(slot)
            .ok()
            .filter(|i| *i < self.slot_registered.len())
            .ok_or_else(|| {
                PresentError::transport(format!("producer returned slot {slot} outside pool"))
            })?;
        let Some(producer) = self.producer.as_mut() else {
            return Err(PresentError::NotReady);
        };
        producer.request_buffer(slot)?;
        self.slot_registered[idx] = true;
        Ok(())
    }

    /// Release everything in reverse acquisition order and reset state.
    ///
    /// Serves both init rollback and teardown. Every step is idempotent;
    /// failures are logged and skipped so later stages still release.
    fn unwind(&mut self) {
        if let Err(e) = self.queue_held() {
            warn!("Unwind: failed to return held buffer: {}", e);
        }
        self.current_producer_slot = None;

        if let Some(producer) = self.producer.as_mut() {
            for slot in 0..self.slot_registered.len() {
                if !self.slot_registered[slot] {
                    continue;
                }
                if let Err(e) = producer.detach_buffer(slot as i32) {
                    warn!("Unwind: failed to detach slot {}: {}", slot, e);
                }
            }
            if producer.is_connected() {
                if let Err(e) = producer.disconnect() {
                    warn!("Unwind: producer disconnect failed: {}", e);
                }
            }
        }

        if self.backend_up {
            self.backend.exit();
            self.backend_up = false;
        }

        // Dropping the client releases the binder session.
        self.producer = None;
        self.pool = None;

        if let Some(layer) = self.layer.take() {
            if let Err(e) = self.service.close_layer(layer) {
                warn!("Unwind: failed to close layer: {}", e);
            }
        }
        if let Some(event) = self.vsync.take() {
            if let Err(e) = self.service.close_event(event) {
                warn!("Unwind: failed to close vsync event: {}", e);
            }
        }
        if let Some(display) = self.display.take() {
            if let Err(e) = self.service.close_display(display) {
                warn!("Unwind: failed to close display: {}", e);
            }
        }

        self.slot_registered.clear();
        self.current_slot = 0;
        self.double_buffered = true;
        self.ready = false;
    }
}
