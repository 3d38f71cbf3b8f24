//! Display Service Interface
//!
//! The transport session to the remote compositor lives behind the
//! [`DisplayService`] trait so the swapchain can be driven against a real
//! connection or a fake one in tests. The trait mirrors the narrow
//! surface the swapchain actually needs: display and layer lifecycle,
//! the vsync event, the resolution query, and a binder-style producer
//! channel bound to a native window identifier.
//!
//! [`GraphicsBackend`] is the second collaborator: it owns the shared
//! framebuffer memory and data-cache maintenance for it.

use crate::config::LayerFlags;
use crate::error::Result;

/// Opaque handle to an open display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayHandle(pub u64);

/// Opaque handle to an open layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerHandle(pub u64);

/// Waitable handle for the display's vertical-blank event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VsyncHandle(pub u32);

/// Layer scaling applied by the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalingMode {
    #[default]
    Default,
    FitToLayer,
}

/// Producer API a client connects with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ConnectApi {
    /// CPU-rendered buffers
    Cpu = 2,
}

/// Session to the remote display service.
///
/// Every method is a synchronous round trip; failures are surfaced
/// verbatim as [`crate::PresentError::Transport`]. Close operations are
/// best-effort: the swapchain logs and ignores their failures during
/// unwind.
pub trait DisplayService {
    fn open_display(&mut self, name: &str) -> Result<DisplayHandle>;
    fn close_display(&mut self, display: DisplayHandle) -> Result<()>;

    /// Open a layer on the display. Returns the layer handle and the
    /// vendor-serialized native window descriptor blob.
    fn open_layer(
        &mut self,
        display: &DisplayHandle,
        flags: LayerFlags,
        layer_id: u64,
    ) -> Result<(LayerHandle, Vec<u8>)>;
    fn close_layer(&mut self, layer: LayerHandle) -> Result<()>;
    fn set_layer_scaling_mode(&mut self, layer: &LayerHandle, mode: ScalingMode) -> Result<()>;

    /// Obtain the display's vsync event. Exactly one per display.
    fn get_vsync_event(&mut self, display: &DisplayHandle) -> Result<VsyncHandle>;
    /// Reset the event to unsignaled.
    fn clear_event(&mut self, event: &VsyncHandle) -> Result<()>;
    /// Block until the event signals. No timeout.
    fn wait_event(&mut self, event: &VsyncHandle) -> Result<()>;
    fn close_event(&mut self, event: VsyncHandle) -> Result<()>;

    fn display_resolution(&mut self, display: &DisplayHandle) -> Result<(u64, u64)>;

    /// Open a binder-style producer channel bound to the given native
    /// window identifier. The channel is released by dropping it.
    fn open_producer(&mut self, window_id: i32) -> Result<Box<dyn ProducerChannel>>;
}

/// Raw producer channel to the compositor's buffer queue.
///
/// The [`crate::producer::BufferProducer`] client sits on top of this and
/// owns the wire encoding; the channel just moves requests. `dequeue` may
/// block indefinitely until the compositor frees a slot.
pub trait ProducerChannel {
    fn connect(&mut self, api: ConnectApi) -> Result<()>;
    fn disconnect(&mut self, api: ConnectApi) -> Result<()>;
    fn dequeue(&mut self, width: u32, height: u32, format: u32, usage: u32) -> Result<i32>;
    fn request(&mut self, slot: i32) -> Result<()>;
    fn queue(&mut self, slot: i32, payload: &[u8]) -> Result<()>;
    fn detach(&mut self, slot: i32) -> Result<()>;
}

/// Contiguous framebuffer memory shared with the compositor
#[derive(Debug, Clone, Copy)]
pub struct FramebufferPool {
    /// Base of the mapped region
    pub base: *mut u8,
    /// Total mapped bytes
    pub len: usize,
    /// Bytes per buffer slot
    pub slot_size: usize,
    /// Fixed surface width advertised by the backend
    pub width: u32,
    /// Fixed surface height advertised by the backend
    pub height: u32,
}

/// Graphics backend owning the framebuffer pool
pub trait GraphicsBackend {
    /// Bring the backend up with the given transfer-memory budget.
    fn init(&mut self, transfer_mem_size: usize) -> Result<()>;
    /// Map and describe the framebuffer pool. Valid until [`Self::exit`].
    fn framebuffer(&mut self) -> Result<FramebufferPool>;
    /// Flush the data cache over `len` bytes starting at `offset` into
    /// the pool. Needed before presenting CPU-written pixels on
    /// non-coherent display hardware.
    fn flush_cache(&mut self, offset: usize, len: usize);
    /// Release the pool and shut the backend down. Idempotent.
    fn exit(&mut self);
}
