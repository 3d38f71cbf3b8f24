//! flipqueue: double-buffered presentation pipeline client
//!
//! Manages the buffer handoff between an application and a remote
//! display compositor: opens a display and layer, negotiates a shared
//! buffer pool with the compositor's buffer queue, cycles slots through
//! acquire/present states, and synchronizes with the display's vertical
//! blank.
//!
//! The remote side is abstracted behind the [`DisplayService`] and
//! [`GraphicsBackend`] traits; a [`Presenter`] drives one swapchain over
//! them:
//!
//! ```no_run
//! # fn demo(service: Box<dyn flipqueue::DisplayService>,
//! #         backend: Box<dyn flipqueue::GraphicsBackend>) -> flipqueue::Result<()> {
//! use flipqueue::{PresentConfig, Presenter};
//!
//! let mut presenter = Presenter::new(service, backend);
//! presenter.init(&PresentConfig::default())?;
//!
//! loop {
//!     let fb = presenter.framebuffer()?;
//!     // ... write pixels through fb.ptr ...
//!     presenter.flush_caches()?;
//!     presenter.swap_buffers()?;
//!     presenter.wait_for_vsync()?;
//! }
//! # }
//! ```
//!
//! Single-threaded, synchronous, blocking: every operation is one round
//! trip or one unbounded wait, with no internal retries, timeouts, or
//! background threads.

pub mod config;
pub mod error;
pub mod parcel;
pub mod presenter;
pub mod producer;
pub mod service;

mod swapchain;

pub use config::{LayerFlags, PresentConfig};
pub use error::{PresentError, Result};
pub use presenter::{Framebuffer, Presenter};
pub use producer::{BufferProducer, QueueSubmission, QUEUE_SUBMISSION_LEN};
pub use service::{
    ConnectApi, DisplayHandle, DisplayService, FramebufferPool, GraphicsBackend, LayerHandle,
    ProducerChannel, ScalingMode, VsyncHandle,
};
