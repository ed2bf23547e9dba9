//! Output surfaces.

use std::sync::atomic::{AtomicU64, Ordering};

use shutter_ipc::Size;

/// Opaque handle to an output sink the device can render into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(u64);

impl SurfaceHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Hands out surface handles for outputs the engine allocates itself.
#[derive(Debug)]
pub struct SurfaceAllocator {
    next: AtomicU64,
}

impl SurfaceAllocator {
    /// Create an allocator whose first handle is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn allocate(&self) -> SurfaceHandle {
        SurfaceHandle(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SurfaceAllocator {
    fn default() -> Self {
        Self::starting_at(1_000)
    }
}

/// The preview output, owned by whoever displays the stream.
pub trait PreviewSurface: Send + Sync {
    /// Current size of the view the stream is shown in.
    fn output_size(&self) -> Size;

    /// The sink the device renders into.
    fn handle(&self) -> SurfaceHandle;

    /// Tell the surface which stream size was chosen.
    fn set_stream_size(&self, size: Size);
}
