//! Thread-shareable device handle.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::chunk::RegisterChunk;
use crate::device::{ChipDevice, ChipState};

/// Device behind an `Arc<Mutex<_>>`.
///
/// The audio thread drives it through [`ChipDevice`]; other threads clone the
/// handle and poll [`ChipDevice::state`] for visualization.
pub struct SharedDevice<D> {
    inner: Arc<Mutex<D>>,
}

impl<D: ChipDevice> SharedDevice<D> {
    /// Wrap `device`.
    pub fn new(device: D) -> Self {
        Self {
            inner: Arc::new(Mutex::new(device)),
        }
    }

    /// Run `f` with exclusive access to the device.
    pub fn with<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl<D> Clone for SharedDevice<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: ChipDevice> ChipDevice for SharedDevice<D> {
    fn reset(&mut self) {
        self.inner.lock().reset();
    }

    fn render_data(&mut self, chunk: &RegisterChunk) {
        self.inner.lock().render_data(chunk);
    }

    fn render_till(&mut self, end: u64) -> Vec<f32> {
        self.inner.lock().render_till(end)
    }

    fn state(&self) -> ChipState {
        self.inner.lock().state()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.lock().sample_rate()
    }
}
