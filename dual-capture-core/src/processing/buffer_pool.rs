use crate::models::error::CaptureError;

/// Ownership state of a pooled buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferState {
    /// Owned by the application, not submitted.
    Free,
    /// Submitted to the driver, awaiting fill.
    Queued,
    /// Returned by the driver, waiting to be drained.
    Filled,
}

/// A fixed-size block the driver records into.
///
/// The storage is boxed so its address stays put for as long as the driver
/// holds a pointer to it, even if the owning `Vec` reallocates.
#[derive(Debug)]
pub struct CaptureBuffer {
    id: usize,
    storage: Box<[u8]>,
    state: BufferState,
    bytes_filled: usize,
}

impl CaptureBuffer {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn bytes_filled(&self) -> usize {
        self.bytes_filled
    }

    /// Bytes the driver recorded on its last fill.
    pub fn filled(&self) -> &[u8] {
        &self.storage[..self.bytes_filled]
    }

    /// Pointer handed to the driver when the buffer is registered.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.storage.as_mut_ptr()
    }
}

/// Fixed set of capture buffers cycled between driver and application.
///
/// ```text
/// Free ──mark_queued──▶ Queued ──mark_filled──▶ Filled
///   ▲                     ▲                        │
///   │                     └────────requeue─────────┤
///   └──────────────────────release─────────────────┘
/// ```
///
/// Illegal transitions are rejected so a driver that reports the same buffer
/// twice cannot make the engine append it twice.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Vec<CaptureBuffer>,
}

impl BufferPool {
    pub fn new(count: usize, buffer_size: usize) -> Self {
        let buffers = (0..count)
            .map(|id| CaptureBuffer {
                id,
                storage: vec![0u8; buffer_size].into_boxed_slice(),
                state: BufferState::Free,
                bytes_filled: 0,
            })
            .collect();
        Self { buffers }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&CaptureBuffer> {
        self.buffers.get(id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut CaptureBuffer> {
        self.buffers.get_mut(id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CaptureBuffer> {
        self.buffers.iter_mut()
    }

    /// Number of buffers currently in `state`.
    pub fn count_in(&self, state: BufferState) -> usize {
        self.buffers.iter().filter(|b| b.state == state).count()
    }

    /// Free → Queued, after the buffer has been handed to the driver.
    pub fn mark_queued(&mut self, id: usize) -> Result<(), CaptureError> {
        let buffer = self.transition(id, &[BufferState::Free], "queue")?;
        buffer.state = BufferState::Queued;
        buffer.bytes_filled = 0;
        Ok(())
    }

    /// Queued → Filled, when the driver reports `bytes` recorded.
    pub fn mark_filled(&mut self, id: usize, bytes: usize) -> Result<(), CaptureError> {
        let buffer = self.transition(id, &[BufferState::Queued], "fill")?;
        if bytes > buffer.storage.len() {
            return Err(CaptureError::InvalidState(format!(
                "buffer {} reported {} bytes but holds {}",
                id,
                bytes,
                buffer.storage.len()
            )));
        }
        buffer.state = BufferState::Filled;
        buffer.bytes_filled = bytes;
        Ok(())
    }

    /// Filled → Queued, after draining and resubmitting to the driver.
    pub fn requeue(&mut self, id: usize) -> Result<(), CaptureError> {
        let buffer = self.transition(id, &[BufferState::Filled], "requeue")?;
        buffer.state = BufferState::Queued;
        buffer.bytes_filled = 0;
        Ok(())
    }

    /// Filled or Queued → Free, when the buffer will not go back to the driver.
    pub fn release(&mut self, id: usize) -> Result<(), CaptureError> {
        let buffer = self.transition(id, &[BufferState::Filled, BufferState::Queued], "release")?;
        buffer.state = BufferState::Free;
        buffer.bytes_filled = 0;
        Ok(())
    }

    /// Return every buffer to Free once the driver has let go of all of them.
    pub fn release_all(&mut self) {
        for buffer in &mut self.buffers {
            buffer.state = BufferState::Free;
            buffer.bytes_filled = 0;
        }
    }

    fn transition(
        &mut self,
        id: usize,
        allowed: &[BufferState],
        action: &str,
    ) -> Result<&mut CaptureBuffer, CaptureError> {
        let buffer = self
            .buffers
            .get_mut(id)
            .ok_or_else(|| CaptureError::InvalidState(format!("unknown buffer {}", id)))?;
        if !allowed.contains(&buffer.state) {
            return Err(CaptureError::InvalidState(format!(
                "cannot {} buffer {} in state {:?}",
                action, id, buffer.state
            )));
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pool_is_all_free() {
        let pool = BufferPool::new(4, 4096);
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.count_in(BufferState::Free), 4);
        assert!(pool.get(3).is_some_and(|b| b.capacity() == 4096));
        assert!(pool.get(4).is_none());
    }

    #[test]
    fn full_cycle() {
        let mut pool = BufferPool::new(2, 16);
        pool.mark_queued(0).unwrap();
        pool.mark_queued(1).unwrap();
        assert_eq!(pool.count_in(BufferState::Queued), 2);

        pool.mark_filled(0, 12).unwrap();
        assert_eq!(pool.get(0).unwrap().state(), BufferState::Filled);
        assert_eq!(pool.get(0).unwrap().bytes_filled(), 12);
        assert_eq!(pool.get(0).unwrap().filled().len(), 12);

        pool.requeue(0).unwrap();
        assert_eq!(pool.get(0).unwrap().state(), BufferState::Queued);
        assert_eq!(pool.get(0).unwrap().bytes_filled(), 0);

        pool.mark_filled(1, 16).unwrap();
        pool.release(1).unwrap();
        assert_eq!(pool.count_in(BufferState::Free), 1);
        assert_eq!(pool.count_in(BufferState::Queued), 1);
    }

    #[test]
    fn double_fill_is_rejected() {
        let mut pool = BufferPool::new(1, 16);
        pool.mark_queued(0).unwrap();
        pool.mark_filled(0, 8).unwrap();
        assert!(matches!(pool.mark_filled(0, 8), Err(CaptureError::InvalidState(_))));
    }

    #[test]
    fn fill_without_queue_is_rejected() {
        let mut pool = BufferPool::new(1, 16);
        assert!(pool.mark_filled(0, 8).is_err());
        assert!(pool.requeue(0).is_err());
        assert!(pool.release(0).is_err());
    }

    #[test]
    fn overfill_is_rejected() {
        let mut pool = BufferPool::new(1, 16);
        pool.mark_queued(0).unwrap();
        assert!(pool.mark_filled(0, 17).is_err());
        assert_eq!(pool.get(0).unwrap().state(), BufferState::Queued);
    }

    #[test]
    fn unknown_id_is_rejected() {
        let mut pool = BufferPool::new(2, 16);
        assert!(pool.mark_queued(9).is_err());
    }

    #[test]
    fn storage_address_is_stable() {
        let mut pool = BufferPool::new(3, 64);
        let before: Vec<*mut u8> = pool.iter_mut().map(|b| b.as_mut_ptr()).collect();
        pool.mark_queued(1).unwrap();
        pool.release_all();
        let after: Vec<*mut u8> = pool.iter_mut().map(|b| b.as_mut_ptr()).collect();
        assert_eq!(before, after);
        assert_eq!(pool.count_in(BufferState::Free), 3);
    }
}
