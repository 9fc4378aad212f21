//! In-memory stand-ins for audio devices, shared by the engine and session tests.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::engine::callback::{Completion, CompletionHandler};
use crate::models::audio_models::{AudioFormat, CaptureSource};
use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::CaptureState;
use crate::processing::buffer_pool::CaptureBuffer;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::endpoint::{InputDevice, Packet, PolledEndpoint};

pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("dual_capture_test_{}_{}", std::process::id(), name))
}

// ---------------------------------------------------------------------------
// Polled endpoint
// ---------------------------------------------------------------------------

struct MockPacket {
    data: Vec<u8>,
    silent: bool,
    discontinuity: bool,
}

struct EndpointState {
    format: AudioFormat,
    packets: VecDeque<MockPacket>,
    in_flight: bool,
    fail_open: Option<CaptureError>,
    fail_start: Option<CaptureError>,
    fail_polls: u32,
    open_delay: Duration,
    opened: bool,
    close_count: usize,
}

/// Loopback endpoint fed from the test thread. Clones share state.
#[derive(Clone)]
pub struct MockEndpoint {
    state: Arc<Mutex<EndpointState>>,
}

impl MockEndpoint {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            state: Arc::new(Mutex::new(EndpointState {
                format,
                packets: VecDeque::new(),
                in_flight: false,
                fail_open: None,
                fail_start: None,
                fail_polls: 0,
                open_delay: Duration::ZERO,
                opened: false,
                close_count: 0,
            })),
        }
    }

    fn enqueue(&self, data: Vec<u8>, silent: bool, discontinuity: bool) {
        self.state.lock().packets.push_back(MockPacket {
            data,
            silent,
            discontinuity,
        });
    }

    pub fn push(&self, data: Vec<u8>) {
        self.enqueue(data, false, false);
    }

    /// Queue a packet flagged silent. Its payload is garbage the engine must ignore.
    pub fn push_silent(&self, data: Vec<u8>) {
        self.enqueue(data, true, false);
    }

    pub fn push_discontinuity(&self, data: Vec<u8>) {
        self.enqueue(data, false, true);
    }

    pub fn fail_open(&self, error: CaptureError) {
        self.state.lock().fail_open = Some(error);
    }

    pub fn fail_start(&self, error: CaptureError) {
        self.state.lock().fail_start = Some(error);
    }

    /// Make `open` block for `delay` before succeeding.
    pub fn delay_open(&self, delay: Duration) {
        self.state.lock().open_delay = delay;
    }

    /// Make the next `count` polls return an error.
    pub fn fail_polls(&self, count: u32) {
        self.state.lock().fail_polls = count;
    }

    pub fn opened(&self) -> bool {
        self.state.lock().opened
    }

    pub fn closed(&self) -> bool {
        self.state.lock().close_count > 0
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().close_count
    }

    /// Wait until every queued packet has been handed to the engine.
    pub fn wait_until_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            {
                let state = self.state.lock();
                if state.packets.is_empty() && !state.in_flight {
                    return true;
                }
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }
}

impl PolledEndpoint for MockEndpoint {
    fn open(&mut self) -> Result<AudioFormat, CaptureError> {
        let delay = self.state.lock().open_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let mut state = self.state.lock();
        if let Some(e) = state.fail_open.take() {
            return Err(e);
        }
        state.opened = true;
        Ok(state.format)
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        match self.state.lock().fail_start.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn next_packet_frames(&mut self) -> Result<u32, CaptureError> {
        let mut state = self.state.lock();
        if state.fail_polls > 0 {
            state.fail_polls -= 1;
            return Err(CaptureError::EndpointUnavailable("device invalidated".into()));
        }
        let block_align = state.format.block_align() as usize;
        Ok(state
            .packets
            .front()
            .map_or(0, |p| (p.data.len() / block_align) as u32))
    }

    fn read_packet(&mut self, sink: &mut dyn FnMut(&Packet<'_>)) -> Result<(), CaptureError> {
        let (packet, block_align) = {
            let mut state = self.state.lock();
            let Some(packet) = state.packets.pop_front() else {
                return Ok(());
            };
            state.in_flight = true;
            (packet, state.format.block_align() as usize)
        };

        sink(&Packet {
            data: &packet.data,
            frames: (packet.data.len() / block_align) as u32,
            silent: packet.silent,
            discontinuity: packet.discontinuity,
        });

        self.state.lock().in_flight = false;
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().close_count += 1;
    }
}

// ---------------------------------------------------------------------------
// Callback input device
// ---------------------------------------------------------------------------

/// A buffer the fake driver currently owns.
struct Slot {
    id: usize,
    data: *mut u8,
    capacity: usize,
}

// The pool keeps the storage alive and unmoved while a slot is queued.
unsafe impl Send for Slot {}

#[derive(Default)]
struct DeviceState {
    handler: Option<Arc<CompletionHandler>>,
    queued: VecDeque<Slot>,
    open: bool,
    halted: bool,
    submits: usize,
    closes: usize,
    halt_payload: usize,
    halt_completions: Vec<Completion>,
    fail_open: Option<CaptureError>,
    fail_submit_at: Option<(usize, CaptureError)>,
    fail_start: Option<CaptureError>,
    fail_resubmit: bool,
}

/// Microphone device whose "driver thread" is whichever test thread calls
/// `deliver`. Clones share state.
#[derive(Clone, Default)]
pub struct MockInputDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockInputDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `data` into the oldest queued buffer and complete it, resubmitting
    /// on `Requeue`. Returns `None` when the device holds no buffer.
    pub fn deliver(&self, data: &[u8]) -> Option<Completion> {
        let (slot, handler) = {
            let mut state = self.state.lock();
            let handler = state.handler.clone()?;
            let slot = state.queued.pop_front()?;
            (slot, handler)
        };

        let len = data.len().min(slot.capacity);
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), slot.data, len) };
        let completion = handler.on_buffer_filled(slot.id, len);

        if completion == Completion::Requeue {
            let mut state = self.state.lock();
            if state.fail_resubmit {
                drop(state);
                handler.on_resubmit_failed(slot.id, CaptureError::EndpointUnavailable("resubmit refused".into()));
            } else if state.open {
                state.queued.push_back(slot);
            }
        }
        Some(completion)
    }

    pub fn handler(&self) -> Option<Arc<CompletionHandler>> {
        self.state.lock().handler.clone()
    }

    pub fn queued_len(&self) -> usize {
        self.state.lock().queued.len()
    }

    pub fn submit_count(&self) -> usize {
        self.state.lock().submits
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn halted(&self) -> bool {
        self.state.lock().halted
    }

    /// Bytes each buffer reports when `halt` flushes it back.
    pub fn set_halt_payload(&self, bytes: usize) {
        self.state.lock().halt_payload = bytes;
    }

    pub fn halt_completions(&self) -> Vec<Completion> {
        self.state.lock().halt_completions.clone()
    }

    pub fn fail_open(&self, error: CaptureError) {
        self.state.lock().fail_open = Some(error);
    }

    /// Fail the `index`-th initial submit.
    pub fn fail_submit_at(&self, index: usize, error: CaptureError) {
        self.state.lock().fail_submit_at = Some((index, error));
    }

    pub fn fail_start(&self, error: CaptureError) {
        self.state.lock().fail_start = Some(error);
    }

    pub fn fail_resubmit(&self, fail: bool) {
        self.state.lock().fail_resubmit = fail;
    }
}

impl InputDevice for MockInputDevice {
    fn open(&mut self, _format: &AudioFormat, handler: Arc<CompletionHandler>) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if let Some(e) = state.fail_open.take() {
            return Err(e);
        }
        state.open = true;
        state.handler = Some(handler);
        Ok(())
    }

    fn submit(&mut self, buffer: &mut CaptureBuffer) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if matches!(&state.fail_submit_at, Some((index, _)) if *index == state.submits) {
            if let Some((_, e)) = state.fail_submit_at.take() {
                return Err(e);
            }
        }
        state.submits += 1;
        state.queued.push_back(Slot {
            id: buffer.id(),
            data: buffer.as_mut_ptr(),
            capacity: buffer.capacity(),
        });
        Ok(())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        match self.state.lock().fail_start.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn halt(&mut self) {
        let (slots, handler, payload) = {
            let mut state = self.state.lock();
            if !state.open {
                return;
            }
            state.halted = true;
            let slots: Vec<Slot> = state.queued.drain(..).collect();
            (slots, state.handler.clone(), state.halt_payload)
        };

        let Some(handler) = handler else {
            return;
        };
        for slot in slots {
            let completion = handler.on_buffer_filled(slot.id, payload.min(slot.capacity));
            self.state.lock().halt_completions.push(completion);
        }
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        if !state.open {
            return;
        }
        state.open = false;
        state.handler = None;
        state.queued.clear();
        state.closes += 1;
    }
}

// ---------------------------------------------------------------------------
// Delegate
// ---------------------------------------------------------------------------

/// Delegate that remembers everything it was told.
#[derive(Default)]
pub struct RecordingDelegate {
    buffers: AtomicUsize,
    silent: AtomicUsize,
    discontinuities: AtomicUsize,
    states: Mutex<Vec<(CaptureSource, CaptureState)>>,
    errors: Mutex<Vec<(CaptureSource, CaptureError)>>,
    finished: Mutex<Vec<RecordingResult>>,
}

impl RecordingDelegate {
    pub fn buffer_count(&self) -> usize {
        self.buffers.load(Ordering::SeqCst)
    }

    pub fn silent_count(&self) -> usize {
        self.silent.load(Ordering::SeqCst)
    }

    pub fn discontinuity_count(&self) -> usize {
        self.discontinuities.load(Ordering::SeqCst)
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn states(&self, source: CaptureSource) -> Vec<CaptureState> {
        self.states
            .lock()
            .iter()
            .filter(|(s, _)| *s == source)
            .map(|(_, state)| *state)
            .collect()
    }

    pub fn finished(&self) -> Vec<RecordingResult> {
        self.finished.lock().clone()
    }
}

impl CaptureDelegate for RecordingDelegate {
    fn on_state_changed(&self, source: CaptureSource, state: CaptureState) {
        self.states.lock().push((source, state));
    }

    fn on_buffer(&self, _source: CaptureSource, _bytes: usize, silent: bool) {
        self.buffers.fetch_add(1, Ordering::SeqCst);
        if silent {
            self.silent.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_discontinuity(&self, _source: CaptureSource) {
        self.discontinuities.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, source: CaptureSource, error: &CaptureError) {
        self.errors.lock().push((source, error.clone()));
    }

    fn on_capture_finished(&self, result: &RecordingResult) {
        self.finished.lock().push(result.clone());
    }
}
