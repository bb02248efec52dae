//! Refill worker.
//!
//! The platform calls the drain callback on its audio thread. The callback
//! only posts a [`DrainEvent`] into a bounded channel; decoding and copying
//! happen on a dedicated worker thread, which keeps the audio thread free of
//! locks and decoder work.

use super::adapter::Shared;
use super::stats::StatsCounters;
use crate::output::{BufferId, DrainCallback};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use modplay_common::{BUFFER_COUNT, ModuleDecoder};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{trace, warn};

/// Capacity of the drain channel. At most `BUFFER_COUNT` buffers are in
/// flight per session; the slack absorbs drains from a retiring queue.
pub(crate) const DRAIN_QUEUE_CAPACITY: usize = BUFFER_COUNT * 4;

/// A buffer finished playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DrainEvent {
    /// Session generation the buffer was queued under.
    pub generation: u64,
    pub buffer: BufferId,
}

pub(crate) enum WorkerMessage {
    Drained(DrainEvent),
    Shutdown,
}

/// Build the callback handed to the platform queue for one generation.
pub(crate) fn drain_callback(
    tx: Sender<WorkerMessage>,
    generation: u64,
    stats: Arc<StatsCounters>,
) -> DrainCallback {
    Arc::new(move |buffer| {
        let event = DrainEvent { generation, buffer };
        match tx.try_send(WorkerMessage::Drained(event)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => stats.dropped_drain(),
            Err(TrySendError::Disconnected(_)) => {}
        }
    })
}

/// Spawn the worker that turns drain events into refills.
pub(crate) fn spawn<D: ModuleDecoder + 'static>(
    shared: Arc<Shared<D>>,
    rx: Receiver<WorkerMessage>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("modplay-refill".into())
        .spawn(move || run_refill_loop(&shared, &rx))
}

fn run_refill_loop<D: ModuleDecoder>(shared: &Shared<D>, rx: &Receiver<WorkerMessage>) {
    for message in rx.iter() {
        match message {
            WorkerMessage::Drained(event) => {
                let outcome = shared.refill(Some(event.generation), event.buffer);
                trace!(buffer = %event.buffer, ?outcome, "drain handled");
            }
            WorkerMessage::Shutdown => return,
        }
    }
    warn!("drain channel closed without shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn callback_tags_generation() {
        let (tx, rx) = bounded(2);
        let stats = Arc::new(StatsCounters::default());
        let callback = drain_callback(tx, 7, Arc::clone(&stats));

        callback(BufferId(2));
        match rx.try_recv().unwrap() {
            WorkerMessage::Drained(event) => {
                assert_eq!(
                    event,
                    DrainEvent {
                        generation: 7,
                        buffer: BufferId(2)
                    }
                );
            }
            WorkerMessage::Shutdown => panic!("unexpected shutdown"),
        }
    }

    #[test]
    fn callback_never_blocks_when_full() {
        let (tx, _rx) = bounded(1);
        let stats = Arc::new(StatsCounters::default());
        let callback = drain_callback(tx, 0, Arc::clone(&stats));

        callback(BufferId(0));
        callback(BufferId(1));
        callback(BufferId(2));
        assert_eq!(stats.snapshot().dropped_drains, 2);
    }
}
