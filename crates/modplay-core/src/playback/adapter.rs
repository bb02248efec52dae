//! The playback adapter.
//!
//! Lock order is always session, then decoder. Control calls that only talk
//! to the decoder (seek, skip, channel mute) take the decoder lock alone.

use super::events::{EventPublisher, PlayerEvent};
use super::session::{AudioBuffer, PlaybackSession, SessionState};
use super::stats::{PlaybackStats, StatsCounters};
use super::worker::{self, DRAIN_QUEUE_CAPACITY, WorkerMessage};
use crate::config::PlayerConfig;
use crate::output::{AudioBackend, BufferId, OutputError, PcmFormat};
use crate::{PlayerError, Result};
use crossbeam_channel::{Receiver, Sender, bounded};
use modplay_common::{
    BUFFER_COUNT, ChannelRequest, ChannelState, DecoderError, ModuleDecoder, ModuleInfo,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// What a refill did with a drained buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefillOutcome {
    /// A new frame was copied in and the buffer re-enqueued.
    Requeued,
    /// The frame marked the end of the module; the buffer was not re-enqueued.
    Ended,
    /// No frame could be produced or queued; playback stopped.
    Halted,
    /// The buffer does not belong to the live session.
    Ignored,
}

/// State shared between the adapter handle and the refill worker.
pub(crate) struct Shared<D> {
    decoder: Mutex<D>,
    session: Mutex<PlaybackSession>,
    backend: Arc<dyn AudioBackend>,
    events: EventPublisher,
    stats: Arc<StatsCounters>,
    drain_tx: Sender<WorkerMessage>,
}

impl<D: ModuleDecoder> Shared<D> {
    fn set_state(&self, session: &mut PlaybackSession, state: SessionState) {
        if session.state != state {
            debug!(from = %session.state, to = %state, "session state");
            session.state = state;
            self.events.publish(PlayerEvent::StateChanged(state));
        }
    }

    /// Create the output queue and its buffers. On failure nothing is kept.
    fn initialize_locked(&self, session: &mut PlaybackSession) -> Result<()> {
        session.generation += 1;
        let on_drained = worker::drain_callback(
            self.drain_tx.clone(),
            session.generation,
            Arc::clone(&self.stats),
        );

        let mut queue = match self.backend.create_queue(session.format, on_drained) {
            Ok(queue) => queue,
            Err(err) => {
                error!(%err, "output queue creation failed");
                session.teardown_queue();
                return Err(err.into());
            }
        };

        let mut buffers = Vec::with_capacity(BUFFER_COUNT);
        for index in 0..BUFFER_COUNT {
            match queue.allocate_buffer(session.buffer_byte_size) {
                Ok(id) => buffers.push(AudioBuffer::new(id, session.buffer_byte_size)),
                Err(err) => {
                    error!(index, %err, "buffer allocation failed");
                    queue.dispose();
                    session.teardown_queue();
                    return Err(err.into());
                }
            }
        }

        if let Err(err) = queue.set_volume(session.volume) {
            error!(%err, "setting output volume failed");
            queue.dispose();
            session.teardown_queue();
            return Err(err.into());
        }

        session.buffers = buffers;
        session.queue = Some(queue);
        session.valid = true;
        session.running = false;
        debug!(
            generation = session.generation,
            buffers = BUFFER_COUNT,
            bytes = session.buffer_byte_size,
            "output queue initialized"
        );
        Ok(())
    }

    /// Fill and enqueue every buffer in order, then start rendering.
    fn prime_and_start_locked(&self, session: &mut PlaybackSession, decoder: &mut D) -> Result<()> {
        decoder.start(session.format.sample_rate)?;
        for index in 0..session.buffers.len() {
            self.prime_buffer(session, decoder, index)?;
        }
        session
            .queue
            .as_mut()
            .ok_or(OutputError::Disposed)?
            .start()?;
        Ok(())
    }

    fn prime_buffer(
        &self,
        session: &mut PlaybackSession,
        decoder: &mut D,
        index: usize,
    ) -> Result<()> {
        let info = {
            let frame = decoder.play_frame()?;
            session.buffers[index].fill(frame.bytes());
            frame.info
        };
        self.stats.frame_decoded();
        session.record(&info);
        self.events.publish(PlayerEvent::Frame(info));

        if info.has_looped() {
            return Err(DecoderError::EndOfData.into());
        }

        let PlaybackSession { buffers, queue, .. } = session;
        let buffer = &buffers[index];
        queue
            .as_mut()
            .ok_or(OutputError::Disposed)?
            .enqueue(buffer.id(), buffer.bytes())?;
        self.stats.buffer_enqueued();
        trace!(buffer = %buffer.id(), bytes = buffer.bytes().len(), "primed");
        Ok(())
    }

    fn resume_locked(&self, session: &mut PlaybackSession) -> Result<()> {
        session
            .queue
            .as_mut()
            .ok_or(OutputError::Disposed)?
            .start()?;
        session.running = true;
        self.set_state(session, SessionState::Running);
        Ok(())
    }

    /// Refill a drained buffer with exactly one frame.
    ///
    /// `generation` is the session generation the drain was reported under;
    /// `None` means the caller is acting on the live session.
    pub(crate) fn refill(&self, generation: Option<u64>, buffer: BufferId) -> RefillOutcome {
        let mut session = self.session.lock();
        if generation.is_some_and(|generation| generation != session.generation) {
            self.stats.stale_drain();
            trace!(%buffer, "stale drain ignored");
            return RefillOutcome::Ignored;
        }
        if !session.valid || !session.state.is_active() {
            trace!(%buffer, state = %session.state, "drain outside playback ignored");
            return RefillOutcome::Ignored;
        }
        let Some(index) = session.buffer_index(buffer) else {
            warn!(%buffer, "drain for unknown buffer");
            return RefillOutcome::Ignored;
        };

        let mut decoder = self.decoder.lock();
        let decoded = match decoder.play_frame() {
            Ok(frame) => {
                session.buffers[index].fill(frame.bytes());
                Ok(frame.info)
            }
            Err(err) => Err(err),
        };

        let info = match decoded {
            Ok(info) => info,
            Err(err) => {
                return self.halt(&mut session, &mut decoder, format!("no frame: {err}"));
            }
        };

        self.stats.frame_decoded();
        session.record(&info);
        self.events.publish(PlayerEvent::Frame(info));

        if info.has_looped() {
            info!(loop_count = info.loop_count, "module ended");
            decoder.stop();
            session.retire();
            self.set_state(&mut session, SessionState::Stopped);
            self.events.publish(PlayerEvent::Ended);
            return RefillOutcome::Ended;
        }

        let enqueued = {
            let PlaybackSession { buffers, queue, .. } = &mut *session;
            let buffer = &buffers[index];
            match queue.as_mut() {
                Some(queue) => queue.enqueue(buffer.id(), buffer.bytes()),
                None => Err(OutputError::Disposed),
            }
        };
        match enqueued {
            Ok(()) => {
                self.stats.buffer_enqueued();
                RefillOutcome::Requeued
            }
            Err(err) => self.halt(&mut session, &mut decoder, format!("enqueue failed: {err}")),
        }
    }

    fn halt(&self, session: &mut PlaybackSession, decoder: &mut D, reason: String) -> RefillOutcome {
        warn!(%reason, "playback halted");
        decoder.stop();
        session.retire();
        self.set_state(session, SessionState::Stopped);
        self.events.publish(PlayerEvent::Halted { reason });
        RefillOutcome::Halted
    }

    fn stop_locked(&self, session: &mut PlaybackSession, decoder: &mut D) {
        if session.state == SessionState::Uninitialized && session.queue.is_none() {
            return;
        }
        decoder.stop();
        session.teardown_queue();
        if session.state != SessionState::Uninitialized {
            self.set_state(session, SessionState::Stopped);
        }
    }

    fn dispose_locked(&self, session: &mut PlaybackSession, decoder: &mut D) {
        self.stop_locked(session, decoder);
        session.position = 0;
        session.elapsed_ms = 0;
        self.set_state(session, SessionState::Uninitialized);
    }
}

/// Bridges a module decoder to a platform audio output queue.
///
/// Owns the decoder, the single playback session and the refill worker.
/// All methods take `&self`; the adapter can be shared between a UI thread
/// and anything else that issues transport commands.
pub struct PlaybackAdapter<D: ModuleDecoder + 'static> {
    shared: Arc<Shared<D>>,
    worker: Option<JoinHandle<()>>,
}

impl<D: ModuleDecoder + 'static> PlaybackAdapter<D> {
    /// Create an adapter around `decoder`, rendering through `backend`.
    pub fn new(decoder: D, backend: Arc<dyn AudioBackend>, config: &PlayerConfig) -> Result<Self> {
        config.validate()?;

        let (drain_tx, drain_rx) = bounded(DRAIN_QUEUE_CAPACITY);
        let shared = Arc::new(Shared {
            decoder: Mutex::new(decoder),
            session: Mutex::new(PlaybackSession::new(
                config.format(),
                config.buffer_byte_size,
                config.volume,
            )),
            backend,
            events: EventPublisher::default(),
            stats: Arc::new(StatsCounters::default()),
            drain_tx,
        });
        let worker = worker::spawn(Arc::clone(&shared), drain_rx)?;

        Ok(PlaybackAdapter {
            shared,
            worker: Some(worker),
        })
    }

    /// Load a module, disposing any previous session first.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<ModuleInfo> {
        let path = path.as_ref();
        let mut session = self.shared.session.lock();
        let mut decoder = self.shared.decoder.lock();

        if session.state != SessionState::Uninitialized || session.queue.is_some() {
            debug!(state = %session.state, "disposing previous session before load");
            self.shared.dispose_locked(&mut session, &mut decoder);
        }

        let info = decoder.load(path).map_err(|err| {
            warn!(path = %path.display(), %err, "module load failed");
            PlayerError::from(err)
        })?;
        info!(
            name = %info.name,
            format = %info.format,
            channels = info.channels,
            "module loaded"
        );
        self.shared
            .events
            .publish(PlayerEvent::ModuleLoaded(info.clone()));
        Ok(info)
    }

    /// Create the output queue and allocate the buffer ring.
    ///
    /// Partial initialization is never kept: if the queue or any buffer
    /// cannot be created, everything acquired so far is disposed.
    pub fn initialize(&self, volume: f32) -> Result<()> {
        let mut session = self.shared.session.lock();
        let state = session.state;
        if matches!(
            state,
            SessionState::Initialized | SessionState::Running | SessionState::Paused
        ) {
            return Err(PlayerError::InvalidState {
                operation: "initialize",
                state,
            });
        }

        // A queue left draining after the module ended.
        session.teardown_queue();
        session.volume = volume.clamp(0.0, 1.0);

        match self.shared.initialize_locked(&mut session) {
            Ok(()) => {
                self.shared.set_state(&mut session, SessionState::Initialized);
                Ok(())
            }
            Err(err) => {
                self.shared
                    .set_state(&mut session, SessionState::Uninitialized);
                Err(err)
            }
        }
    }

    /// Prime all buffers and start rendering.
    ///
    /// From `Stopped` the queue is rebuilt with the persisted volume first.
    /// From `Paused` this resumes.
    pub fn start(&self) -> Result<()> {
        let mut session = self.shared.session.lock();
        match session.state {
            SessionState::Running => return Ok(()),
            SessionState::Paused => return self.shared.resume_locked(&mut session),
            SessionState::Uninitialized => {
                return Err(PlayerError::InvalidState {
                    operation: "start",
                    state: SessionState::Uninitialized,
                });
            }
            SessionState::Stopped => {
                session.teardown_queue();
                self.shared.initialize_locked(&mut session)?;
            }
            SessionState::Initialized => {}
        }

        let mut decoder = self.shared.decoder.lock();
        match self.shared.prime_and_start_locked(&mut session, &mut decoder) {
            Ok(()) => {
                session.running = true;
                self.shared.set_state(&mut session, SessionState::Running);
                info!("playback started");
                Ok(())
            }
            Err(err) => {
                let ended = matches!(err, PlayerError::Decoder(DecoderError::EndOfData));
                if ended {
                    info!("module ended while priming, playback not started");
                } else {
                    warn!(%err, "priming failed, playback not started");
                }
                decoder.stop();
                session.teardown_queue();
                self.shared.set_state(&mut session, SessionState::Stopped);
                if ended {
                    self.shared.events.publish(PlayerEvent::Ended);
                }
                Err(err)
            }
        }
    }

    /// Refill a drained buffer of the live session.
    ///
    /// The refill worker calls this for every drain the platform reports.
    pub fn refill(&self, buffer: BufferId) -> RefillOutcome {
        self.shared.refill(None, buffer)
    }

    /// Suspend rendering. Queued buffers stay in place.
    pub fn pause(&self) -> Result<()> {
        let mut session = self.shared.session.lock();
        match session.state {
            SessionState::Running => {
                session
                    .queue
                    .as_mut()
                    .ok_or(OutputError::Disposed)?
                    .pause()?;
                session.running = false;
                self.shared.set_state(&mut session, SessionState::Paused);
                Ok(())
            }
            SessionState::Paused => Ok(()),
            state => Err(PlayerError::InvalidState {
                operation: "pause",
                state,
            }),
        }
    }

    /// Continue rendering from where the queue left off. Nothing is re-primed.
    pub fn resume(&self) -> Result<()> {
        let mut session = self.shared.session.lock();
        match session.state {
            SessionState::Paused => self.shared.resume_locked(&mut session),
            SessionState::Running => Ok(()),
            state => Err(PlayerError::InvalidState {
                operation: "resume",
                state,
            }),
        }
    }

    /// Halt the decoder and dispose the output queue.
    ///
    /// Volume persists; `start` rebuilds the queue.
    pub fn stop(&self) {
        let mut session = self.shared.session.lock();
        let mut decoder = self.shared.decoder.lock();
        self.shared.stop_locked(&mut session, &mut decoder);
    }

    /// Stop and release the session. Required before playing another module.
    pub fn dispose(&self) {
        let mut session = self.shared.session.lock();
        let mut decoder = self.shared.decoder.lock();
        self.shared.dispose_locked(&mut session, &mut decoder);
    }

    /// Seek to a time offset in milliseconds.
    ///
    /// Buffers already queued play out; the next refill decodes from the new
    /// position. Failures leave the playback state untouched.
    pub fn seek(&self, time_ms: u32) -> Result<usize> {
        self.shared.decoder.lock().seek(time_ms).map_err(|err| {
            warn!(time_ms, %err, "seek failed");
            PlayerError::from(err)
        })
    }

    /// Jump to the next sequence position.
    pub fn skip_forward(&self) -> usize {
        self.shared.decoder.lock().next_position()
    }

    /// Jump to the previous sequence position.
    pub fn skip_backward(&self) -> usize {
        self.shared.decoder.lock().previous_position()
    }

    /// Ask the decoder to mute or unmute a channel.
    ///
    /// Returns the confirmed state. Anything short of confirmation is an
    /// error; callers must keep their previous state.
    pub fn set_channel_mute(&self, channel: usize, desired: ChannelState) -> Result<ChannelState> {
        let result = self
            .shared
            .decoder
            .lock()
            .update_channel(channel, ChannelRequest::Set(desired));
        match result {
            Ok(confirmed) if confirmed == desired => {
                debug!(channel, state = %confirmed, "channel state confirmed");
                Ok(confirmed)
            }
            Ok(actual) => {
                warn!(channel, requested = %desired, %actual, "channel change not confirmed");
                Err(PlayerError::ChannelRejected { channel })
            }
            Err(err) => {
                warn!(channel, %err, "channel change failed");
                Err(err.into())
            }
        }
    }

    /// Read a channel's current state without changing it.
    pub fn channel_state(&self, channel: usize) -> Result<ChannelState> {
        Ok(self
            .shared
            .decoder
            .lock()
            .update_channel(channel, ChannelRequest::Query)?)
    }

    /// Set the output gain, applied immediately if a queue is live.
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        let mut session = self.shared.session.lock();
        session.volume = volume.clamp(0.0, 1.0);
        let volume = session.volume;
        if let Some(queue) = session.queue.as_mut() {
            queue.set_volume(volume)?;
        }
        Ok(())
    }

    /// Current output gain.
    pub fn volume(&self) -> f32 {
        self.shared.session.lock().volume
    }

    /// Load, initialize and start in one go (the "open file" action).
    pub fn play_file(&self, path: impl AsRef<Path>) -> Result<ModuleInfo> {
        let info = self.load(path)?;
        self.initialize(self.volume())?;
        self.start()?;
        Ok(info)
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.shared.session.lock().state
    }

    /// Whether the queue is rendering.
    pub fn is_running(&self) -> bool {
        self.shared.session.lock().running
    }

    /// Metadata of the loaded module.
    pub fn module_info(&self) -> Option<ModuleInfo> {
        self.shared.decoder.lock().module_info().cloned()
    }

    /// Sequence position and elapsed milliseconds of the last decoded frame.
    pub fn position(&self) -> (usize, u32) {
        let session = self.shared.session.lock();
        (session.position, session.elapsed_ms)
    }

    /// How many frames each buffer of the live session has received.
    pub fn buffer_fills(&self) -> Vec<u64> {
        self.shared
            .session
            .lock()
            .buffers
            .iter()
            .map(AudioBuffer::fills)
            .collect()
    }

    /// Output format.
    pub fn format(&self) -> PcmFormat {
        self.shared.session.lock().format
    }

    /// Register an observer. Events are delivered to every subscriber.
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.shared.events.subscribe()
    }

    /// Current playback counters.
    pub fn stats(&self) -> PlaybackStats {
        self.shared.stats.snapshot()
    }
}

impl<D: ModuleDecoder + 'static> Drop for PlaybackAdapter<D> {
    fn drop(&mut self) {
        self.dispose();
        let _ = self.shared.drain_tx.send(WorkerMessage::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("refill worker panicked");
            }
        }
    }
}
