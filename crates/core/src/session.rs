// Streaming playback session
// Control operations are serialized by a per-session lock; the worker runs outside it
//
// Lock order: control -> io -> state. Control operations never hold `state`
// while acquiring `io`.

use crate::callback::{AudioEvent, AudioListener, EventDispatcher, ListenerId};
use crate::config::SessionConfig;
use crate::error::{AudioError, Result};
use crate::format::FrameFormat;
use crate::seek::{measure_frames, StreamIo};
use crate::source::{DecodedSource, OutputSink, SinkProvider, SourceOpener};
use crate::state::{LoopCount, PlaybackState, Status};
use crate::worker::{self, WorkerHandle, WorkerMode};
use parking_lot::{Condvar, Mutex, ReentrantMutex};
use std::sync::Arc;

/// State shared between the session and its worker
pub(crate) struct Shared {
    pub(crate) state: Mutex<PlaybackState>,
    /// Suspension latch for the worker
    pub(crate) wake: Condvar,
    pub(crate) io: Mutex<StreamIo>,
    pub(crate) events: EventDispatcher,
    pub(crate) opener: Arc<dyn SourceOpener>,
    pub(crate) config: SessionConfig,
}

impl Shared {
    fn notify_worker(&self) {
        self.wake.notify_all();
    }
}

/// One open audio resource streamed to one output sink
///
/// All methods take `&self`, so a session can be shared between threads
/// behind an `Arc`. Listener callbacks may call back into the session.
pub struct StreamingSession {
    shared: Arc<Shared>,
    sinks: Arc<dyn SinkProvider>,
    /// Re-entrant so listeners invoked by a control operation can call back in
    control: ReentrantMutex<()>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl StreamingSession {
    pub fn new(opener: Arc<dyn SourceOpener>, sinks: Arc<dyn SinkProvider>) -> Self {
        Self::with_config(opener, sinks, SessionConfig::default())
    }

    pub fn with_config(
        opener: Arc<dyn SourceOpener>,
        sinks: Arc<dyn SinkProvider>,
        config: SessionConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PlaybackState::new()),
                wake: Condvar::new(),
                io: Mutex::new(StreamIo::empty()),
                events: EventDispatcher::new(),
                opener,
                config,
            }),
            sinks,
            control: ReentrantMutex::new(()),
            worker: Mutex::new(None),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn AudioListener>) -> ListenerId {
        self.shared.events.add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.events.remove_listener(id)
    }

    /// Unregister every listener
    pub fn clear_listeners(&self) {
        self.shared.events.clear_listeners();
    }

    pub fn listener_count(&self) -> usize {
        self.shared.events.listener_count()
    }

    /// Acquire the source and a matching sink. Valid only while closed.
    pub fn open(&self) -> Result<()> {
        let _control = self.control.lock();

        if self.shared.state.lock().status.is_open() {
            return Err(AudioError::StateMisuse("Session is already open".to_string()));
        }

        log::info!("Opening {}", self.shared.opener.describe());
        let (source, format, total_frames) = self
            .acquire_source()
            .map_err(AudioError::into_open_failure)?;

        let sink = match self.acquire_sink(&format) {
            Ok(sink) => sink,
            Err(e) => {
                let mut source = source;
                source.close();
                return Err(e.into_open_failure());
            }
        };

        {
            let mut io = self.shared.io.lock();
            io.source = Some(source);
            io.sink = Some(sink);
            io.cursor = 0;
        }
        {
            let mut state = self.shared.state.lock();
            state.set_opened(format, total_frames);
            state.transition(Status::Idle)?;
        }

        log::info!(
            "Opened: {}Hz, {} channels, {} bits, {} frames ({} ms)",
            format.sample_rate,
            format.channels,
            format.bits_per_sample,
            total_frames,
            format.frames_to_millis(total_frames)
        );
        self.shared.events.dispatch(AudioEvent::Opened);
        Ok(())
    }

    /// Play once from the current position, restarting if already engaged
    pub fn play(&self) -> Result<()> {
        let retired = {
            let _control = self.control.lock();
            self.play_locked()?
        };
        join_all(retired);
        Ok(())
    }

    /// Play `count` times back to back, or until stopped for [`LoopCount::Endless`]
    pub fn loop_playback(&self, count: impl Into<LoopCount>) -> Result<()> {
        let count = count.into();
        let retired = {
            let _control = self.control.lock();
            self.ensure_open("loop")?;
            let mut retired = self.halt_if_engaged()?;
            retired.extend(self.spawn_worker(WorkerMode::Loop(count))?);
            retired
        };
        join_all(retired);
        Ok(())
    }

    /// Suspend the worker. No-op unless playing or looping.
    pub fn pause(&self) -> Result<()> {
        let _control = self.control.lock();

        {
            let mut state = self.shared.state.lock();
            let target = match state.status {
                Status::Playing => Status::Paused,
                Status::Looping => Status::PausedWhileLooping,
                other => {
                    log::debug!("Pause ignored in {:?}", other);
                    return Ok(());
                }
            };
            state.transition(target)?;
        }

        {
            let mut io = self.shared.io.lock();
            if let Some(sink) = io.sink.as_mut() {
                if let Err(e) = sink.stop() {
                    log::warn!("Failed to stop sink on pause: {}", e);
                }
            }
        }

        log::info!("Playback paused");
        self.shared.events.dispatch(AudioEvent::Paused);
        Ok(())
    }

    /// Continue from the paused position. When not paused, plays from frame 0.
    pub fn resume(&self) -> Result<()> {
        let retired = {
            let _control = self.control.lock();
            self.resume_locked()?
        };
        join_all(retired);
        Ok(())
    }

    /// Stop the worker and rewind to frame 0. Valid from any status.
    pub fn stop(&self) -> Result<()> {
        let retired = {
            let _control = self.control.lock();
            self.stop_locked()?
        };
        join_all(retired);
        Ok(())
    }

    /// Release everything. Idempotent, always emits `Closed`.
    pub fn close(&self) {
        let retired = {
            let _control = self.control.lock();
            self.close_locked()
        };
        join_all(retired);
    }

    /// Reposition so the next frame played is `frame`
    pub fn seek_to_frame(&self, frame: u64) -> Result<u64> {
        let _control = self.control.lock();
        self.seek_locked(frame, true)
    }

    pub fn seek_to_millis(&self, millis: u64) -> Result<u64> {
        let _control = self.control.lock();
        let format = self.ensure_open("seek")?;
        self.seek_locked(format.millis_to_frames(millis), true)
    }

    pub fn rewind(&self) -> Result<u64> {
        self.seek_to_frame(0)
    }

    pub fn status(&self) -> Status {
        let _control = self.control.lock();
        self.shared.state.lock().status
    }

    pub fn is_open(&self) -> bool {
        self.status().is_open()
    }

    pub fn is_playing(&self) -> bool {
        self.status().is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.status().is_paused()
    }

    pub fn is_looping(&self) -> bool {
        self.status().is_looping()
    }

    pub fn loops_remaining(&self) -> Option<LoopCount> {
        let _control = self.control.lock();
        self.shared.state.lock().loops_remaining()
    }

    pub fn audio_format(&self) -> Option<FrameFormat> {
        let _control = self.control.lock();
        self.shared.state.lock().format
    }

    pub fn frame_length(&self) -> u64 {
        let _control = self.control.lock();
        self.shared.state.lock().total_frames
    }

    pub fn duration_micros(&self) -> u64 {
        let _control = self.control.lock();
        let state = self.shared.state.lock();
        state
            .format
            .map(|format| format.frames_to_micros(state.total_frames))
            .unwrap_or(0)
    }

    pub fn duration_millis(&self) -> u64 {
        self.duration_micros() / 1000
    }

    pub fn frame_position(&self) -> u64 {
        let _control = self.control.lock();
        self.shared.state.lock().position
    }

    pub fn position_millis(&self) -> u64 {
        let _control = self.control.lock();
        let state = self.shared.state.lock();
        state
            .format
            .map(|format| format.frames_to_millis(state.position))
            .unwrap_or(0)
    }

    /// Output level reported by the sink, 0.0 when closed
    pub fn output_level(&self) -> f32 {
        self.with_sink(|sink| sink.level()).unwrap_or(0.0)
    }

    /// Sink buffer capacity in bytes, 0 when closed
    pub fn buffer_size(&self) -> usize {
        self.with_sink(|sink| sink.buffer_size()).unwrap_or(0)
    }

    /// Playback cursor as reported by the device
    pub fn device_position_micros(&self) -> u64 {
        self.with_sink(|sink| sink.microsecond_position()).unwrap_or(0)
    }

    fn with_sink<R>(&self, f: impl FnOnce(&dyn OutputSink) -> R) -> Option<R> {
        let _control = self.control.lock();
        let io = self.shared.io.lock();
        io.sink.as_ref().map(|sink| f(sink.as_ref()))
    }

    fn ensure_open(&self, operation: &str) -> Result<FrameFormat> {
        let state = self.shared.state.lock();
        match (state.status, state.format) {
            (Status::Closed, _) | (_, None) => Err(AudioError::StateMisuse(format!(
                "Cannot {} a closed session",
                operation
            ))),
            (_, Some(format)) => Ok(format),
        }
    }

    fn acquire_source(&self) -> Result<(Box<dyn DecodedSource>, FrameFormat, u64)> {
        let opener = self.shared.opener.as_ref();
        let mut source = opener.open()?;
        let format = source.frame_format();
        if format.frame_size() == 0 || format.sample_rate == 0 {
            source.close();
            return Err(AudioError::UnsupportedFormat(format!("Unusable frame format {:?}", format)));
        }

        let total_frames = match source.frame_length() {
            Some(frames) => frames,
            None => {
                log::debug!("Frame length unknown, scanning {}", opener.describe());
                let scanned = measure_frames(source.as_mut(), self.shared.config.scan_bytes(format.frame_size()));
                source.close();
                let frames = scanned?;
                source = opener.open()?;
                frames
            }
        };

        Ok((source, format, total_frames))
    }

    fn acquire_sink(&self, format: &FrameFormat) -> Result<Box<dyn OutputSink>> {
        let mut sink = self.sinks.acquire(format)?;
        if let Err(e) = sink.open(format) {
            sink.close();
            return Err(e);
        }
        Ok(sink)
    }

    fn play_locked(&self) -> Result<Vec<WorkerHandle>> {
        self.ensure_open("play")?;
        let mut retired = self.halt_if_engaged()?;
        retired.extend(self.spawn_worker(WorkerMode::Once)?);
        Ok(retired)
    }

    fn resume_locked(&self) -> Result<Vec<WorkerHandle>> {
        let status = self.shared.state.lock().status;
        if !status.is_paused() {
            self.ensure_open("resume")?;
            log::debug!("Resume in {:?}, restarting from the beginning", status);
            let mut retired = self.halt_if_engaged()?;
            self.seek_locked(0, false)?;
            retired.extend(self.play_locked()?);
            return Ok(retired);
        }

        {
            let mut io = self.shared.io.lock();
            if let Some(sink) = io.sink.as_mut() {
                sink.start().map_err(AudioError::into_stream_fault)?;
            }
        }
        {
            let mut state = self.shared.state.lock();
            let target = if status == Status::PausedWhileLooping {
                Status::Looping
            } else {
                Status::Playing
            };
            state.transition(target)?;
        }
        self.shared.notify_worker();

        log::info!("Playback resumed");
        self.shared.events.dispatch(AudioEvent::Resumed);
        Ok(Vec::new())
    }

    fn halt_if_engaged(&self) -> Result<Vec<WorkerHandle>> {
        if self.shared.state.lock().status.is_engaged() {
            self.stop_locked()
        } else {
            Ok(Vec::new())
        }
    }

    fn stop_locked(&self) -> Result<Vec<WorkerHandle>> {
        let was_open = {
            let mut state = self.shared.state.lock();
            state.retire_worker();
            state.seeking = false;
            if state.status.is_open() {
                state.transition(Status::Idle)?;
                true
            } else {
                false
            }
        };
        self.shared.notify_worker();
        let retired: Vec<WorkerHandle> = self.worker.lock().take().into_iter().collect();

        let mut outcome = Ok(());
        if was_open {
            {
                let mut io = self.shared.io.lock();
                if let Some(sink) = io.sink.as_mut() {
                    if let Err(e) = sink.stop() {
                        log::warn!("Failed to stop sink: {}", e);
                    }
                }
            }
            if let Err(e) = self.seek_locked(0, false) {
                log::error!("Failed to rewind on stop: {}", e);
                outcome = Err(e);
            }
        }

        log::info!("Playback stopped");
        self.shared.events.dispatch(AudioEvent::Stopped);
        outcome.map(|_| retired)
    }

    fn close_locked(&self) -> Vec<WorkerHandle> {
        let was_open = {
            let mut state = self.shared.state.lock();
            let was_open = state.status.is_open();
            state.retire_worker();
            state.set_closed();
            was_open
        };
        self.shared.notify_worker();
        let retired: Vec<WorkerHandle> = self.worker.lock().take().into_iter().collect();

        if was_open {
            self.shared.io.lock().release();
            log::info!("Session closed");
        }

        self.shared.events.dispatch(AudioEvent::Closed);
        retired
    }

    /// Seek engine entry point. The worker is parked for the duration if it was running.
    fn seek_locked(&self, target: u64, announce: bool) -> Result<u64> {
        let (format, target) = {
            let mut state = self.shared.state.lock();
            let format = match (state.status, state.format) {
                (Status::Closed, _) | (_, None) => {
                    return Err(AudioError::StateMisuse("Cannot seek a closed session".to_string()))
                }
                (_, Some(format)) => format,
            };
            if state.status.is_running() {
                state.seeking = true;
            }
            (format, target.min(state.total_frames))
        };

        let (old_frame, result) = {
            let mut io = self.shared.io.lock();
            // The worker cannot move the position while the I/O lock is held
            let old_frame = self.shared.state.lock().position;
            log::debug!("Seeking from frame {} to {}", old_frame, target);
            if let Some(sink) = io.sink.as_mut() {
                sink.flush();
            }
            let scratch = self.shared.config.scan_bytes(format.frame_size());
            let result = io.seek_to_frame(self.shared.opener.as_ref(), &format, target, scratch);

            let mut state = self.shared.state.lock();
            state.seeking = false;
            if state.status.is_open() {
                // A failed reset leaves the cursor at 0 with no source
                state.position = match result {
                    Ok(reached) => reached,
                    Err(_) => io.cursor,
                };
            }
            (old_frame, result)
        };
        self.shared.notify_worker();

        let new_frame = result?;
        if announce || new_frame != old_frame {
            self.shared.events.dispatch(AudioEvent::PositionChanged {
                old_frame,
                new_frame,
            });
        }
        Ok(new_frame)
    }

    /// `Started` goes out before the thread exists, so it always precedes
    /// anything the worker emits. Returns the handle of a previous, naturally
    /// finished worker.
    fn spawn_worker(&self, mode: WorkerMode) -> Result<Option<WorkerHandle>> {
        let generation = {
            let mut state = self.shared.state.lock();
            let target = match mode {
                WorkerMode::Once => Status::Playing,
                WorkerMode::Loop(_) => Status::Looping,
            };
            state.transition(target)?;
            let generation = state.retire_worker();
            if let WorkerMode::Loop(count) = mode {
                state.loop_count = Some(count);
            }
            generation
        };

        match mode {
            WorkerMode::Once => {
                log::info!("Playback started");
                self.shared.events.dispatch(AudioEvent::Started);
            }
            WorkerMode::Loop(count) => log::info!("Looping started ({:?})", count),
        }

        if self.shared.state.lock().generation != generation {
            log::debug!("Worker {} superseded by a listener before spawning", generation);
            return Ok(None);
        }

        let handle = match worker::spawn(Arc::clone(&self.shared), generation, mode) {
            Ok(handle) => handle,
            Err(e) => {
                let mut state = self.shared.state.lock();
                if state.generation == generation {
                    state.retire_worker();
                    let _ = state.transition(Status::Idle);
                }
                return Err(e);
            }
        };
        Ok(self.worker.lock().replace(handle))
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        let retired = {
            let _control = self.control.lock();
            if self.shared.state.lock().status.is_open() {
                self.close_locked()
            } else {
                self.worker.lock().take().into_iter().collect()
            }
        };
        join_all(retired);
    }
}

fn join_all(retired: Vec<WorkerHandle>) {
    for handle in retired {
        handle.join();
    }
}
