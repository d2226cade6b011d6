// Background playback worker
// One thread per play/loop request; reads blocks from the source and writes them to the sink

use crate::callback::AudioEvent;
use crate::error::{AudioError, Result};
use crate::format::FrameFormat;
use crate::session::Shared;
use crate::source::OutputSink;
use crate::state::{LoopCount, Status, WorkerGate};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerMode {
    Once,
    Loop(LoopCount),
}

/// Join handle of a retired or running worker
pub(crate) struct WorkerHandle {
    generation: u64,
    thread: JoinHandle<()>,
}

impl WorkerHandle {
    /// Wait for the worker to exit. A worker retiring itself (from a listener
    /// running on its own thread) is detached instead.
    pub(crate) fn join(self) {
        if self.thread.thread().id() == thread::current().id() {
            log::debug!("Worker {} retired from its own thread, detaching", self.generation);
            return;
        }
        if self.thread.join().is_err() {
            log::error!("Worker {} panicked", self.generation);
        }
    }
}

enum Step {
    /// One block moved to the sink
    Wrote,
    /// Paused or seeking, go back to the suspension point
    Yield,
    /// Source exhausted and already reset to frame 0
    EndOfStream,
    /// Cancelled or resources released
    Exit,
}

pub(crate) fn spawn(shared: Arc<Shared>, generation: u64, mode: WorkerMode) -> Result<WorkerHandle> {
    let thread = thread::Builder::new()
        .name(shared.config.thread_name.clone())
        .spawn(move || run(shared, generation, mode))
        .map_err(|e| AudioError::StreamFault(format!("Failed to spawn worker thread: {}", e)))?;

    Ok(WorkerHandle { generation, thread })
}

fn run(shared: Arc<Shared>, generation: u64, mode: WorkerMode) {
    log::info!("Worker {} started ({:?})", generation, mode);

    if let Err(e) = drive(&shared, generation, mode) {
        log::error!("Worker {} stream fault: {}", generation, e);
        let mut state = shared.state.lock();
        if state.generation == generation && state.status.is_engaged() {
            state.retire_worker();
            let _ = state.transition(Status::Idle);
        }
    }

    log::info!("Worker {} exited", generation);
}

fn drive(shared: &Shared, generation: u64, mode: WorkerMode) -> Result<()> {
    let format = match shared.state.lock().format {
        Some(format) => format,
        None => return Ok(()),
    };
    let mut buffer = vec![0u8; shared.config.block_bytes(format.frame_size())];
    let mut completed: u32 = 0;

    if let WorkerMode::Loop(count) = mode {
        if !count.continues_after(0) {
            finish(shared, generation);
            return Ok(());
        }
    }

    if !start_sink(shared, &format)? {
        return Ok(());
    }

    loop {
        if wait_for_turn(shared, generation) == WorkerGate::Exit {
            return Ok(());
        }

        match pump_block(shared, generation, &format, &mut buffer)? {
            Step::Wrote | Step::Yield => continue,
            Step::Exit => return Ok(()),
            Step::EndOfStream => {
                log::info!("Worker {} reached end of stream", generation);
                shared.events.dispatch(AudioEvent::ReachedEnd);

                match mode {
                    WorkerMode::Once => {
                        finish(shared, generation);
                        return Ok(());
                    }
                    WorkerMode::Loop(count) => {
                        completed += 1;
                        {
                            let mut state = shared.state.lock();
                            if state.generation != generation {
                                return Ok(());
                            }
                            state.completed_loops = completed;
                        }
                        if !count.continues_after(completed) {
                            finish(shared, generation);
                            return Ok(());
                        }
                        log::debug!("Worker {} starting repetition {}", generation, completed + 1);
                    }
                }
            }
        }
    }
}

/// Start the sink, reopening a source lost to an earlier failed reset.
/// Returns false if the session already released its resources.
fn start_sink(shared: &Shared, format: &FrameFormat) -> Result<bool> {
    let mut io = shared.io.lock();
    if io.sink.is_none() || !shared.state.lock().status.is_open() {
        return Ok(false);
    }

    if io.source.is_none() {
        log::info!("Reopening {} after a failed reset", shared.opener.describe());
        io.reset(shared.opener.as_ref(), format)?;
        let mut state = shared.state.lock();
        if state.status.is_open() {
            state.position = 0;
        }
    }

    match io.sink.as_mut() {
        Some(sink) => {
            sink.start().map_err(AudioError::into_stream_fault)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Suspension point: blocks while paused or seeking
fn wait_for_turn(shared: &Shared, generation: u64) -> WorkerGate {
    let mut state = shared.state.lock();
    loop {
        match state.worker_may_run(generation) {
            WorkerGate::Wait => shared.wake.wait(&mut state),
            gate => return gate,
        }
    }
}

fn pump_block(shared: &Shared, generation: u64, format: &FrameFormat, buffer: &mut [u8]) -> Result<Step> {
    let mut guard = shared.io.lock();

    // Re-check while holding the I/O lock so pause/seek/stop never race a write
    match shared.state.lock().worker_may_run(generation) {
        WorkerGate::Run => {}
        WorkerGate::Wait => return Ok(Step::Yield),
        WorkerGate::Exit => return Ok(Step::Exit),
    }

    let io = &mut *guard;
    let (source, sink) = match (io.source.as_mut(), io.sink.as_mut()) {
        (Some(source), Some(sink)) => (source, sink),
        // Close retires the worker before releasing, so the gate above would
        // have said Exit. A missing source here means a reset failed.
        _ => {
            return Err(AudioError::StreamFault(format!(
                "Worker {} has no source to read after a failed reset",
                generation
            )))
        }
    };

    let read = source.read(buffer).map_err(AudioError::into_stream_fault)?;
    if read == 0 {
        let reopened = io.reset(shared.opener.as_ref(), format);
        let mut state = shared.state.lock();
        if state.status.is_open() {
            state.position = 0;
        }
        reopened?;
        if state.generation != generation {
            return Ok(Step::Exit);
        }
        return Ok(Step::EndOfStream);
    }

    write_all(sink.as_mut(), &buffer[..read])?;

    let frames = format.bytes_to_frames(read);
    io.cursor += frames;
    // Position mirrors the source cursor, even for a block finished after retirement
    let mut state = shared.state.lock();
    if state.status.is_open() {
        state.position += frames;
    }
    Ok(Step::Wrote)
}

fn write_all(sink: &mut dyn OutputSink, data: &[u8]) -> Result<()> {
    let mut offset = 0;
    while offset < data.len() {
        let written = sink
            .write(&data[offset..])
            .map_err(AudioError::into_stream_fault)?;
        if written == 0 {
            return Err(AudioError::StreamFault("Output sink accepted no data".to_string()));
        }
        offset += written;
    }
    Ok(())
}

/// Natural end of the worker: back to idle unless someone else took over
fn finish(shared: &Shared, generation: u64) {
    let mut state = shared.state.lock();
    if state.generation == generation && state.status.is_engaged() {
        state.loop_count = None;
        state.completed_loops = 0;
        let _ = state.transition(Status::Idle);
    }
}
