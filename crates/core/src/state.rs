// Playback state shared between the controlling caller and the worker

use crate::error::{AudioError, Result};
use crate::format::FrameFormat;

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No resource acquired
    Closed,
    /// Opened, nothing playing
    Idle,
    /// Worker running the play-once loop
    Playing,
    /// Play-once worker suspended
    Paused,
    /// Worker running the loop variant
    Looping,
    /// Loop worker suspended
    PausedWhileLooping,
}

impl Status {
    /// Worker should be moving frames
    pub fn is_running(self) -> bool {
        matches!(self, Status::Playing | Status::Looping)
    }

    pub fn is_paused(self) -> bool {
        matches!(self, Status::Paused | Status::PausedWhileLooping)
    }

    pub fn is_looping(self) -> bool {
        matches!(self, Status::Looping | Status::PausedWhileLooping)
    }

    /// A worker exists for this status (running or suspended)
    pub fn is_engaged(self) -> bool {
        self.is_running() || self.is_paused()
    }

    pub fn is_open(self) -> bool {
        self != Status::Closed
    }

    /// Transition table
    pub fn can_transition(self, to: Status) -> bool {
        use Status::*;
        match (self, to) {
            // Close and stop are always allowed
            (_, Closed) => true,
            (Closed, Idle) => true,
            (Closed, _) => false,
            (_, Idle) => true,

            (Idle | Playing | Paused | Looping | PausedWhileLooping, Playing) => true,
            (Idle | Playing | Paused | Looping | PausedWhileLooping, Looping) => true,

            (Playing, Paused) => true,
            (Looping, PausedWhileLooping) => true,

            _ => false,
        }
    }
}

/// How many times the loop worker replays the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCount {
    Times(u32),
    Endless,
}

impl LoopCount {
    /// Whether another pass follows after `completed` passes
    pub fn continues_after(self, completed: u32) -> bool {
        match self {
            LoopCount::Endless => true,
            LoopCount::Times(total) => completed < total,
        }
    }
}

impl From<u32> for LoopCount {
    fn from(times: u32) -> Self {
        LoopCount::Times(times)
    }
}

/// Mutable session record guarded by the session state lock
#[derive(Debug)]
pub struct PlaybackState {
    pub(crate) status: Status,
    /// Bumped whenever the current worker must retire
    pub(crate) generation: u64,
    /// Frames handed to the sink since the last reset/seek base
    pub(crate) position: u64,
    /// Worker must park while a seek owns the source
    pub(crate) seeking: bool,
    pub(crate) format: Option<FrameFormat>,
    pub(crate) total_frames: u64,
    pub(crate) loop_count: Option<LoopCount>,
    pub(crate) completed_loops: u32,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self {
            status: Status::Closed,
            generation: 0,
            position: 0,
            seeking: false,
            format: None,
            total_frames: 0,
            loop_count: None,
            completed_loops: 0,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn format(&self) -> Option<FrameFormat> {
        self.format
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn loops_remaining(&self) -> Option<LoopCount> {
        match self.loop_count? {
            LoopCount::Endless => Some(LoopCount::Endless),
            LoopCount::Times(total) => Some(LoopCount::Times(total.saturating_sub(self.completed_loops))),
        }
    }

    pub(crate) fn transition(&mut self, to: Status) -> Result<Status> {
        let from = self.status;
        if !from.can_transition(to) {
            return Err(AudioError::StateMisuse(format!(
                "Invalid state transition from {:?} to {:?}",
                from, to
            )));
        }
        self.status = to;
        log::debug!("Session status changed: {:?} -> {:?}", from, to);
        Ok(from)
    }

    /// Retire the current worker, if any. Returns the new generation.
    pub(crate) fn retire_worker(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.loop_count = None;
        self.completed_loops = 0;
        self.generation
    }

    /// Worker predicate: still owner of the session and allowed to run
    pub(crate) fn worker_may_run(&self, generation: u64) -> WorkerGate {
        if self.generation != generation || !self.status.is_engaged() {
            WorkerGate::Exit
        } else if self.status.is_paused() || self.seeking {
            WorkerGate::Wait
        } else {
            WorkerGate::Run
        }
    }

    pub(crate) fn set_opened(&mut self, format: FrameFormat, total_frames: u64) {
        self.format = Some(format);
        self.total_frames = total_frames;
        self.position = 0;
        self.seeking = false;
    }

    pub(crate) fn set_closed(&mut self) {
        self.status = Status::Closed;
        self.format = None;
        self.total_frames = 0;
        self.position = 0;
        self.seeking = false;
        self.loop_count = None;
        self.completed_loops = 0;
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerGate {
    Run,
    Wait,
    Exit,
}
