// Seek/reset engine
// Sources are forward-only: repositioning reopens from frame 0 and discards forward

use crate::error::{AudioError, Result};
use crate::format::FrameFormat;
use crate::source::{DecodedSource, OutputSink, SourceOpener};

/// Source and sink owned by one session, guarded by the session I/O lock
pub(crate) struct StreamIo {
    pub(crate) source: Option<Box<dyn DecodedSource>>,
    pub(crate) sink: Option<Box<dyn OutputSink>>,
    /// Frames consumed from the current source instance
    pub(crate) cursor: u64,
}

impl StreamIo {
    pub(crate) fn empty() -> Self {
        Self {
            source: None,
            sink: None,
            cursor: 0,
        }
    }

    /// Close the current source and reopen it at frame 0
    pub(crate) fn reset(&mut self, opener: &dyn SourceOpener, format: &FrameFormat) -> Result<()> {
        if let Some(mut old) = self.source.take() {
            old.close();
        }
        self.cursor = 0;

        let source = opener.open().map_err(AudioError::into_stream_fault)?;
        let reopened = source.frame_format();
        if reopened != *format {
            return Err(AudioError::StreamFault(format!(
                "Reopened source changed format from {:?} to {:?}",
                format, reopened
            )));
        }
        log::debug!("Reset {} to frame 0", opener.describe());
        self.source = Some(source);
        Ok(())
    }

    /// Read and drop frames until the cursor reaches `target` or the stream ends.
    /// Returns the cursor afterwards.
    pub(crate) fn discard_to(&mut self, target: u64, frame_size: usize, scratch: &mut [u8]) -> Result<u64> {
        let source = self
            .source
            .as_mut()
            .ok_or_else(|| AudioError::StreamFault("No source to seek in".to_string()))?;
        let frame_size = frame_size.max(1);

        while self.cursor < target {
            let remaining = (target - self.cursor).saturating_mul(frame_size as u64);
            let want = (scratch.len() as u64).min(remaining) as usize;
            let read = source
                .read(&mut scratch[..want])
                .map_err(AudioError::into_stream_fault)?;
            if read == 0 {
                log::debug!("Source ended at frame {} while discarding to {}", self.cursor, target);
                break;
            }
            self.cursor += (read / frame_size) as u64;
        }

        Ok(self.cursor)
    }

    /// Reposition the source so the next read yields frame `target`
    pub(crate) fn seek_to_frame(
        &mut self,
        opener: &dyn SourceOpener,
        format: &FrameFormat,
        target: u64,
        scratch_bytes: usize,
    ) -> Result<u64> {
        if self.source.is_none() || target < self.cursor {
            self.reset(opener, format)?;
        }
        let mut scratch = vec![0u8; scratch_bytes.max(format.frame_size()).max(1)];
        self.discard_to(target, format.frame_size(), &mut scratch)
    }

    /// Flush and close the sink, close the source
    pub(crate) fn release(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.flush();
            sink.close();
        }
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        self.cursor = 0;
    }
}

/// Count frames by draining a source. The source is spent afterwards.
pub(crate) fn measure_frames(source: &mut dyn DecodedSource, scratch_bytes: usize) -> Result<u64> {
    let frame_size = source.frame_format().frame_size().max(1);
    let mut scratch = vec![0u8; scratch_bytes.max(frame_size)];
    let mut bytes: u64 = 0;

    loop {
        let read = source.read(&mut scratch)?;
        if read == 0 {
            break;
        }
        bytes += read as u64;
    }

    Ok(bytes / frame_size as u64)
}
