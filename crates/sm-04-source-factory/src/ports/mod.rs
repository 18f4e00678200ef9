//! Outbound (Driven) ports for the Source Factory.
//!
//! The factory records frames through an external recorder collaborator.
//! It only decides when a writer exists; what happens to the frames is the
//! recorder's business.

use sm_03_source_protocol::MultiFrame;

use crate::domain::{Result, SourceType};

/// Creates frame writers for sources whose `record` flag is set.
pub trait FrameRecorder: Send + Sync {
    /// Open a writer for one recording session of `source_id`.
    ///
    /// # Returns
    /// - `Ok(writer)`: Every frame the source publishes is fed to it until
    ///   recording stops or the source is deleted
    /// - `Err`: Recording stays off; the source keeps running
    fn create_writer(&self, source_id: &str, source_type: SourceType) -> Result<Box<dyn FrameWriter>>;
}

/// One recording session.
pub trait FrameWriter: Send {
    /// Append a published frame.
    fn write(&mut self, frame: &MultiFrame);

    /// End the session. No frame is written after this.
    fn close(&mut self);
}

/// Recorder that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

struct NoopWriter;

impl FrameWriter for NoopWriter {
    fn write(&mut self, _frame: &MultiFrame) {}
    fn close(&mut self) {}
}

impl FrameRecorder for NoopRecorder {
    fn create_writer(&self, _source_id: &str, _source_type: SourceType) -> Result<Box<dyn FrameWriter>> {
        Ok(Box::new(NoopWriter))
    }
}
