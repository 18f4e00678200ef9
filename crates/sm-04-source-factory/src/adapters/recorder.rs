//! In-memory frame recorder.

use parking_lot::Mutex;
use sm_03_source_protocol::MultiFrame;
use std::sync::Arc;

use crate::domain::{Result, SourceType};
use crate::ports::{FrameRecorder, FrameWriter};

/// One recording session kept in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSession {
    pub source_id: String,
    pub source_type: SourceType,
    pub frames: Vec<MultiFrame>,
    pub closed: bool,
}

/// Recorder keeping every session in memory. Clones share sessions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecorder {
    sessions: Arc<Mutex<Vec<RecordedSession>>>,
}

impl InMemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every session so far, in creation order.
    pub fn sessions(&self) -> Vec<RecordedSession> {
        self.sessions.lock().clone()
    }

    /// Sessions of one source.
    pub fn sessions_of(&self, source_id: &str) -> Vec<RecordedSession> {
        self.sessions
            .lock()
            .iter()
            .filter(|session| session.source_id == source_id)
            .cloned()
            .collect()
    }
}

struct InMemoryWriter {
    sessions: Arc<Mutex<Vec<RecordedSession>>>,
    index: usize,
}

impl FrameWriter for InMemoryWriter {
    fn write(&mut self, frame: &MultiFrame) {
        let mut sessions = self.sessions.lock();
        let session = &mut sessions[self.index];
        if !session.closed {
            session.frames.push(frame.clone());
        }
    }

    fn close(&mut self) {
        self.sessions.lock()[self.index].closed = true;
    }
}

impl FrameRecorder for InMemoryRecorder {
    fn create_writer(&self, source_id: &str, source_type: SourceType) -> Result<Box<dyn FrameWriter>> {
        let mut sessions = self.sessions.lock();
        sessions.push(RecordedSession {
            source_id: source_id.to_string(),
            source_type,
            frames: Vec::new(),
            closed: false,
        });
        Ok(Box::new(InMemoryWriter {
            sessions: self.sessions.clone(),
            index: sessions.len() - 1,
        }))
    }
}
