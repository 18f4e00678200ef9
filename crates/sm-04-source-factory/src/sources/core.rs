//! State shared by every source type: the owned record and the recorder.

use parking_lot::Mutex;
use serde_json::Value;
use shared_bus::{RecordEvent, SharedRecord, Values};
use sm_03_source_protocol::MultiFrame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::schema::update;
use crate::domain::{fields, Result, SourceType};
use crate::metrics;
use crate::ports::{FrameRecorder, FrameWriter};
use crate::timing::ActivityCallback;

pub struct SourceCore {
    id: String,
    source_type: SourceType,
    record: SharedRecord,
    recorder: Arc<dyn FrameRecorder>,
    writer: Mutex<Option<Box<dyn FrameWriter>>>,
    closed: AtomicBool,
}

impl SourceCore {
    pub fn new(
        id: impl Into<String>,
        source_type: SourceType,
        record: SharedRecord,
        recorder: Arc<dyn FrameRecorder>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            source_type,
            record,
            recorder,
            writer: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn record(&self) -> &SharedRecord {
        &self.record
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Publish a frame to every observer and to the recording session.
    pub fn publish(&self, frame: &MultiFrame) {
        if self.is_closed() {
            return;
        }
        let value = match serde_json::to_value(frame) {
            Ok(value) => value,
            Err(e) => {
                warn!(source_id = %self.id, error = %e, "[sm-04] Frame is not serializable");
                return;
            }
        };
        if let Err(e) = self.record.set(update(fields::FRAME, value)) {
            debug!(source_id = %self.id, error = %e, "[sm-04] Frame not published");
            return;
        }
        metrics::record_frame_published(self.source_type.as_str());
        if let Some(writer) = self.writer.lock().as_mut() {
            writer.write(frame);
        }
    }

    pub fn set_active(&self, active: bool) {
        self.set_values(update(fields::ACTIVE, active));
    }

    pub(crate) fn set_values(&self, values: Values) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.record.set(values) {
            debug!(source_id = %self.id, error = %e, "[sm-04] Source record not updated");
        }
    }

    /// Watchdog callback writing `active`.
    pub(crate) fn activity_callback(self: &Arc<Self>) -> ActivityCallback {
        let core = self.clone();
        Arc::new(move |active| core.set_active(active))
    }

    /// Open or close the recording session.
    pub fn set_recording(&self, recording: bool) {
        let mut writer = self.writer.lock();
        if recording && writer.is_none() && !self.is_closed() {
            match self.recorder.create_writer(&self.id, self.source_type) {
                Ok(created) => {
                    *writer = Some(created);
                    info!(source_id = %self.id, "[sm-04] Recording started");
                }
                Err(e) => warn!(source_id = %self.id, error = %e, "[sm-04] Recorder refused writer"),
            }
        } else if !recording {
            if let Some(mut session) = writer.take() {
                session.close();
                info!(source_id = %self.id, "[sm-04] Recording stopped");
            }
        }
    }

    pub fn is_recording(&self) -> bool {
        self.writer.lock().is_some()
    }

    /// Stop publishing for good. The record itself is left to the caller.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.set_recording(false);
    }
}

/// Follow writes to the source's own record.
///
/// `record` is handled here for every type; `on_update` sees each write
/// afterwards. The task ends, closing the core, when the record is deleted.
pub(crate) fn watch_record<F>(core: Arc<SourceCore>, mut on_update: F) -> Result<JoinHandle<()>>
where
    F: FnMut(&Values) + Send + 'static,
{
    let mut events = core.record().subscribe()?;
    Ok(tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RecordEvent::Updated { updates, .. } => {
                    if let Some(recording) = updates.get(fields::RECORD).and_then(Value::as_bool) {
                        core.set_recording(recording);
                    }
                    on_update(&updates);
                }
                RecordEvent::Deleted { .. } => break,
            }
        }
        core.close();
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryRecorder;
    use crate::domain::source_schema;
    use serde_json::json;
    use shared_bus::StateHub;
    use shared_types::schema_names::SOURCE_SCHEMA;
    use sm_03_source_protocol::SensorFrame;

    async fn core(recorder: InMemoryRecorder) -> Arc<SourceCore> {
        let hub = StateHub::new();
        hub.register_schema(source_schema()).unwrap();
        let client = hub.connect();
        let record = client.create(SOURCE_SCHEMA, Values::new()).await.unwrap();
        SourceCore::new("s", SourceType::Riot, record, Arc::new(recorder))
    }

    #[tokio::test]
    async fn test_publish_reaches_observers_not_state() {
        let core = core(InMemoryRecorder::new()).await;
        let mut events = core.record().subscribe().unwrap();
        core.publish(&vec![SensorFrame::new("riot", "0")]);
        let Some(RecordEvent::Updated { updates, .. }) = events.recv().await else {
            panic!("expected update");
        };
        assert_eq!(updates[fields::FRAME][0]["id"], json!("0"));
        assert_eq!(core.record().get(fields::FRAME), None);
    }

    #[tokio::test]
    async fn test_recording_session_follows_flag() {
        let recorder = InMemoryRecorder::new();
        let core = core(recorder.clone()).await;
        let watcher = watch_record(core.clone(), |_| {}).unwrap();

        core.publish(&vec![SensorFrame::new("riot", "0")]);
        core.record().set_value(fields::RECORD, json!(true)).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while !core.is_recording() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        core.publish(&vec![SensorFrame::new("riot", "1")]);
        core.close();
        core.publish(&vec![SensorFrame::new("riot", "2")]);

        let sessions = recorder.sessions_of("s");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].frames.len(), 1);
        assert_eq!(sessions[0].frames[0][0].id, "1");
        assert!(sessions[0].closed);
        watcher.abort();
    }

    #[tokio::test]
    async fn test_watcher_closes_on_delete() {
        let core = core(InMemoryRecorder::new()).await;
        let watcher = watch_record(core.clone(), |_| {}).unwrap();
        core.record().delete().unwrap();
        watcher.await.unwrap();
        assert!(core.is_closed());
    }
}
