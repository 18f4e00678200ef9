//! Typed handle on a source record, owned or attached.
//!
//! Any node may drive `control`, `loop`, `record` and the playback range.
//! `frame` and `active` belong to the owner.

use serde_json::{json, Value};
use shared_bus::{RecordEvent, SharedRecord, Subscription, Values};
use shared_types::NodeId;
use sm_03_source_protocol::MultiFrame;

use crate::domain::schema::update;
use crate::domain::{fields, Control, Result, SourceError, SourceType};

#[derive(Clone)]
pub struct SourceView {
    id: String,
    record: SharedRecord,
}

impl SourceView {
    /// View on `record`. `None` if it is deleted or carries no id.
    pub fn new(record: SharedRecord) -> Option<Self> {
        let id = record.get(fields::ID)?.as_str()?.to_string();
        Some(Self { id, record })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn record(&self) -> &SharedRecord {
        &self.record
    }

    /// Whether this node owns the source.
    pub fn is_owner(&self) -> bool {
        self.record.is_owner()
    }

    pub fn owner(&self) -> NodeId {
        self.record.owner()
    }

    pub fn exists(&self) -> bool {
        self.record.exists()
    }

    pub fn source_type(&self) -> Option<SourceType> {
        self.record
            .get(fields::TYPE)
            .and_then(|value| value.as_str().and_then(SourceType::parse))
    }

    pub fn infos(&self) -> Value {
        self.record.get(fields::INFOS).unwrap_or(Value::Null)
    }

    pub fn active(&self) -> bool {
        self.flag(fields::ACTIVE)
    }

    pub fn control(&self) -> Option<Control> {
        self.record
            .get(fields::CONTROL)
            .as_ref()
            .and_then(Control::from_value)
    }

    pub fn is_recording(&self) -> bool {
        self.flag(fields::RECORD)
    }

    pub fn looping(&self) -> bool {
        self.flag(fields::LOOP)
    }

    /// `(frameStart, frameEnd)`; `None` end means the last frame.
    pub fn range(&self) -> (u64, Option<u64>) {
        let start = self
            .record
            .get(fields::FRAME_START)
            .and_then(|value| value.as_u64())
            .unwrap_or(0);
        let end = self
            .record
            .get(fields::FRAME_END)
            .and_then(|value| value.as_u64());
        (start, end)
    }

    /// Stream duration in ms, stream players only.
    pub fn duration(&self) -> Option<f64> {
        self.record
            .get(fields::DURATION)
            .and_then(|value| value.as_f64())
    }

    /// Observe frames and state changes.
    pub fn subscribe(&self) -> Result<Subscription<RecordEvent>> {
        Ok(self.record.subscribe()?)
    }

    pub fn set_control(&self, control: Control) -> Result<()> {
        self.write(update(fields::CONTROL, control))
    }

    pub fn set_loop(&self, looping: bool) -> Result<()> {
        self.write(update(fields::LOOP, looping))
    }

    pub fn set_record(&self, record: bool) -> Result<()> {
        self.write(update(fields::RECORD, record))
    }

    /// Request a playback range. The owner clamps it to the stream.
    pub fn set_range(&self, start: u64, end: Option<u64>) -> Result<()> {
        let mut values = Values::new();
        values.insert(fields::FRAME_START.into(), json!(start));
        values.insert(fields::FRAME_END.into(), json!(end));
        self.write(values)
    }

    /// Write `active`. Owner only.
    pub fn set_active(&self, active: bool) -> Result<()> {
        self.ensure_owner("active")?;
        self.write(update(fields::ACTIVE, active))
    }

    /// Publish a frame. Owner only.
    pub fn publish(&self, frame: &MultiFrame) -> Result<()> {
        self.ensure_owner("frame")?;
        let value = serde_json::to_value(frame)
            .map_err(|e| SourceError::config(&self.id, format!("frame is not serializable: {e}")))?;
        self.write(update(fields::FRAME, value))
    }

    fn ensure_owner(&self, field: &str) -> Result<()> {
        if self.is_owner() {
            return Ok(());
        }
        Err(SourceError::PermissionDenied {
            id: self.id.clone(),
            reason: format!("`{field}` is written by node {} only", self.owner()),
        })
    }

    fn write(&self, values: Values) -> Result<()> {
        Ok(self.record.set(values)?)
    }

    fn flag(&self, key: &str) -> bool {
        self.record
            .get(key)
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for SourceView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceView")
            .field("id", &self.id)
            .field("record_id", &self.record.id())
            .field("owner", &self.record.owner())
            .finish()
    }
}
