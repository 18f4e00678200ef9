//! # Stream Player
//!
//! Replays a pre-loaded stream of multichannel frames.
//!
//! ## Control
//!
//! | Field        | Effect on the owner                                     |
//! |--------------|---------------------------------------------------------|
//! | `control`    | `play` schedules playback from the cursor, `pause` stops |
//! | `loop`       | wrap to `frameStart` instead of stopping at `frameEnd`  |
//! | `frameStart` | first frame of the playback range, clamped to the stream |
//! | `frameEnd`   | last frame of the range, `null` means the last frame    |
//!
//! Frames are handed out `lookahead` ahead of their slot and stamped with the
//! wall-clock time of that slot. The delay to the next frame is the recorded
//! inter-frame delta unless a forced period is configured. At the end of the
//! range without `loop` the player writes `control = pause, active = false`
//! and leaves the scheduler.

use parking_lot::Mutex;
use serde_json::{json, Value};
use shared_bus::Values;
use shared_types::TimeSource;
use sm_03_source_protocol::MultiFrame;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::core::{watch_record, SourceCore};
use crate::domain::{fields, stream_time, Control, Result, StreamPlayerConfig};
use crate::timing::{Engine, Scheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Playback {
    playing: bool,
    /// Next frame to publish.
    cursor: usize,
    start: usize,
    end: usize,
    looping: bool,
}

struct Player {
    core: Arc<SourceCore>,
    frames: Vec<MultiFrame>,
    forced_period: Option<Duration>,
    lookahead: Duration,
    clock: Arc<dyn TimeSource>,
    scheduler: Arc<Scheduler>,
    playback: Mutex<Playback>,
}

impl Player {
    fn last_index(&self) -> usize {
        self.frames.len() - 1
    }

    /// Delay between the slots of frame `from` and frame `to`, `None` if it
    /// does not fit a `Duration`.
    fn delay(&self, from: usize, to: usize) -> Option<Duration> {
        if let Some(period) = self.forced_period {
            return Some(period);
        }
        let delta_ms = if to > from {
            stream_time(&self.frames[to]) - stream_time(&self.frames[from])
        } else {
            // wrapping around: mean recorded period
            (stream_time(&self.frames[self.last_index()]) - stream_time(&self.frames[0]))
                / self.last_index() as f64
        };
        Duration::try_from_secs_f64(delta_ms.max(0.0) / 1000.0).ok()
    }

    /// Frame `index` stamped with the wall-clock time of its slot.
    fn stamped(&self, index: usize) -> MultiFrame {
        let timestamp = self.clock.now_ms() + self.lookahead.as_secs_f64() * 1000.0;
        let frequency = self
            .forced_period
            .map(|period| 1.0 / period.as_secs_f64());
        self.frames[index]
            .iter()
            .map(|frame| frame.restamped(timestamp, frequency.unwrap_or(frame.frequency)))
            .collect()
    }

    fn play(self: &Arc<Self>) {
        {
            let mut playback = self.playback.lock();
            if playback.playing {
                return;
            }
            playback.playing = true;
            if playback.cursor < playback.start || playback.cursor > playback.end {
                playback.cursor = playback.start;
            }
        }
        self.core.set_active(true);
        self.scheduler.add(
            self.core.id(),
            Box::new(PlayerEngine(self.clone())),
            Instant::now(),
        );
        info!(source_id = %self.core.id(), "[sm-04] Playback started");
    }

    fn pause(&self) {
        let was_playing = std::mem::replace(&mut self.playback.lock().playing, false);
        self.scheduler.remove(self.core.id());
        if was_playing {
            self.core.set_active(false);
            info!(source_id = %self.core.id(), "[sm-04] Playback paused");
        }
    }

    /// Apply a range write, answering with the clamped range if it differs.
    fn set_range(&self, start: Option<&Value>, end: Option<&Value>) {
        let last = self.last_index();
        let (clamped, requested) = {
            let mut playback = self.playback.lock();
            let requested_start = start.map(index_value);
            let requested_end = end.map(index_value);
            let start = requested_start
                .unwrap_or(Some(playback.start))
                .unwrap_or(0)
                .min(last);
            let end = requested_end
                .unwrap_or(Some(playback.end))
                .unwrap_or(last)
                .clamp(start, last);
            playback.start = start;
            playback.end = end;
            if playback.cursor < start || playback.cursor > end {
                playback.cursor = start;
            }
            (
                (start, end),
                (
                    requested_start.map(|s| s.unwrap_or(usize::MAX)),
                    requested_end.map(|e| e.unwrap_or(last)),
                ),
            )
        };
        let (start, end) = clamped;
        let start_differs = requested.0.is_some_and(|s| s != start);
        let end_differs = requested.1.is_some_and(|e| e != end);
        if start_differs || end_differs {
            let mut values = Values::new();
            values.insert(fields::FRAME_START.into(), json!(start));
            values.insert(fields::FRAME_END.into(), json!(end));
            self.core.set_values(values);
        }
        debug!(source_id = %self.core.id(), start, end, "[sm-04] Playback range set");
    }

    fn on_update(self: &Arc<Self>, updates: &Values) {
        if let Some(looping) = updates.get(fields::LOOP).and_then(Value::as_bool) {
            self.playback.lock().looping = looping;
        }
        let start = updates.get(fields::FRAME_START);
        let end = updates.get(fields::FRAME_END);
        if start.is_some() || end.is_some() {
            self.set_range(start, end);
        }
        match updates.get(fields::CONTROL).and_then(Control::from_value) {
            Some(Control::Play) => self.play(),
            Some(Control::Pause) => self.pause(),
            None => {}
        }
    }
}

/// Non-negative integer of a range field. `null` is `None`.
fn index_value(value: &Value) -> Option<usize> {
    value
        .as_u64()
        .map(|index| usize::try_from(index).unwrap_or(usize::MAX))
        .or_else(|| value.as_f64().map(|index| index.max(0.0) as usize))
}

struct PlayerEngine(Arc<Player>);

impl Engine for PlayerEngine {
    fn advance_time(&mut self, time: Instant) -> Option<Instant> {
        let player = &self.0;
        let mut playback = player.playback.lock();
        if !playback.playing {
            return None;
        }
        let index = playback.cursor;
        player.core.publish(&player.stamped(index));

        let delay = if index < playback.end {
            playback.cursor = index + 1;
            Some(player.delay(index, index + 1))
        } else if playback.looping {
            playback.cursor = playback.start;
            Some(player.delay(index, playback.start))
        } else {
            None
        };
        if let Some(delay) = delay {
            match delay.and_then(|delay| time.checked_add(delay)) {
                Some(next) => return Some(next),
                None => warn!(
                    source_id = %player.core.id(),
                    index,
                    "[sm-04] Next frame is out of clock range, stopping playback"
                ),
            }
        }

        playback.playing = false;
        playback.cursor = playback.start;
        drop(playback);
        let mut values = Values::new();
        values.insert(fields::CONTROL.into(), Control::Pause.into());
        values.insert(fields::ACTIVE.into(), json!(false));
        player.core.set_values(values);
        info!(source_id = %player.core.id(), "[sm-04] Playback reached end of stream");
        None
    }
}

pub struct StreamPlayerSource {
    player: Arc<Player>,
    watcher: JoinHandle<()>,
}

impl StreamPlayerSource {
    pub(crate) fn spawn(
        core: Arc<SourceCore>,
        config: &StreamPlayerConfig,
        scheduler: Arc<Scheduler>,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self> {
        let end = config.stream.len() - 1;
        let player = Arc::new(Player {
            core: core.clone(),
            frames: config.stream.clone(),
            forced_period: config
                .forced_period_ms
                .and_then(|period| Duration::try_from_secs_f64(period / 1000.0).ok()),
            lookahead: scheduler.lookahead(),
            clock,
            scheduler,
            playback: Mutex::new(Playback {
                playing: false,
                cursor: 0,
                start: 0,
                end,
                looping: config.looping,
            }),
        });
        let handler = player.clone();
        let watcher = watch_record(core, move |updates| handler.on_update(updates))?;
        Ok(Self { player, watcher })
    }

    pub fn core(&self) -> &Arc<SourceCore> {
        &self.player.core
    }

    pub fn frame_count(&self) -> usize {
        self.player.frames.len()
    }

    pub fn is_playing(&self) -> bool {
        self.player.playback.lock().playing
    }

    /// `(frameStart, frameEnd)` in effect.
    pub fn range(&self) -> (usize, usize) {
        let playback = self.player.playback.lock();
        (playback.start, playback.end)
    }

    pub(crate) fn close(&self) {
        self.player.playback.lock().playing = false;
        self.player.scheduler.remove(self.player.core.id());
        self.watcher.abort();
        self.player.core.close();
    }
}
