//! Source implementations, one per [`SourceType`].

pub mod aggregated;
pub mod comote;
pub mod core;
pub mod osc_bridge;
pub mod riot;
pub mod stream_player;

pub use aggregated::{compose, AggregatedSource};
pub use comote::ComoteSource;
pub use self::core::SourceCore;
pub use osc_bridge::OscBridgeSource;
pub use riot::RiotSource;
pub use stream_player::StreamPlayerSource;

use crate::domain::SourceType;
use std::sync::Arc;

/// A live source owned by this node.
pub enum SourceInstance {
    Riot(RiotSource),
    Comote(ComoteSource),
    Aggregated(AggregatedSource),
    OscBridge(OscBridgeSource),
    StreamPlayer(StreamPlayerSource),
}

impl SourceInstance {
    pub fn core(&self) -> &Arc<SourceCore> {
        match self {
            Self::Riot(source) => source.core(),
            Self::Comote(source) => source.core(),
            Self::Aggregated(source) => source.core(),
            Self::OscBridge(source) => source.core(),
            Self::StreamPlayer(source) => source.core(),
        }
    }

    pub fn id(&self) -> &str {
        self.core().id()
    }

    pub fn source_type(&self) -> SourceType {
        self.core().source_type()
    }

    /// Stop every task of the source. The record is left to the caller.
    pub(crate) fn close(&self) {
        match self {
            Self::Riot(source) => source.close(),
            Self::Comote(source) => source.close(),
            Self::Aggregated(source) => source.close(),
            Self::OscBridge(source) => source.close(),
            Self::StreamPlayer(source) => source.close(),
        }
    }
}
