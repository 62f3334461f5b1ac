use crate::reader::SubscriptionReader;
use crate::types::subscription::SubscriptionConfig;
use chrono::{DateTime, Utc};

/// Per-subscription producer-owned state. `end_of_bridge` and the bridge
/// itself live in the engine's shared flag/bridge vectors instead — those
/// are the parts a consumer or the control surface needs to observe;
/// everything here is touched only by the run loop.
pub struct SubscriptionState {
    pub config: SubscriptionConfig,
    pub reader: Box<dyn SubscriptionReader>,
    pub fill_forward_frontier: Option<DateTime<Utc>>,
    /// Latched when a reader call panics. The reader's own
    /// `end_of_stream()` flag may never have been set by a call that
    /// unwound mid-method, so this is tracked independently and checked
    /// alongside it wherever the run loop decides a stream is retired.
    pub faulted: bool,
}

impl SubscriptionState {
    pub fn new(config: SubscriptionConfig, reader: Box<dyn SubscriptionReader>) -> Self {
        SubscriptionState { config, reader, fill_forward_frontier: None, faulted: false }
    }
}
