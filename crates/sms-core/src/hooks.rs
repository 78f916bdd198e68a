//! Extension hooks invoked by the inbound dispatcher.
//!
//! Every capability on [`MessageHook`] is optional: the default
//! implementations return `None`, which the registry treats as "this hook
//! does not take part" and skips without error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{Event, IncomingMessage, SmsError};

#[async_trait]
pub trait MessageHook: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Reply texts for an inbound event.
    fn simple_messaging_response(&self, _event: &Event) -> Option<Vec<String>> {
        None
    }

    /// Whether the inbound event should be stored as an [`IncomingMessage`].
    fn record_response(&self, _event: &Event) -> Option<bool> {
        None
    }

    /// Side effects after an inbound message was stored.
    async fn process_incoming_message(
        &self,
        _record: &IncomingMessage,
    ) -> Option<Result<(), SmsError>> {
        None
    }
}

/// How the answers of several hooks to [`MessageHook::record_response`] combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordPolicy {
    /// Record unless any hook answers `false`.
    #[default]
    AllMustAccept,
    /// The last hook that answered decides.
    LastHookWins,
}

/// Ordered set of registered hooks.
#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn MessageHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: Arc<dyn MessageHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn responses(&self, event: &Event) -> Vec<String> {
        self.hooks
            .iter()
            .filter_map(|hook| hook.simple_messaging_response(event))
            .flatten()
            .collect()
    }

    pub fn should_record(&self, event: &Event, policy: RecordPolicy) -> bool {
        // Every hook is asked, even after a decline.
        let answers: Vec<bool> = self
            .hooks
            .iter()
            .filter_map(|hook| {
                let answer = hook.record_response(event)?;
                debug!(hook = hook.name(), answer, "record_response");
                Some(answer)
            })
            .collect();

        match policy {
            RecordPolicy::AllMustAccept => answers.iter().all(|answer| *answer),
            RecordPolicy::LastHookWins => answers.last().copied().unwrap_or(true),
        }
    }

    /// Failures are logged and do not stop the remaining hooks.
    pub async fn notify_incoming(&self, record: &IncomingMessage) {
        for hook in &self.hooks {
            if let Some(Err(e)) = hook.process_incoming_message(record).await {
                warn!(hook = hook.name(), error = %e, "process_incoming_message failed");
            }
        }
    }
}
