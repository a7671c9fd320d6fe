use serde::{Deserialize, Serialize};

use crate::event::KernelEvent;

/// Result of dispatching one [`crate::command::Command`]. Mirrors the
/// `success=false` + reason contract of §7: preconditions, capacity limits,
/// and deferral are all reported here rather than raised as errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub reason: Option<String>,
    pub events: Vec<KernelEvent>,
}

impl CommandOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            reason: None,
            events: Vec::new(),
        }
    }

    pub fn ok_with_events(events: Vec<KernelEvent>) -> Self {
        Self {
            success: true,
            reason: None,
            events,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
            events: Vec::new(),
        }
    }

    pub fn deferred() -> Self {
        Self::failed("deferred")
    }

    pub fn push_event(&mut self, event: KernelEvent) {
        self.events.push(event);
    }

    /// Extends `self` with `other`'s events and keeps `self.success` only if
    /// both were successful, mirroring the teacher's `DispatchResult::merge`.
    pub fn merge(&mut self, other: CommandOutcome) {
        self.success = self.success && other.success;
        if self.reason.is_none() {
            self.reason = other.reason;
        }
        self.events.extend(other.events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_has_no_reason() {
        let o = CommandOutcome::ok();
        assert!(o.success);
        assert!(o.reason.is_none());
    }

    #[test]
    fn deferred_carries_deferred_reason() {
        let o = CommandOutcome::deferred();
        assert!(!o.success);
        assert_eq!(o.reason.as_deref(), Some("deferred"));
    }

    #[test]
    fn merge_extends_events_and_ands_success() {
        let mut a = CommandOutcome::ok_with_events(vec![KernelEvent::PlaybackStopped]);
        let b = CommandOutcome::failed("nope");
        a.merge(b);
        assert!(!a.success);
        assert_eq!(a.reason.as_deref(), Some("nope"));
        assert_eq!(a.events.len(), 1);
    }
}
