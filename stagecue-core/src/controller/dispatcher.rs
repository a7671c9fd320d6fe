//! Thin `Dispatcher` adapters that pin a fixed [`CommandSource`], mirroring
//! the teacher's `imbolc-core::dispatch::local::LocalDispatcher` split
//! between a trusted local caller and an arbitrated remote one.

use stagecue_types::{Command, CommandOutcome, CommandSource, Dispatcher};

use super::Controller;

/// Commands dispatched through this never wait behind the priority arbiter.
pub struct LocalDispatcher(pub Controller);

impl Dispatcher for LocalDispatcher {
    fn dispatch(&mut self, command: &Command) -> CommandOutcome {
        self.0.dispatch_from(CommandSource::Local, command)
    }
}

/// Commands dispatched through this are deferred whenever local priority is
/// in effect (§4.6).
pub struct RemoteDispatcher(pub Controller);

impl Dispatcher for RemoteDispatcher {
    fn dispatch(&mut self, command: &Command) -> CommandOutcome {
        self.0.dispatch_from(CommandSource::Remote, command)
    }
}
