use crate::command::Command;
use crate::outcome::CommandOutcome;

/// Single entry point a command of either source traverses. Implemented by
/// the kernel itself (see `stagecue-core::controller`); local and remote
/// command sources both hold a `dyn Dispatcher` rather than poking at
/// controller internals directly.
pub trait Dispatcher {
    fn dispatch(&mut self, command: &Command) -> CommandOutcome;
}
