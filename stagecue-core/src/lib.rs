//! Show controller core: configuration, persistence, the cue catalog,
//! breakpoint store, event bus, and the controller kernel itself (L2–L4 and
//! C, per the component table).

pub mod breakpoints;
pub mod bus;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod persistence;
pub mod time;

pub use breakpoints::BreakpointStore;
pub use bus::EventBus;
pub use catalog::CueCatalog;
pub use config::Config;
pub use controller::{Controller, LocalDispatcher, RemoteDispatcher};
pub use error::KernelError;
