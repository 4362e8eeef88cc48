//! Domain entities shared by the relay and its clients.
//!
//! Everything in here is a plain value type: no I/O, no locking, no async.

pub mod frame;
pub mod history;
pub mod role;

pub use frame::AudioFrame;
pub use history::RollingBuffer;
pub use role::Role;
