//! Subscriber initialization and op-boundary logging macros.

pub mod init;
#[macro_use]
pub mod macros;

pub use init::{init, Profile};
