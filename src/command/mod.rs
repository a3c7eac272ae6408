//! Inbound command handling
//!
//! - [`parser`] - decode and validate payloads into [`Command`] values
//! - [`dispatcher`] - apply commands to the output controller

pub mod dispatcher;
pub mod parser;

pub use dispatcher::{CommandDispatcher, DispatchReport};
pub use parser::{Command, CommandError, CommandParser};
