//! Hot reload
//!
//! - Wire format shared by both ends (`protocol`)
//! - The in-application end applying messages to a linker and host (`client`)
//! - The development server watching sources and broadcasting changes (`server`)

mod client;
mod protocol;
mod server;

pub use client::{Applied, ClientError, EvalError, Evaluator, ReloadClient};
pub use protocol::{
    message_uid, Command, Message, ProtocolError, RefreshContent, ScriptContent, StyleContent, COMMAND_TYPES,
};
pub use server::{change_message, connect_message, ReloadError, ReloadServer};
