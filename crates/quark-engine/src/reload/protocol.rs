//! Hot-reload wire format
//!
//! ```json
//! { "uid": "…", "filePath": "/app/src/card.tsx",
//!   "command": { "type": "SCRIPT", "content": { "js": "…", "moduleName": "app/card" } } }
//! ```
//!
//! `type` is written by name. Older clients send the numeric code instead
//! (`0` = `STYLE` through `3` = `REFRESH_BUNDLE`); both are accepted.

use serde::de::{self, DeserializeOwned, Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors decoding a hot-reload message
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The message is not valid JSON for the schema
    #[error("Malformed reload message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame carried no text
    #[error("Unsupported frame: {0}")]
    UnsupportedFrame(String),
}

/// One hot-reload message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Stable id of the file the message concerns
    pub uid: String,
    /// Path of that file
    pub file_path: String,
    /// What to do
    pub command: Command,
}

/// Command names, indexed by their numeric code
pub const COMMAND_TYPES: &[&str] = &["STYLE", "SCRIPT", "EVAL", "REFRESH_BUNDLE"];

/// The action a message carries
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Replace a stylesheet
    Style(StyleContent),
    /// Redefine a module and hot swap its instances
    Script(ScriptContent),
    /// Evaluate raw code
    Eval(String),
    /// Re-fetch the bundle artifacts
    RefreshBundle(RefreshContent),
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Tag {
            Code(u64),
            Name(String),
        }

        #[derive(Deserialize)]
        struct Tagged {
            #[serde(rename = "type")]
            tag: Tag,
            #[serde(default)]
            content: serde_json::Value,
        }

        fn content<T: DeserializeOwned, E: de::Error>(value: serde_json::Value) -> Result<T, E> {
            serde_json::from_value(value).map_err(E::custom)
        }

        let tagged = Tagged::deserialize(deserializer)?;
        let name = match &tagged.tag {
            Tag::Code(code) => usize::try_from(*code)
                .ok()
                .and_then(|code| COMMAND_TYPES.get(code).copied())
                .ok_or_else(|| D::Error::custom(format!("unknown command type {}", code)))?,
            Tag::Name(name) => name.as_str(),
        };

        match name {
            "STYLE" => content(tagged.content).map(Command::Style),
            "SCRIPT" => content(tagged.content).map(Command::Script),
            "EVAL" => content(tagged.content).map(Command::Eval),
            "REFRESH_BUNDLE" => content(tagged.content).map(Command::RefreshBundle),
            other => Err(D::Error::unknown_variant(other, COMMAND_TYPES)),
        }
    }
}

/// Payload of `STYLE`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleContent {
    /// Stylesheet text
    pub css: String,
    /// Token definition for scoped style modules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub js: Option<String>,
}

/// Payload of `SCRIPT`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptContent {
    /// Module definition text
    pub js: String,
    /// Full name of the redefined module
    pub module_name: String,
}

/// Payload of `REFRESH_BUNDLE`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshContent {
    /// Bundle fingerprint
    pub version: String,
    /// Artifact file names to re-fetch
    pub filenames: Vec<String>,
}

impl Message {
    /// Build a message about `file_path`, deriving its uid
    pub fn new(file_path: impl Into<String>, command: Command) -> Self {
        let file_path = file_path.into();
        Self {
            uid: message_uid(&file_path),
            file_path,
            command,
        }
    }

    /// Decode a message
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode a message
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Wire name of the command
    pub fn kind(&self) -> &'static str {
        match self.command {
            Command::Style(_) => "STYLE",
            Command::Script(_) => "SCRIPT",
            Command::Eval(_) => "EVAL",
            Command::RefreshBundle(_) => "REFRESH_BUNDLE",
        }
    }
}

/// First 17 hex characters of the path hash
pub fn message_uid(file_path: &str) -> String {
    let mut hex = hex::encode(Sha256::digest(file_path.as_bytes()));
    hex.truncate(17);
    hex
}
