//! Applying hot-reload messages inside a running application

use thiserror::Error;
use tracing::{debug, warn};

use crate::runtime::{hot_swap, Definition, DefinitionError, Host, HostError, Linker};

use super::protocol::{Command, Message, ProtocolError};

/// Evaluating code failed
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct EvalError(pub String);

/// Turns code text into module definitions
///
/// Stands in for the host's script engine.
pub trait Evaluator {
    /// Evaluate `js`, returning the definitions it makes
    fn evaluate(&mut self, js: &str) -> Result<Vec<Definition>, EvalError>;
}

/// Errors applying one message
#[derive(Debug, Error)]
pub enum ClientError {
    /// The message could not be decoded
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The carried code could not be evaluated
    #[error("Evaluation failed: {0}")]
    Eval(#[from] EvalError),

    /// A carried definition failed
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// The host rejected a swap
    #[error(transparent)]
    Host(#[from] HostError),
}

/// What applying a message did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A stylesheet was replaced
    Style,
    /// A module was redefined and this many instances swapped
    Script(usize),
    /// This many definitions were evaluated
    Eval(usize),
    /// This many assets were re-fetched
    Refresh(usize),
}

/// A running application's end of the reload channel
pub struct ReloadClient<H: Host, E: Evaluator> {
    linker: Linker,
    host: H,
    evaluator: E,
}

impl<H: Host, E: Evaluator> ReloadClient<H, E> {
    /// Create a client over a linker, host and evaluator
    pub fn new(linker: Linker, host: H, evaluator: E) -> Self {
        Self { linker, host, evaluator }
    }

    /// The linker messages are applied to
    pub fn linker(&self) -> &Linker {
        &self.linker
    }

    /// The host page
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Decode and apply one text frame
    ///
    /// Malformed messages are logged and reported; the channel stays usable.
    pub fn handle_text(&mut self, text: &str) -> Result<Applied, ClientError> {
        let message = Message::parse(text).map_err(|e| {
            warn!(error = %e, "dropping malformed reload message");
            e
        })?;
        self.handle(message)
    }

    /// Apply one message
    pub fn handle(&mut self, message: Message) -> Result<Applied, ClientError> {
        debug!(kind = message.kind(), file = %message.file_path, "applying reload message");

        match message.command {
            Command::Style(style) => {
                self.host.apply_stylesheet(&message.uid, &style.css);
                if let Some(js) = style.js {
                    for definition in self.evaluator.evaluate(&js)? {
                        self.linker.redefine(definition)?;
                    }
                }
                Ok(Applied::Style)
            }
            Command::Script(script) => {
                for definition in self.evaluator.evaluate(&script.js)? {
                    self.linker.redefine(definition)?;
                }
                let swapped = hot_swap(&self.linker, &mut self.host, &script.module_name)?;
                Ok(Applied::Script(swapped))
            }
            Command::Eval(js) => {
                let definitions = self.evaluator.evaluate(&js)?;
                let count = definitions.len();
                for definition in definitions {
                    self.linker.define(definition)?;
                }
                Ok(Applied::Eval(count))
            }
            Command::RefreshBundle(refresh) => Ok(Applied::Refresh(
                self.host.refresh_assets(&refresh.version, &refresh.filenames),
            )),
        }
    }
}
