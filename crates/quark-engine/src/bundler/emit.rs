//! Script emission
//!
//! Turns one script file into the text appended to the script artifact. The
//! transform itself is pluggable; [`AmdEmitter`] wraps the source in a runtime
//! `define(...)` call without transpiling it.

use thiserror::Error;

use crate::module::FileDescription;

/// A script emitter rejected its input
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EmitError(pub String);

/// Re-emits a parsed script as a runtime module definition
pub trait ScriptEmitter: Send + Sync {
    /// Emit `source` for `file`; `specifiers` are its static dependencies in order
    fn emit(&self, file: &FileDescription, source: &str, specifiers: &[String]) -> Result<String, EmitError>;
}

/// Emits `define(name, [imports], function (require, exports) { ... });`
///
/// Import specifiers are kept as written; the runtime resolves relative ones
/// against the module's own name.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmdEmitter;

impl ScriptEmitter for AmdEmitter {
    fn emit(&self, file: &FileDescription, source: &str, specifiers: &[String]) -> Result<String, EmitError> {
        let name = serde_json::to_string(&file.full_module_name).map_err(|e| EmitError(e.to_string()))?;
        let imports = serde_json::to_string(specifiers).map_err(|e| EmitError(e.to_string()))?;

        let mut out = String::with_capacity(source.len() + name.len() + imports.len() + 64);
        out.push_str("define(");
        out.push_str(&name);
        out.push(',');
        out.push_str(&imports);
        out.push_str(",function(require,exports){\n");
        out.push_str(source);
        if !source.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("});\n");
        Ok(out)
    }
}
