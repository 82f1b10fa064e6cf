//! Define/require linking
//!
//! Modules arrive in any order. A definition whose imports are all published
//! runs at once; otherwise it is parked in the pending table under every name
//! it is missing and retried when one of them is published.
//!
//! # Lookup Rules
//! For `require(specifier, context)`:
//! 1. Framework alias (`quark`, `quark-ts`, `quark/...`): the framework namespace
//! 2. Relative (`./`, `../`): `sum_path(context, specifier)`
//! 3. Bare: `<base package>/<specifier>`, then `<specifier>` as a full name

use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use crate::module::{dirname, sum_path};
use crate::{is_framework_specifier, FRAMEWORK_ALIASES};

use super::exports::Exports;
use super::pending::{PendingTable, Thunk};
use super::registry::Registry;

/// A module factory reported failure
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct FactoryError(pub String);

impl From<&str> for FactoryError {
    fn from(message: &str) -> Self {
        FactoryError(message.to_string())
    }
}

impl From<String> for FactoryError {
    fn from(message: String) -> Self {
        FactoryError(message)
    }
}

/// Errors that can occur while defining a module
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The factory failed; nothing was published
    #[error("Factory for module '{module}' failed: {source}")]
    Factory {
        module: String,
        #[source]
        source: FactoryError,
    },

    /// The module name has no segments
    #[error("Invalid module name: '{0}'")]
    InvalidName(String),
}

/// Signature of a module factory
pub type FactoryFn = dyn Fn(&FactoryScope<'_>, &mut Exports) -> Result<(), FactoryError> + Send + Sync;

/// A module definition: name, import specifiers and factory
#[derive(Clone)]
pub struct Definition {
    /// Full module name (`package/module`)
    pub name: String,
    /// Import specifiers, as written in the source
    pub imports: Vec<String>,
    factory: Arc<FactoryFn>,
}

impl Definition {
    /// Create a definition
    pub fn new(
        name: impl Into<String>,
        imports: Vec<String>,
        factory: impl Fn(&FactoryScope<'_>, &mut Exports) -> Result<(), FactoryError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            imports,
            factory: Arc::new(factory),
        }
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("name", &self.name)
            .field("imports", &self.imports)
            .finish_non_exhaustive()
    }
}

/// What a factory sees while it runs
pub struct FactoryScope<'a> {
    module: &'a str,
    imports: &'a [(String, Arc<Exports>)],
    linker: &'a Linker,
}

impl<'a> FactoryScope<'a> {
    /// Name of the module being defined
    pub fn module_name(&self) -> &str {
        self.module
    }

    /// Look a specifier up relative to the module being defined
    ///
    /// Covers imports the factory did not declare: a module that is not
    /// published yet comes back as [`ImportResult::Pending`].
    pub fn require(&self, specifier: &str) -> ImportResult {
        self.linker.require(specifier, dirname(self.module))
    }

    /// Lifecycle state of any module, including the one being defined
    pub fn state(&self, name: &str) -> ModuleState {
        self.linker.state(name)
    }

    /// Exports of an import, by its specifier
    pub fn import(&self, specifier: &str) -> Option<&Arc<Exports>> {
        self.imports
            .iter()
            .find(|(spec, _)| spec == specifier)
            .map(|(_, exports)| exports)
    }

    /// All imports, in declaration order
    pub fn imports(&self) -> impl Iterator<Item = (&'a str, &'a Arc<Exports>)> {
        self.imports.iter().map(|(spec, exports)| (spec.as_str(), exports))
    }
}

/// Name an unpublished import will be published under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FutureName {
    /// First name tried
    pub primary: String,
    /// Global name tried second (bare specifiers only)
    pub fallback: Option<String>,
}

impl FutureName {
    /// Every candidate, primary first
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.fallback.as_deref())
    }
}

/// Result of a require
#[derive(Debug, Clone)]
pub enum ImportResult {
    /// The module is published
    Resolved(Arc<Exports>),
    /// Not yet published
    Pending(FutureName),
}

/// Result of a successful define call
#[derive(Debug, Clone)]
pub enum DefineOutcome {
    /// The factory ran and the exports are published
    Defined(Arc<Exports>),
    /// Blocked on these future names; a retry is registered under each
    Pending(Vec<String>),
    /// The name was already published; nothing ran
    AlreadyDefined(Arc<Exports>),
}

/// Lifecycle of a module name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Never defined, nothing waiting
    Unseen,
    /// Parked in the pending table
    PendingOnDeps,
    /// Published
    Defined,
    /// Factory running for a redefinition
    Redefining,
}

/// The runtime linker: registry, pending table and lookup rules
pub struct Linker {
    registry: Registry,
    pending: PendingTable,
    base_package: String,
    redefining: Option<String>,
}

impl Linker {
    /// Create a linker for an application package
    pub fn new(base_package: impl Into<String>) -> Self {
        Self {
            registry: Registry::new(),
            pending: PendingTable::new(),
            base_package: base_package.into(),
            redefining: None,
        }
    }

    /// Package bare specifiers are tried against first
    pub fn base_package(&self) -> &str {
        &self.base_package
    }

    /// Published modules
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Current lifecycle state of `name`
    pub fn state(&self, name: &str) -> ModuleState {
        if self.redefining.as_deref() == Some(name) {
            ModuleState::Redefining
        } else if self.registry.get_exact(name).is_some() {
            ModuleState::Defined
        } else if !self.pending.waiting_on(name).is_empty() {
            ModuleState::PendingOnDeps
        } else {
            ModuleState::Unseen
        }
    }

    /// Dependents blocked on `future`
    pub fn pending_on(&self, future: &str) -> Vec<&str> {
        self.pending.dependents(future)
    }

    /// Number of futures with blocked dependents
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Look a specifier up relative to `context` (a module-name directory)
    pub fn require(&self, specifier: &str, context: &str) -> ImportResult {
        let future = self.future_name(specifier, context);
        let published = future.candidates().find_map(|name| self.registry.get(name));
        match published {
            Some(exports) => ImportResult::Resolved(exports),
            None => ImportResult::Pending(future),
        }
    }

    fn future_name(&self, specifier: &str, context: &str) -> FutureName {
        if is_framework_specifier(specifier) {
            let rest = specifier.split_once('/').map(|(_, rest)| rest).unwrap_or("");
            let primary = if rest.is_empty() {
                FRAMEWORK_ALIASES[0].to_string()
            } else {
                format!("{}/{}", FRAMEWORK_ALIASES[0], rest)
            };
            return FutureName { primary, fallback: None };
        }

        if specifier.starts_with('.') {
            return FutureName {
                primary: sum_path(context, specifier),
                fallback: None,
            };
        }

        FutureName {
            primary: format!("{}/{}", self.base_package, specifier),
            fallback: Some(specifier.to_string()),
        }
    }

    /// Define a module; a no-op when the name is already published
    pub fn define(&mut self, definition: Definition) -> Result<DefineOutcome, DefinitionError> {
        self.define_and_settle(definition, false)
    }

    /// Define a module, replacing any published exports
    ///
    /// A failed redefinition leaves the previous exports in place. The module
    /// reports [`ModuleState::Redefining`] while its factory runs.
    pub fn redefine(&mut self, definition: Definition) -> Result<DefineOutcome, DefinitionError> {
        self.define_and_settle(definition, true)
    }

    fn define_and_settle(&mut self, definition: Definition, overwrite: bool) -> Result<DefineOutcome, DefinitionError> {
        let name = definition.name.clone();
        let outcome = self.link(definition, overwrite)?;
        if let DefineOutcome::Defined(_) = outcome {
            self.settle(name);
        }
        Ok(outcome)
    }

    /// Publish the framework's own exports under its alias
    pub fn install_framework(&mut self, exports: Exports) -> Arc<Exports> {
        let name = FRAMEWORK_ALIASES[0];
        let handle = Arc::new(exports);
        self.registry.insert(name, handle.clone());
        self.settle(name.to_string());
        handle
    }

    /// Publish a scoped style module
    ///
    /// `default` maps every token to its prefixed class name; each token is
    /// also exported on its own. Always replaces earlier exports.
    pub fn define_style(&mut self, name: &str, unique_id: &str, tokens: &[String]) -> Arc<Exports> {
        let mut classes = Map::new();
        let mut exports = Exports::new();
        for token in tokens {
            let class = format!("{}_{}", unique_id, token);
            classes.insert(token.clone(), Value::String(class.clone()));
            exports.insert(token.clone(), Value::String(class));
        }
        exports.insert("default", Value::Object(classes));

        let handle = Arc::new(exports);
        self.registry.insert(name, handle.clone());
        debug!(module = name, tokens = tokens.len(), "defined style module");
        self.pending.forget(name);
        self.settle(name.to_string());
        handle
    }

    fn link(&mut self, definition: Definition, overwrite: bool) -> Result<DefineOutcome, DefinitionError> {
        if definition.name.split('/').all(str::is_empty) {
            return Err(DefinitionError::InvalidName(definition.name));
        }

        if !overwrite {
            if let Some(existing) = self.registry.get_exact(&definition.name) {
                debug!(module = %definition.name, "already defined");
                return Ok(DefineOutcome::AlreadyDefined(existing));
            }
        }

        let context = dirname(&definition.name);
        let mut resolved = Vec::with_capacity(definition.imports.len());
        let mut missing: Vec<String> = Vec::new();

        for specifier in &definition.imports {
            match self.require(specifier, context) {
                ImportResult::Resolved(exports) => resolved.push((specifier.clone(), exports)),
                ImportResult::Pending(future) => {
                    for name in future.candidates() {
                        if !missing.iter().any(|m| m == name) {
                            missing.push(name.to_string());
                        }
                    }
                }
            }
        }

        if !missing.is_empty() {
            debug!(module = %definition.name, waiting_on = ?missing, "deferring definition");
            let thunk = Thunk { definition, overwrite };
            for future in &missing {
                self.pending.register(future, thunk.clone());
            }
            return Ok(DefineOutcome::Pending(missing));
        }

        if overwrite {
            self.redefining = Some(definition.name.clone());
        }
        let mut exports = Exports::new();
        let scope = FactoryScope {
            module: &definition.name,
            imports: &resolved,
            linker: &*self,
        };
        let ran = (definition.factory)(&scope, &mut exports);
        self.redefining = None;

        if let Err(source) = ran {
            error!(module = %definition.name, error = %source, "module factory failed");
            return Err(DefinitionError::Factory {
                module: definition.name,
                source,
            });
        }
        exports.stamp(&definition.name);

        let handle = Arc::new(exports);
        self.registry.insert(&definition.name, handle.clone());
        self.pending.forget(&definition.name);
        debug!(module = %definition.name, "defined");
        Ok(DefineOutcome::Defined(handle))
    }

    /// Retry everything blocked on `name` (or on the package it is the index
    /// of), then on every module those retries publish
    fn settle(&mut self, name: String) {
        let mut published = VecDeque::from([name]);

        while let Some(name) = published.pop_front() {
            let mut futures = vec![name.clone()];
            if let Some(package) = name.strip_suffix("/index") {
                futures.push(package.to_string());
            }

            for future in futures {
                for thunk in self.pending.take(&future) {
                    debug!(module = %thunk.definition.name, unblocked_by = %future, "retrying definition");
                    let retried = thunk.definition.name.clone();
                    // Failures are logged by `link` and leave the module undefined
                    if let Ok(DefineOutcome::Defined(_)) = self.link(thunk.definition, thunk.overwrite) {
                        published.push_back(retried);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constant(name: &str, imports: &[&str], value: i64) -> Definition {
        Definition::new(
            name,
            imports.iter().map(|s| s.to_string()).collect(),
            move |_, exports| {
                exports.insert("value", json!(value));
                Ok(())
            },
        )
    }

    fn value_of(linker: &Linker, name: &str) -> Option<i64> {
        linker.registry().get(name)?.value("value")?.as_i64()
    }

    #[test]
    fn test_define_with_existing_import_publishes_immediately() {
        let mut linker = Linker::new("app");
        linker.define(constant("app/dep", &[], 1)).unwrap();

        let outcome = linker.define(constant("app/main", &["./dep"], 2)).unwrap();
        assert!(matches!(outcome, DefineOutcome::Defined(_)));
        assert_eq!(value_of(&linker, "app/main"), Some(2));
        assert_eq!(linker.pending_count(), 0);
    }

    #[test]
    fn test_missing_import_registers_one_thunk() {
        let mut linker = Linker::new("app");
        let outcome = linker.define(constant("app/main", &["./dep"], 2)).unwrap();

        assert!(matches!(&outcome, DefineOutcome::Pending(f) if f == &vec!["app/dep".to_string()]));
        assert!(linker.registry().get("app/main").is_none());
        assert_eq!(linker.pending_on("app/dep"), vec!["app/main"]);
        assert_eq!(linker.pending_count(), 1);
        assert_eq!(linker.state("app/main"), ModuleState::PendingOnDeps);

        linker.define(constant("app/dep", &[], 1)).unwrap();
        assert_eq!(value_of(&linker, "app/main"), Some(2));
        assert_eq!(linker.state("app/main"), ModuleState::Defined);
        assert_eq!(linker.pending_count(), 0);
    }

    #[test]
    fn test_factory_sees_resolved_imports() {
        let mut linker = Linker::new("app");
        linker.define(constant("app/lib/base", &[], 40)).unwrap();
        linker
            .define(Definition::new(
                "app/lib/sum",
                vec!["./base".to_string()],
                |scope, exports| {
                    let base = scope.import("./base").and_then(|e| e.value("value")).and_then(|v| v.as_i64());
                    exports.insert("value", json!(base.unwrap_or(0) + 2));
                    exports.insert("module", json!(scope.module_name()));
                    Ok(())
                },
            ))
            .unwrap();

        assert_eq!(value_of(&linker, "app/lib/sum"), Some(42));
    }

    #[test]
    fn test_ordinary_define_is_noop_when_defined() {
        let mut linker = Linker::new("app");
        linker.define(constant("app/a", &[], 1)).unwrap();
        let outcome = linker.define(constant("app/a", &[], 2)).unwrap();

        assert!(matches!(outcome, DefineOutcome::AlreadyDefined(_)));
        assert_eq!(value_of(&linker, "app/a"), Some(1));
    }

    #[test]
    fn test_redefine_overwrites() {
        let mut linker = Linker::new("app");
        linker.define(constant("app/a", &[], 1)).unwrap();
        linker.redefine(constant("app/a", &[], 2)).unwrap();
        assert_eq!(value_of(&linker, "app/a"), Some(2));
        assert_eq!(linker.state("app/a"), ModuleState::Defined);
    }

    #[test]
    fn test_factory_error_publishes_nothing() {
        let mut linker = Linker::new("app");
        let failing = Definition::new("app/broken", Vec::new(), |_, exports| {
            exports.insert("partial", json!(true));
            Err("boom".into())
        });

        let result = linker.define(failing);
        assert!(matches!(result, Err(DefinitionError::Factory { .. })));
        assert!(linker.registry().get("app/broken").is_none());
        assert_eq!(linker.pending_count(), 0);
        assert_eq!(linker.state("app/broken"), ModuleState::Unseen);
    }

    #[test]
    fn test_failed_redefine_keeps_old_exports() {
        let mut linker = Linker::new("app");
        linker.define(constant("app/a", &[], 1)).unwrap();
        let result = linker.redefine(Definition::new("app/a", Vec::new(), |_, _| Err("boom".into())));

        assert!(result.is_err());
        assert_eq!(value_of(&linker, "app/a"), Some(1));
    }

    #[test]
    fn test_cycle_stays_pending() {
        let mut linker = Linker::new("app");
        linker.define(constant("app/a", &["./b"], 1)).unwrap();
        linker.define(constant("app/b", &["./a"], 2)).unwrap();

        assert!(linker.registry().is_empty());
        assert_eq!(linker.state("app/a"), ModuleState::PendingOnDeps);
        assert_eq!(linker.state("app/b"), ModuleState::PendingOnDeps);
    }

    #[test]
    fn test_bare_specifier_lookup_order() {
        let mut linker = Linker::new("app");
        linker.define(constant("colors/index", &[], 7)).unwrap();
        linker.define(constant("app/colors", &[], 8)).unwrap();

        match linker.require("colors", "ui") {
            ImportResult::Resolved(exports) => assert_eq!(exports.value("value"), Some(&json!(8))),
            ImportResult::Pending(_) => panic!("expected app/colors"),
        }

        match linker.require("icons", "") {
            ImportResult::Pending(future) => {
                assert_eq!(future.primary, "app/icons");
                assert_eq!(future.fallback.as_deref(), Some("icons"));
            }
            ImportResult::Resolved(_) => panic!("icons is not defined"),
        }
    }

    #[test]
    fn test_package_index_unblocks_bare_import() {
        let mut linker = Linker::new("app");
        linker.define(constant("app/main", &["colors"], 1)).unwrap();
        assert_eq!(linker.pending_on("colors"), vec!["app/main"]);

        linker.define(constant("colors/index", &[], 7)).unwrap();
        assert_eq!(value_of(&linker, "app/main"), Some(1));
        assert_eq!(linker.pending_count(), 0);
    }

    #[test]
    fn test_framework_alias() {
        let mut linker = Linker::new("app");
        linker.define(constant("app/main", &["quark-ts"], 1)).unwrap();
        assert_eq!(linker.pending_on("quark"), vec!["app/main"]);

        let mut framework = Exports::new();
        framework.insert("version", json!("2"));
        linker.install_framework(framework);
        assert_eq!(value_of(&linker, "app/main"), Some(1));

        linker.define(constant("quark/lib/JSX", &[], 3)).unwrap();
        assert!(matches!(linker.require("quark-ts/lib/JSX", "app"), ImportResult::Resolved(_)));
    }

    #[test]
    fn test_define_style_tokens() {
        let mut linker = Linker::new("app");
        let tokens = vec!["foo".to_string(), "bar".to_string()];
        let exports = linker.define_style("app/card.module.css", "a1234567", &tokens);

        assert_eq!(exports.value("foo"), Some(&json!("a1234567_foo")));
        assert_eq!(
            exports.value("default"),
            Some(&json!({ "foo": "a1234567_foo", "bar": "a1234567_bar" }))
        );
    }

    #[test]
    fn test_invalid_name() {
        let mut linker = Linker::new("app");
        let result = linker.define(constant("/", &[], 1));
        assert!(matches!(result, Err(DefinitionError::InvalidName(_))));
    }
}
