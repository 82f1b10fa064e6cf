//! Runtime module linking
//!
//! This module is the in-host half of the toolchain:
//! - A namespace tree of published exports (`Registry`)
//! - Deferred definitions keyed by the module they wait for (`PendingTable`)
//! - The define/require protocol with redefinition (`Linker`)
//! - Live instance replacement through a host page (`hot_swap`)

mod exports;
mod host;
mod hot;
mod linker;
mod pending;
mod registry;

pub use exports::{ComponentClass, ExportValue, Exports, RenderFn};
pub use host::{
    cache_bust, Host, HostError, Instance, MemoryHost, ATTR_FACTORY, ATTR_ID, ATTR_NAME, ATTR_STATE,
    CACHE_BUST_PARAM, IDENTITY_ATTRIBUTES,
};
pub use hot::hot_swap;
pub use linker::{
    DefineOutcome, Definition, DefinitionError, FactoryError, FactoryFn, FactoryScope, FutureName,
    ImportResult, Linker, ModuleState,
};
pub use pending::{PendingTable, Thunk};
pub use registry::Registry;
