//! Linkage registrations: the symbol names under which native toolchains expect the boundary
//! function. Every registration resolves to the same entry point; only metadata differs.

use std::collections::BTreeMap;

use crate::bridge::DeliverySink;
use crate::memory::{LinearMemory, TransferRequest};

/// Unmangled name the native side calls.
pub const SYMBOL: &str = "downloadFile";

/// Implementation-reserved prefix some toolchains require on library symbols.
pub const RESERVED_PREFIX: &str = "_";

/// `SYMBOL` with `RESERVED_PREFIX`.
pub const PREFIXED_SYMBOL: &str = "_downloadFile";

const NO_DEPS: &[&str] = &[];

/// Boundary entry point over raw native arguments: source address, length, name address.
pub type BoundaryFn = fn(&dyn DeliverySink, &dyn LinearMemory, usize, i64, usize);

/// The one implementation every registration points at.
pub fn boundary_entry(
    sink: &dyn DeliverySink,
    memory: &dyn LinearMemory,
    source_address: usize,
    length: i64,
    name_address: usize,
) {
    sink.deliver(
        memory,
        TransferRequest::from_raw(source_address, length, name_address),
    );
}

/// How a toolchain configuration expects the symbol to be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Linkage {
    /// Merged into the global table under the unmangled name.
    Direct,
    /// Reserved-prefix name plus an explicit (empty) dependency list, so dependency-closure
    /// linkers keep the symbol even when nothing else references it.
    PrefixedWithDeps,
    /// Reserved-prefix name only, for toolchains that resolve eagerly.
    Prefixed,
}

impl Linkage {
    pub const ALL: [Linkage; 3] = [Linkage::Direct, Linkage::PrefixedWithDeps, Linkage::Prefixed];

    pub fn symbol(self) -> &'static str {
        match self {
            Linkage::Direct => SYMBOL,
            Linkage::PrefixedWithDeps | Linkage::Prefixed => PREFIXED_SYMBOL,
        }
    }

    /// Declared dependency list, if this registration carries one.
    pub fn deps(self) -> Option<&'static [&'static str]> {
        match self {
            Linkage::PrefixedWithDeps => Some(NO_DEPS),
            Linkage::Direct | Linkage::Prefixed => None,
        }
    }

    pub fn entry(self) -> BoundaryFn {
        boundary_entry
    }
}

/// One symbol's registration metadata.
#[derive(Clone, Copy)]
pub struct Registration {
    pub linkage: Linkage,
    pub entry: BoundaryFn,
}

impl Registration {
    pub fn new(linkage: Linkage) -> Self {
        Self {
            linkage,
            entry: linkage.entry(),
        }
    }

    pub fn deps(&self) -> Option<&'static [&'static str]> {
        self.linkage.deps()
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("linkage", &self.linkage)
            .field("deps", &self.deps())
            .finish()
    }
}

/// Symbol table a library is merged into.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: BTreeMap<&'static str, Registration>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the boundary function under `linkage`. A later merge of the same symbol wins;
    /// the replaced registration is returned.
    pub fn merge(&mut self, linkage: Linkage) -> Option<Registration> {
        self.entries.insert(linkage.symbol(), Registration::new(linkage))
    }

    pub fn lookup(&self, symbol: &str) -> Option<&Registration> {
        self.entries.get(symbol)
    }

    /// Whether a dependency-closure linker keeps `symbol` without other references.
    pub fn retains(&self, symbol: &str) -> bool {
        self.lookup(symbol).map(|r| r.deps().is_some()).unwrap_or(false)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Call `symbol` as the native side would.
    pub fn invoke(
        &self,
        symbol: &str,
        sink: &dyn DeliverySink,
        memory: &dyn LinearMemory,
        source_address: usize,
        length: i64,
        name_address: usize,
    ) -> Result<(), LinkError> {
        let reg = self
            .lookup(symbol)
            .ok_or_else(|| LinkError::Unresolved(symbol.to_string()))?;
        (reg.entry)(sink, memory, source_address, length, name_address);
        Ok(())
    }
}

/// Error resolving a symbol in a `SymbolTable`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("unresolved symbol: {0}")]
    Unresolved(String),
}
