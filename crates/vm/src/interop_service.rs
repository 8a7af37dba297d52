//! The syscall registry.

use std::collections::HashMap;

use crate::error::VmResult;
use crate::execution_engine::ExecutionEngine;

/// A syscall implementation. Returns `Ok(false)` to fault the engine
/// without a hard error (the production VM's convention for handler
/// failure).
pub type InteropHandler = fn(&mut ExecutionEngine) -> VmResult<bool>;

/// A registered syscall: its handler and base gas price.
#[derive(Clone, Copy)]
pub struct InteropDescriptor {
    pub handler: InteropHandler,
    pub price: f64,
}

/// Maps syscall names to handlers and prices.
///
/// Registration is explicit and happens before the engine runs; SYSCALL
/// dispatch resolves names against this table and faults on a miss.
#[derive(Default)]
pub struct InteropService {
    methods: HashMap<String, InteropDescriptor>,
}

impl InteropService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name` with the given base gas price.
    /// Re-registering a name replaces the previous entry.
    pub fn register(&mut self, name: &str, price: f64, handler: InteropHandler) {
        self.methods
            .insert(name.to_string(), InteropDescriptor { handler, price });
    }

    /// Looks up a descriptor by name.
    pub fn get(&self, name: &str) -> Option<InteropDescriptor> {
        self.methods.get(name).copied()
    }

    /// The base gas price registered for `name`, if any.
    pub fn price(&self, name: &str) -> Option<f64> {
        self.methods.get(name).map(|descriptor| descriptor.price)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Registered names in unspecified order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for InteropService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("InteropService")
            .field("methods", &names)
            .finish()
    }
}
