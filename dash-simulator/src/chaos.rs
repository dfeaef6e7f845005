//! Chaos module.
//!
//! Fault injection for the simulated DPU: refuse named commands on create,
//! on remove, or become unreachable altogether.

use std::collections::HashSet;

use dash_core::Operation;

#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    reject_create: HashSet<String>,
    reject_remove: HashSet<String>,
    unreachable: bool,
}

impl FaultPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses `name` for both operations.
    pub fn reject(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.reject_create.insert(name.clone());
        self.reject_remove.insert(name);
        self
    }

    pub fn reject_create(mut self, name: impl Into<String>) -> Self {
        self.reject_create.insert(name.into());
        self
    }

    pub fn reject_remove(mut self, name: impl Into<String>) -> Self {
        self.reject_remove.insert(name.into());
        self
    }

    pub fn unreachable(mut self, unreachable: bool) -> Self {
        self.unreachable = unreachable;
        self
    }

    pub fn is_unreachable(&self) -> bool {
        self.unreachable
    }

    pub fn rejects(&self, name: &str, op: Operation) -> bool {
        match op {
            Operation::Create => self.reject_create.contains(name),
            Operation::Remove => self.reject_remove.contains(name),
        }
    }
}
