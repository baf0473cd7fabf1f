use crate::Condition;

use std::sync::{Arc, Mutex, MutexGuard};

/// Options layered onto every query compiled while the scope is active.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Merged by AND with the query's own condition.
    pub condition: Option<Condition>,

    /// Used when the query specifies no ordering of its own.
    pub order: Option<String>,
}

impl Scope {
    pub fn with_condition(condition: Condition) -> Self {
        Self {
            condition: Some(condition),
            ..Self::default()
        }
    }
}

/// A stack of active scopes. Pushing returns a guard; the scope stays
/// active until the guard drops, on every exit path including panics.
/// Queries see the innermost scope only.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    stack: Arc<Mutex<Vec<Scope>>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, scope: Scope) -> ScopeGuard {
        self.lock().push(scope);
        ScopeGuard {
            stack: self.stack.clone(),
        }
    }

    /// The innermost active scope, if any.
    pub fn current(&self) -> Option<Scope> {
        self.lock().last().cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Scope>> {
        // A panic while a scope was active must not wedge the stack.
        self.stack
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[must_use = "the scope deactivates when the guard drops"]
#[derive(Debug)]
pub struct ScopeGuard {
    stack: Arc<Mutex<Vec<Scope>>>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.stack
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();
    }
}
