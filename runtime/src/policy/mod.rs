//! Policy engine
//!
//! Pure evaluation of permissions, numeric operational limits, and boolean
//! safety rules against a context. Every task the agent plans passes
//! through these checks before it can reach the executor.
//!
//! - **Permissions** are `(subject, permission)` pairs. A subject with no
//!   registered entries is unconstrained; the first `add_permission` call
//!   for a subject switches it to allow-list semantics.
//! - **Operational limits** are named maxima with current/max semantics.
//!   A limit may carry a reset window (e.g. daily); usage recorded via
//!   `record_usage` counts against the maximum until the window lapses.
//! - **Safety rules** are named boolean predicates over a JSON context
//!   map. `check_all_safety_rules` passes only when every registered rule
//!   passes.
//!
//! Updates replace or add entries and take effect for all subsequent
//! checks immediately. Interior locks make checks and updates safe across
//! concurrent trigger callbacks.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A registered safety-rule predicate
type SafetyRule = Box<dyn Fn(&serde_json::Map<String, Value>) -> bool + Send + Sync>;

/// A named numeric limit with optional windowed usage accrual
struct OperationalLimit {
    max: f64,
    window: Option<Duration>,
    used: f64,
    window_started: Instant,
}

impl OperationalLimit {
    /// Usage that still counts against the maximum. Lapsed windows
    /// contribute nothing, without requiring a mutating reset.
    fn effective_used(&self) -> f64 {
        match self.window {
            Some(window) if self.window_started.elapsed() >= window => 0.0,
            _ => self.used,
        }
    }
}

/// Permission, limit, and safety-rule evaluator gating task dispatch
#[derive(Default)]
pub struct PolicyEngine {
    permissions: RwLock<HashMap<String, HashSet<String>>>,
    limits: RwLock<HashMap<String, OperationalLimit>>,
    rules: RwLock<HashMap<String, SafetyRule>>,
}

impl PolicyEngine {
    /// Create an empty policy engine: no permissions, limits, or rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `permission` to `subject`
    pub fn add_permission(&self, subject: impl Into<String>, permission: impl Into<String>) {
        let subject = subject.into();
        let permission = permission.into();
        debug!("Granting permission '{}' to '{}'", permission, subject);
        let mut permissions = self.permissions.write().unwrap_or_else(|e| e.into_inner());
        permissions.entry(subject).or_default().insert(permission);
    }

    /// True iff `subject` may use `permission`
    ///
    /// A subject with no registered entries passes every check; adding the
    /// first permission for a subject switches it to allow-list semantics.
    pub fn check_permission(&self, subject: &str, permission: &str) -> bool {
        let permissions = self.permissions.read().unwrap_or_else(|e| e.into_inner());
        match permissions.get(subject) {
            Some(granted) => granted.contains(permission),
            None => true,
        }
    }

    /// Set or replace a named limit with no reset window
    pub fn set_operational_limit(&self, name: impl Into<String>, max: f64) {
        self.set_windowed_limit(name, max, None);
    }

    /// Set or replace a named limit that resets after `window`
    pub fn set_windowed_limit(&self, name: impl Into<String>, max: f64, window: Option<Duration>) {
        let name = name.into();
        debug!("Setting operational limit '{}' to {}", name, max);
        let mut limits = self.limits.write().unwrap_or_else(|e| e.into_inner());
        limits.insert(
            name,
            OperationalLimit {
                max,
                window,
                used: 0.0,
                window_started: Instant::now(),
            },
        );
    }

    /// True iff `value` does not exceed the remaining budget of the named
    /// limit. A limit that was never configured does not constrain.
    pub fn check_operational_limit(&self, name: &str, value: f64) -> bool {
        let limits = self.limits.read().unwrap_or_else(|e| e.into_inner());
        match limits.get(name) {
            Some(limit) => {
                let allowed = limit.effective_used() + value <= limit.max;
                if !allowed {
                    warn!(
                        "Operational limit '{}' exceeded: {} + {} > {}",
                        name,
                        limit.effective_used(),
                        value,
                        limit.max
                    );
                }
                allowed
            }
            None => true,
        }
    }

    /// Accrue `value` against the named limit's current window
    ///
    /// Call after the corresponding action actually executed. Unknown
    /// limit names are ignored.
    pub fn record_usage(&self, name: &str, value: f64) {
        let mut limits = self.limits.write().unwrap_or_else(|e| e.into_inner());
        if let Some(limit) = limits.get_mut(name) {
            if let Some(window) = limit.window {
                if limit.window_started.elapsed() >= window {
                    limit.used = 0.0;
                    limit.window_started = Instant::now();
                }
            }
            limit.used += value;
            debug!("Limit '{}' usage now {}/{}", name, limit.used, limit.max);
        }
    }

    /// Register or replace a named safety rule
    pub fn add_safety_rule<F>(&self, name: impl Into<String>, rule: F)
    where
        F: Fn(&serde_json::Map<String, Value>) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        debug!("Registering safety rule '{}'", name);
        let mut rules = self.rules.write().unwrap_or_else(|e| e.into_inner());
        rules.insert(name, Box::new(rule));
    }

    /// Evaluate one named rule against the context
    ///
    /// An unregistered rule name fails the check: a caller asking about a
    /// rule by name expects it to exist.
    pub fn check_safety_rule(&self, name: &str, context: &serde_json::Map<String, Value>) -> bool {
        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        match rules.get(name) {
            Some(rule) => rule(context),
            None => {
                warn!("Safety rule '{}' is not registered", name);
                false
            }
        }
    }

    /// True iff every registered rule passes for the context
    pub fn check_all_safety_rules(&self, context: &serde_json::Map<String, Value>) -> bool {
        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        for (name, rule) in rules.iter() {
            if !rule(context) {
                warn!("Safety rule '{}' rejected the context", name);
                return false;
            }
        }
        true
    }

    /// Number of registered safety rules
    pub fn safety_rule_count(&self) -> usize {
        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        rules.len()
    }
}
