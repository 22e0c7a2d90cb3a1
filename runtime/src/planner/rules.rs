//! Rule-based planner
//!
//! Evaluates an ordered list of `(predicate, actions)` rules against the
//! goal. The first matching rule wins and its actions are returned as the
//! plan; no match yields an empty plan, which is a valid "nothing to do"
//! outcome. Fully deterministic.

use crate::planner::{Planner, Result};
use async_trait::async_trait;
use regex::Regex;
use sdk::errors::AgentError;
use sdk::types::TaskDescriptor;
use tracing::debug;

/// Goal predicate for a plan rule
#[derive(Debug)]
enum Matcher {
    /// Case-insensitive substring match
    Contains(String),
    /// Regular-expression match
    Pattern(Regex),
}

/// One `predicate -> actions` rule
#[derive(Debug)]
pub struct PlanRule {
    matcher: Matcher,
    tasks: Vec<TaskDescriptor>,
}

impl PlanRule {
    /// Rule that fires when the goal contains `needle` (case-insensitive)
    pub fn contains(needle: impl Into<String>, tasks: Vec<TaskDescriptor>) -> Self {
        Self {
            matcher: Matcher::Contains(needle.into().to_lowercase()),
            tasks,
        }
    }

    /// Rule that fires when `pattern` matches the goal
    pub fn pattern(pattern: &str, tasks: Vec<TaskDescriptor>) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| AgentError::Config(format!("invalid rule pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            matcher: Matcher::Pattern(regex),
            tasks,
        })
    }

    fn matches(&self, goal: &str) -> bool {
        match &self.matcher {
            Matcher::Contains(needle) => goal.to_lowercase().contains(needle),
            Matcher::Pattern(regex) => regex.is_match(goal),
        }
    }
}

/// Deterministic planner over an ordered rule list
pub struct RulePlanner {
    rules: Vec<PlanRule>,
}

impl RulePlanner {
    pub fn new(rules: Vec<PlanRule>) -> Self {
        Self { rules }
    }

    /// Append a rule, keeping earlier rules at higher precedence
    pub fn push_rule(&mut self, rule: PlanRule) {
        self.rules.push(rule);
    }
}

#[async_trait]
impl Planner for RulePlanner {
    fn name(&self) -> &str {
        "rules"
    }

    async fn plan(&self, goal: &str, _context: &str) -> Result<Vec<TaskDescriptor>> {
        for (i, rule) in self.rules.iter().enumerate() {
            if rule.matches(goal) {
                debug!("Rule {} matched goal '{}'", i, goal);
                return Ok(rule.tasks.clone());
            }
        }
        debug!("No rule matched goal '{}', returning empty plan", goal);
        Ok(Vec::new())
    }
}
