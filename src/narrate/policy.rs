//! Per-class policy tables.
//!
//! Each detection class maps to a danger weight (feeds urgency), a coarse
//! priority rank 1..=5 (narration eligibility), and a phrase category (which
//! template family narrates it). The built-in table is loaded once at startup
//! and may be extended or overridden from a JSON file; lookups never mutate.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Lowest priority rank. Classes at this rank are never narrated.
pub const NUISANCE_PRIORITY: u8 = 1;
/// Highest priority rank.
pub const MAX_PRIORITY: u8 = 5;

/// Template family used when narrating a class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassCategory {
    Stairs,
    Vehicle,
    Person,
    Door,
    Furniture,
    #[default]
    Generic,
}

impl ClassCategory {
    pub fn key(self) -> &'static str {
        match self {
            ClassCategory::Stairs => "stairs",
            ClassCategory::Vehicle => "vehicle",
            ClassCategory::Person => "person",
            ClassCategory::Door => "door",
            ClassCategory::Furniture => "furniture",
            ClassCategory::Generic => "generic",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassRule {
    pub danger: f32,
    pub priority: u8,
    #[serde(default)]
    pub category: ClassCategory,
}

impl ClassRule {
    const fn new(danger: f32, priority: u8, category: ClassCategory) -> Self {
        Self {
            danger,
            priority,
            category,
        }
    }
}

/// Rule applied to classes missing from the table.
pub const UNKNOWN_CLASS_RULE: ClassRule = ClassRule::new(3.0, 2, ClassCategory::Generic);

const BUILTIN_CLASSES: &[(&str, ClassRule)] = {
    use ClassCategory::*;
    &[
        ("stairs", ClassRule::new(10.0, 5, Stairs)),
        ("escalator", ClassRule::new(10.0, 5, Stairs)),
        ("train", ClassRule::new(9.0, 5, Vehicle)),
        ("car", ClassRule::new(8.0, 5, Vehicle)),
        ("truck", ClassRule::new(8.0, 5, Vehicle)),
        ("bus", ClassRule::new(8.0, 5, Vehicle)),
        ("motorcycle", ClassRule::new(7.0, 4, Generic)),
        ("stop sign", ClassRule::new(7.0, 4, Generic)),
        ("traffic light", ClassRule::new(7.0, 4, Generic)),
        ("bicycle", ClassRule::new(6.0, 4, Generic)),
        ("fire hydrant", ClassRule::new(6.0, 3, Generic)),
        ("dog", ClassRule::new(6.0, 3, Generic)),
        ("person", ClassRule::new(5.0, 3, Person)),
        ("knife", ClassRule::new(4.0, 3, Generic)),
        ("cat", ClassRule::new(4.0, 2, Generic)),
        ("door", ClassRule::new(4.0, 4, Door)),
        ("table", ClassRule::new(4.0, 3, Furniture)),
        ("dining table", ClassRule::new(4.0, 3, Generic)),
        ("chair", ClassRule::new(3.0, 2, Furniture)),
        ("bench", ClassRule::new(3.0, 2, Furniture)),
        ("couch", ClassRule::new(3.0, 2, Generic)),
        ("wall", ClassRule::new(2.0, 2, Generic)),
        ("handbag", ClassRule::new(1.0, 1, Generic)),
        ("backpack", ClassRule::new(1.0, 1, Generic)),
        ("umbrella", ClassRule::new(1.0, 1, Generic)),
        ("bottle", ClassRule::new(1.0, 1, Generic)),
        ("cup", ClassRule::new(1.0, 1, Generic)),
        ("cell phone", ClassRule::new(1.0, 1, Generic)),
        ("laptop", ClassRule::new(1.0, 1, Generic)),
    ]
};

/// Immutable class lookup table.
#[derive(Clone, Debug)]
pub struct ClassPolicy {
    rules: HashMap<String, ClassRule>,
}

impl ClassPolicy {
    pub fn builtin() -> Self {
        Self {
            rules: BUILTIN_CLASSES
                .iter()
                .map(|(name, rule)| (name.to_string(), *rule))
                .collect(),
        }
    }

    /// Built-in table plus the overrides in a JSON object file
    /// (`{"forklift": {"danger": 8, "priority": 5, "category": "vehicle"}}`).
    pub fn with_overrides_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read class table {}: {}", path.display(), e))?;
        let overrides: HashMap<String, ClassRule> = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid class table {}: {}", path.display(), e))?;
        let mut policy = Self::builtin();
        policy.extend(overrides)?;
        Ok(policy)
    }

    pub fn extend(&mut self, overrides: HashMap<String, ClassRule>) -> Result<()> {
        for (name, rule) in overrides {
            if !(NUISANCE_PRIORITY..=MAX_PRIORITY).contains(&rule.priority) {
                return Err(anyhow!(
                    "class '{}': priority {} outside {}..={}",
                    name,
                    rule.priority,
                    NUISANCE_PRIORITY,
                    MAX_PRIORITY
                ));
            }
            if !rule.danger.is_finite() || rule.danger < 0.0 {
                return Err(anyhow!("class '{}': danger must be a non-negative number", name));
            }
            self.rules.insert(normalize_class(&name), rule);
        }
        Ok(())
    }

    pub fn rule(&self, class_name: &str) -> ClassRule {
        self.rules
            .get(&normalize_class(class_name))
            .copied()
            .unwrap_or(UNKNOWN_CLASS_RULE)
    }

    pub fn danger(&self, class_name: &str) -> f32 {
        self.rule(class_name).danger
    }

    pub fn priority(&self, class_name: &str) -> u8 {
        self.rule(class_name).priority
    }

    pub fn category(&self, class_name: &str) -> ClassCategory {
        self.rule(class_name).category
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for ClassPolicy {
    fn default() -> Self {
        Self::builtin()
    }
}

pub(crate) fn normalize_class(class_name: &str) -> String {
    class_name.trim().to_lowercase()
}
