//! Persisted per-event gate flags (`Cut_<Name>` → 0/1).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::gate::Gate;

/// Flag values as written to the event record.
///
/// A flag is written once, when its gate is evaluated: `1` means the event
/// failed the gate, `0` that it passed. An absent flag means the gate was
/// never reached. Any other stored value is rejected when flags are read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, i32>", into = "BTreeMap<String, i32>")]
pub struct Flags(BTreeMap<String, i32>);

impl TryFrom<BTreeMap<String, i32>> for Flags {
    type Error = Error;

    fn try_from(raw: BTreeMap<String, i32>) -> Result<Self> {
        if let Some((name, v)) = raw.iter().find(|&(_, &v)| v != 0 && v != 1) {
            return Err(Error::Validation(format!("flag {name} has value {v}, expected 0 or 1")));
        }
        Ok(Self(raw))
    }
}

impl From<Flags> for BTreeMap<String, i32> {
    fn from(flags: Flags) -> Self {
        flags.0
    }
}

impl Flags {
    /// Empty flag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of `gate`. [`Gate::All`] carries no flag and is ignored.
    pub fn set(&mut self, gate: Gate, failed: bool) {
        if let Some(name) = gate.flag_name() {
            self.0.insert(name, i32::from(failed));
        }
    }

    /// `Some(true)` if the gate failed, `Some(false)` if it passed, `None` if unset.
    pub fn get(&self, gate: Gate) -> Option<bool> {
        let name = gate.flag_name()?;
        self.0
            .get(&name)
            .or_else(|| gate.legacy_flag_name().and_then(|legacy| self.0.get(legacy)))
            .map(|&v| v == 1)
    }

    /// Whether the gate was evaluated.
    pub fn is_set(&self, gate: Gate) -> bool {
        self.get(gate).is_some()
    }

    /// Gates with a flag, in pipeline order.
    pub fn evaluated(&self) -> Vec<Gate> {
        Gate::SEQUENCE.iter().copied().filter(|&g| self.is_set(g)).collect()
    }

    /// First gate (in pipeline order) whose flag is 1.
    pub fn first_failure(&self) -> Option<Gate> {
        Gate::SEQUENCE.iter().copied().find(|&g| self.get(g) == Some(true))
    }

    /// Raw value of a flag by name.
    pub fn raw(&self, name: &str) -> Option<i32> {
        self.0.get(name).copied()
    }

    /// Number of flags written.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// No flag written yet.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
