//! Per-gate event counter split by truth category.

use std::ops::AddAssign;

use nuana_core::truth::{BackgroundReaction, Pi0Content, TruthCategory, TruthLabel};
use nuana_core::Gate;
use serde::Serialize;

/// Percentage `100 * num / den`.
///
/// `None` when the denominator is zero or the value exceeds 100%, which can
/// only come from inconsistent bookkeeping upstream.
pub fn percentage(num: u64, den: u64) -> Option<f64> {
    if den == 0 {
        return None;
    }
    let pct = 100.0 * num as f64 / den as f64;
    if pct > 100.0 { None } else { Some(pct) }
}

/// Counts of events that survived one gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CutCounter {
    /// Gate counted.
    pub gate: Gate,
    /// Every event that survived the gate.
    pub total: u64,
    /// Signal events.
    pub signal: u64,
    /// Background events.
    pub background: u64,
    /// Real-data events.
    pub data: u64,
    /// Background by reaction, indexed by [`BackgroundReaction::index`].
    pub by_reaction: [u64; 7],
    /// Background by π⁰ content, indexed by [`Pi0Content::index`].
    pub by_pi0: [u64; 3],
    /// Events with the first study flag.
    pub study1: u64,
    /// Events with the second study flag.
    pub study2: u64,
    /// Events that reached the gate and failed it.
    pub rejected: u64,
}

impl CutCounter {
    /// Empty counter for `gate`.
    pub fn new(gate: Gate) -> Self {
        Self {
            gate,
            total: 0,
            signal: 0,
            background: 0,
            data: 0,
            by_reaction: [0; 7],
            by_pi0: [0; 3],
            study1: 0,
            study2: 0,
            rejected: 0,
        }
    }

    /// Count one surviving event.
    pub fn increment(&mut self, label: &TruthLabel) {
        self.total += 1;
        match label.category {
            TruthCategory::Signal => self.signal += 1,
            TruthCategory::Data => self.data += 1,
            TruthCategory::Background { reaction, pi0 } => {
                self.background += 1;
                self.by_reaction[reaction.index()] += 1;
                self.by_pi0[pi0.index()] += 1;
            }
        }
        if label.study1 {
            self.study1 += 1;
        }
        if label.study2 {
            self.study2 += 1;
        }
    }

    /// Count one event rejected by this gate.
    pub fn reject(&mut self) {
        self.rejected += 1;
    }

    /// Events that survived the gate.
    pub fn count(&self) -> u64 {
        self.total
    }

    /// Background events of one reaction type.
    pub fn reaction(&self, reaction: BackgroundReaction) -> u64 {
        self.by_reaction[reaction.index()]
    }

    /// Background events with the given π⁰ content.
    pub fn pi0(&self, content: Pi0Content) -> u64 {
        self.by_pi0[content.index()]
    }

    /// Signal efficiency relative to `baseline` (%).
    pub fn efficiency(&self, baseline: &CutCounter) -> Option<f64> {
        percentage(self.signal, baseline.signal)
    }

    /// Signal purity (%).
    pub fn purity(&self) -> Option<f64> {
        percentage(self.signal, self.total)
    }

    /// Sub-counts add up to the total.
    pub fn is_consistent(&self) -> bool {
        self.signal + self.background + self.data == self.total
            && self.by_reaction.iter().sum::<u64>() == self.background
            && self.by_pi0.iter().sum::<u64>() == self.background
    }
}

impl AddAssign<&CutCounter> for CutCounter {
    fn add_assign(&mut self, rhs: &CutCounter) {
        self.total += rhs.total;
        self.signal += rhs.signal;
        self.background += rhs.background;
        self.data += rhs.data;
        for (a, b) in self.by_reaction.iter_mut().zip(rhs.by_reaction) {
            *a += b;
        }
        for (a, b) in self.by_pi0.iter_mut().zip(rhs.by_pi0) {
            *a += b;
        }
        self.study1 += rhs.study1;
        self.study2 += rhs.study2;
        self.rejected += rhs.rejected;
    }
}
