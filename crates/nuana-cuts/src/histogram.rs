//! Distributions of cut variables, filled just before the matching gate.

use std::ops::AddAssign;

use nuana_core::truth::TruthLabel;
use nuana_core::{Error, Result};
use serde::Serialize;

use crate::ledger::Topology;

/// What a [`CutHistogram`] does with values outside its edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum OutOfRange {
    /// Only tally the weight in `below` or `above`.
    #[default]
    Tally,
    /// Tally it and also add the value to the first or last bin.
    Clamp,
}

/// Weighted distribution of one cut variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutHistogram {
    /// `<variable>_<topology>_<slice>`.
    pub name: String,
    /// Bin boundaries, one more than the number of bins.
    pub edges: Vec<f64>,
    /// Weight per bin.
    pub contents: Vec<f64>,
    /// Squared weight per bin.
    pub sum_w2: Vec<f64>,
    /// Weight of values below the first edge.
    pub below: f64,
    /// Weight of values at or above the last edge.
    pub above: f64,
    /// Fills that landed in a bin.
    pub entries: u64,
    /// Handling of values outside the edges.
    pub out_of_range: OutOfRange,
}

impl CutHistogram {
    /// Histogram over explicit edges, which must strictly increase.
    pub fn with_edges(name: impl Into<String>, edges: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if edges.len() < 2 || edges.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(Error::Validation(format!(
                "cut histogram {name}: {} edges do not form increasing bins",
                edges.len()
            )));
        }
        let n = edges.len() - 1;
        Ok(Self {
            name,
            edges,
            contents: vec![0.0; n],
            sum_w2: vec![0.0; n],
            below: 0.0,
            above: 0.0,
            entries: 0,
            out_of_range: OutOfRange::Tally,
        })
    }

    /// `n_bins` equal bins from `lo` to `hi`.
    pub fn uniform(name: impl Into<String>, n_bins: usize, lo: f64, hi: f64) -> Result<Self> {
        let width = (hi - lo) / n_bins as f64;
        let edges = (0..=n_bins).map(|i| lo + width * i as f64).collect();
        Self::with_edges(name, edges)
    }

    /// Choose what happens to values outside the edges.
    pub fn out_of_range(mut self, mode: OutOfRange) -> Self {
        self.out_of_range = mode;
        self
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.contents.len()
    }

    /// Weight inside the bins.
    pub fn integral(&self) -> f64 {
        self.contents.iter().sum()
    }

    /// Bin holding `value`. Each bin includes its lower edge only.
    fn bin_of(&self, value: f64) -> Option<usize> {
        let last = self.n_bins() - 1;
        let clamp = self.out_of_range == OutOfRange::Clamp;
        if value < self.edges[0] {
            clamp.then_some(0)
        } else if value >= self.edges[last + 1] {
            clamp.then_some(last)
        } else {
            Some(self.edges.partition_point(|&e| e <= value) - 1)
        }
    }

    /// Add `value` with `weight`. NaN is skipped.
    pub fn fill(&mut self, value: f64, weight: f64) {
        if value.is_nan() {
            return;
        }
        if value < self.edges[0] {
            self.below += weight;
        } else if value >= self.edges[self.n_bins()] {
            self.above += weight;
        }
        if let Some(bin) = self.bin_of(value) {
            self.contents[bin] += weight;
            self.sum_w2[bin] += weight * weight;
            self.entries += 1;
        }
    }
}

impl AddAssign<&CutHistogram> for CutHistogram {
    fn add_assign(&mut self, rhs: &CutHistogram) {
        debug_assert_eq!(self.edges, rhs.edges);
        for (a, b) in self.contents.iter_mut().zip(&rhs.contents) {
            *a += b;
        }
        for (a, b) in self.sum_w2.iter_mut().zip(&rhs.sum_w2) {
            *a += b;
        }
        self.below += rhs.below;
        self.above += rhs.above;
        self.entries += rhs.entries;
    }
}

/// Quantity histogrammed in front of a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CutVariable {
    /// Reconstructed vertices, before `Muon_None`.
    NVertices,
    /// Any Michel found (0/1), before `Vertex_Michel_Exist`.
    Michel,
    /// Tracks, after the Michel gates.
    NTracks,
    /// Leading photon conversion distance (mm).
    Gamma1ConvDist,
    /// Second photon conversion distance (mm).
    Gamma2ConvDist,
    /// Di-photon invariant mass (MeV).
    Pi0InvMass,
    /// Proton score minus pion score, low-KE protons.
    ProtonScoreDiff,
    /// Proton/pion LLR, high-KE protons.
    ProtonScoreLlr,
    /// Leading proton + π⁰ mass (MeV).
    DeltaInvMass,
    /// Calorimetric neutrino energy (GeV).
    NeutrinoE,
    /// Unused visible energy (MeV).
    UnusedE,
}

impl CutVariable {
    /// Every variable.
    pub const ALL: [CutVariable; 11] = [
        CutVariable::NVertices,
        CutVariable::Michel,
        CutVariable::NTracks,
        CutVariable::Gamma1ConvDist,
        CutVariable::Gamma2ConvDist,
        CutVariable::Pi0InvMass,
        CutVariable::ProtonScoreDiff,
        CutVariable::ProtonScoreLlr,
        CutVariable::DeltaInvMass,
        CutVariable::NeutrinoE,
        CutVariable::UnusedE,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Histogram base name.
    pub fn name(self) -> &'static str {
        match self {
            CutVariable::NVertices => "nVertices",
            CutVariable::Michel => "Michel",
            CutVariable::NTracks => "nTracks",
            CutVariable::Gamma1ConvDist => "gamma1_ConvDist",
            CutVariable::Gamma2ConvDist => "gamma2_ConvDist",
            CutVariable::Pi0InvMass => "pi0_invMass",
            CutVariable::ProtonScoreDiff => "pID_Diff",
            CutVariable::ProtonScoreLlr => "pID_LLR",
            CutVariable::DeltaInvMass => "deltaInvMass",
            CutVariable::NeutrinoE => "neutrinoE",
            CutVariable::UnusedE => "UnusedE",
        }
    }

    /// `(n_bins, lo, hi)`.
    pub fn binning(self) -> (usize, f64, f64) {
        match self {
            CutVariable::NVertices | CutVariable::NTracks => (15, 0.0, 15.0),
            CutVariable::Michel => (2, 0.0, 2.0),
            CutVariable::Gamma1ConvDist | CutVariable::Gamma2ConvDist => (50, 0.0, 1000.0),
            CutVariable::Pi0InvMass => (50, 0.0, 500.0),
            CutVariable::ProtonScoreDiff => (100, -1.0, 1.0),
            CutVariable::ProtonScoreLlr => (40, -100.0, 100.0),
            CutVariable::DeltaInvMass => (12, 1000.0, 1600.0),
            CutVariable::NeutrinoE => (40, 0.0, 20.0),
            CutVariable::UnusedE => (20, 0.0, 1000.0),
        }
    }
}

/// Truth slice of a histogram set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slice {
    /// Every event.
    All,
    /// Signal only.
    Signal,
    /// Background only.
    Background,
}

impl Slice {
    const ALL: [Slice; 3] = [Slice::All, Slice::Signal, Slice::Background];

    fn name(self) -> &'static str {
        match self {
            Slice::All => "all",
            Slice::Signal => "signal",
            Slice::Background => "background",
        }
    }
}

/// Every cut variable, per topology and truth slice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CutHistograms {
    hists: Vec<CutHistogram>,
}

impl CutHistograms {
    /// Empty set with the standard binnings.
    pub fn new() -> Self {
        let mut hists = Vec::with_capacity(CutVariable::ALL.len() * 9);
        for variable in CutVariable::ALL {
            let (n, lo, hi) = variable.binning();
            for topology in Topology::ALL {
                for slice in Slice::ALL {
                    let name = format!("{}_{}_{}", variable.name(), topology.name(), slice.name());
                    // Binnings are constants with lo < hi.
                    if let Ok(h) = CutHistogram::uniform(name, n, lo, hi) {
                        hists.push(h);
                    }
                }
            }
        }
        Self { hists }
    }

    fn slot(variable: CutVariable, topology: Topology, slice: Slice) -> usize {
        (variable.index() * Topology::ALL.len() + topology.index()) * Slice::ALL.len() + slice as usize
    }

    /// One histogram.
    pub fn get(&self, variable: CutVariable, topology: Topology, slice: Slice) -> &CutHistogram {
        &self.hists[Self::slot(variable, topology, slice)]
    }

    /// Fill `variable` in the `All` table and in `topology`, if any, for the
    /// `all` slice and the event's truth slice.
    pub fn fill(
        &mut self,
        variable: CutVariable,
        topology: Option<Topology>,
        label: &TruthLabel,
        value: f64,
        weight: f64,
    ) {
        let truth_slice = if label.category.is_signal() {
            Some(Slice::Signal)
        } else if label.category.is_background() {
            Some(Slice::Background)
        } else {
            None
        };
        for topo in std::iter::once(Topology::All).chain(topology) {
            for slice in std::iter::once(Slice::All).chain(truth_slice) {
                self.hists[Self::slot(variable, topo, slice)].fill(value, weight);
            }
        }
    }

    /// Every histogram.
    pub fn iter(&self) -> impl Iterator<Item = &CutHistogram> {
        self.hists.iter()
    }
}

impl Default for CutHistograms {
    fn default() -> Self {
        Self::new()
    }
}

impl AddAssign<&CutHistograms> for CutHistograms {
    fn add_assign(&mut self, rhs: &CutHistograms) {
        for (a, b) in self.hists.iter_mut().zip(&rhs.hists) {
            *a += b;
        }
    }
}
