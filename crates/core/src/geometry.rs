//! Electrode survey geometry and source/receiver resolution.
//!
//! A survey is described by its electrodes (id plus coordinates, `z` positive
//! up) and by the ids allowed to act as current or potential electrodes. The
//! resolver turns that description into the tables the forward operator is
//! assembled from:
//!
//! - `srcloc`: unique current-electrode pairs `[xA, zA, xB, zB]`
//! - `recloc`: one potential-electrode pair `[xM, zM, xN, zN]` per measurement
//! - `srcnum`: for every measurement, the row of `srcloc` it is driven by
//!
//! Internally `z` is positive down, and horizontal coordinates are shifted so
//! the electrode line is centred on `x = 0`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Four-column coordinate row: `[x1, z1, x2, z2]`.
pub type PairLocation = [f64; 4];

// ============================================================================
// Array Policy
// ============================================================================

/// Which electrode arrangements are kept as measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrayType {
    /// Every disjoint (current pair, potential pair) combination.
    #[serde(rename = "all_combination", alias = "all-combination")]
    AllCombination,
    /// AM = MN = NB on surface electrodes.
    #[serde(rename = "Wenner", alias = "wenner")]
    Wenner,
    /// AM = NB with AM an exact integer multiple of MN.
    #[serde(rename = "Wenner_Schlumberger", alias = "wenner_schlumberger")]
    WennerSchlumberger,
    /// AM = NB with AM >= MN.
    #[serde(rename = "Wenner_Schlumberger_NonInt", alias = "wenner_schlumberger_nonint")]
    WennerSchlumbergerNonInt,
}

impl fmt::Display for ArrayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayType::AllCombination => write!(f, "all_combination"),
            ArrayType::Wenner => write!(f, "Wenner"),
            ArrayType::WennerSchlumberger => write!(f, "Wenner_Schlumberger"),
            ArrayType::WennerSchlumbergerNonInt => write!(f, "Wenner_Schlumberger_NonInt"),
        }
    }
}

impl ArrayType {
    /// Decide whether a surface quadruple with the given (positive) spacings
    /// is kept.
    fn accepts(self, am: f64, mn: f64, nb: f64) -> bool {
        match self {
            ArrayType::AllCombination => true,
            ArrayType::Wenner => am == mn && mn == nb,
            ArrayType::WennerSchlumberger => am == nb && am % mn == 0.0,
            ArrayType::WennerSchlumbergerNonInt => am == nb && am >= mn,
        }
    }
}

// ============================================================================
// Raw Geometry
// ============================================================================

/// One electrode of the coordinate table. `z` is positive up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Electrode {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Current pair (C1, C2) and potential pair (P1, P2) of one measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElectrodeQuadruple {
    pub c1: u32,
    pub c2: u32,
    pub p1: u32,
    pub p2: u32,
}

impl ElectrodeQuadruple {
    pub fn new(c1: u32, c2: u32, p1: u32, p2: u32) -> Self {
        Self { c1, c2, p1, p2 }
    }

    pub fn ids(&self) -> [u32; 4] {
        [self.c1, self.c2, self.p1, self.p2]
    }
}

/// Survey geometry as read from a geometry description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGeometry {
    /// Electrodes allowed to inject current.
    pub current: Vec<u32>,
    /// Electrodes allowed to measure potential.
    pub potential: Vec<u32>,
    /// Auxiliary potential electrodes (carried through, unused by resolution).
    pub aux_potential: Vec<u32>,
    /// Coordinate table.
    pub electrodes: Vec<Electrode>,
    /// Explicit measurement list; when present it replaces enumeration.
    pub pairs: Option<Vec<ElectrodeQuadruple>>,
}

impl RawGeometry {
    /// `max(x) - min(x)` over the whole coordinate table (0 when empty).
    pub fn horizontal_extent(&self) -> f64 {
        let mut xs = self.electrodes.iter().map(|e| e.x);
        match xs.next() {
            Some(first) => {
                let (lo, hi) = xs.fold((first, first), |(lo, hi), x| (lo.min(x), hi.max(x)));
                hi - lo
            }
            None => 0.0,
        }
    }
}

// ============================================================================
// Source / Receiver Set
// ============================================================================

/// Deduplicated source table, receiver table and receiver → source mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceReceiverSet {
    pub srcloc: Vec<PairLocation>,
    pub recloc: Vec<PairLocation>,
    pub srcnum: Vec<usize>,
}

impl SourceReceiverSet {
    pub fn is_empty(&self) -> bool {
        self.recloc.is_empty()
    }

    pub fn receiver_count(&self) -> usize {
        self.recloc.len()
    }

    pub fn source_count(&self) -> usize {
        self.srcloc.len()
    }

    /// Source location driving receiver row `i`.
    pub fn source_of(&self, i: usize) -> Option<&PairLocation> {
        self.srcnum.get(i).and_then(|&s| self.srcloc.get(s))
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Counts collected while resolving, for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub quadruples: usize,
    pub at_surface: usize,
    pub accepted: usize,
    pub unique_sources: usize,
}

/// All disjoint (current pair, potential pair) combinations.
///
/// Pairs are 2-combinations of the id lists in input order, each normalised
/// to ascending ids. The current pair is the outer loop.
pub fn enumerate_quadruples(current: &[u32], potential: &[u32]) -> Vec<ElectrodeQuadruple> {
    let c_pairs = sorted_pairs(current);
    let p_pairs = sorted_pairs(potential);
    let mut out = Vec::new();
    for &(c1, c2) in &c_pairs {
        for &(p1, p2) in &p_pairs {
            let disjoint = c1 != p1 && c1 != p2 && c2 != p1 && c2 != p2;
            if disjoint {
                out.push(ElectrodeQuadruple::new(c1, c2, p1, p2));
            }
        }
    }
    out
}

fn sorted_pairs(ids: &[u32]) -> Vec<(u32, u32)> {
    let mut pairs = Vec::with_capacity(ids.len() * ids.len().saturating_sub(1) / 2);
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            pairs.push((a.min(b), a.max(b)));
        }
    }
    pairs
}

/// Resolve a survey into its source/receiver tables.
///
/// An empty survey, or one where no quadruple survives the array policy,
/// yields an empty set rather than an error.
pub fn resolve(
    geometry: &RawGeometry,
    array_type: ArrayType,
) -> Result<(SourceReceiverSet, ResolveReport), GeometryError> {
    let lookup: BTreeMap<u32, (f64, f64)> = geometry
        .electrodes
        .iter()
        .map(|e| (e.id, (e.x, flip_depth(e.z))))
        .collect();

    let quadruples = match &geometry.pairs {
        Some(pairs) => pairs.clone(),
        None => enumerate_quadruples(&geometry.current, &geometry.potential),
    };

    let mut report = ResolveReport {
        quadruples: quadruples.len(),
        ..ResolveReport::default()
    };

    let mut sources = Vec::with_capacity(quadruples.len());
    let mut receivers = Vec::with_capacity(quadruples.len());
    for quad in &quadruples {
        let [a, b, m, n] = quad.ids().map(|id| {
            lookup
                .get(&id)
                .copied()
                .ok_or(GeometryError::UnknownElectrode { id })
        });
        let (a, b, m, n) = (a?, b?, m?, n?);
        sources.push([a.0, a.1, b.0, b.1]);
        receivers.push([m.0, m.1, n.0, n.1]);
    }

    if array_type == ArrayType::AllCombination {
        report.at_surface = sources.len();
        report.accepted = sources.len();
    } else {
        let mut kept_src = Vec::new();
        let mut kept_rec = Vec::new();
        for (src, rec) in sources.into_iter().zip(receivers) {
            let at_surface = src[1] == 0.0 && src[3] == 0.0 && rec[1] == 0.0 && rec[3] == 0.0;
            if !at_surface {
                continue;
            }
            report.at_surface += 1;

            let am = rec[0] - src[0];
            let mn = rec[2] - rec[0];
            let nb = src[2] - rec[2];
            if am > 0.0 && mn > 0.0 && nb > 0.0 && array_type.accepts(am, mn, nb) {
                kept_src.push(src);
                kept_rec.push(rec);
            }
        }
        report.accepted = kept_src.len();
        sources = kept_src;
        receivers = kept_rec;
    }

    let (mut srcloc, srcnum) = unique_rows_with_inverse(&sources);
    report.unique_sources = srcloc.len();

    let shift = 0.5 * geometry.horizontal_extent();
    for row in srcloc.iter_mut().chain(receivers.iter_mut()) {
        row[0] -= shift;
        row[2] -= shift;
    }

    log::debug!(
        "resolved {} quadruples → {} at surface → {} accepted ({}) → {} unique sources",
        report.quadruples,
        report.at_surface,
        report.accepted,
        array_type,
        report.unique_sources
    );

    Ok((
        SourceReceiverSet {
            srcloc,
            recloc: receivers,
            srcnum,
        },
        report,
    ))
}

/// Convert "z up" to "z down". Written as a subtraction from zero so surface
/// electrodes end up at `+0.0`, never `-0.0`.
#[inline]
fn flip_depth(z: f64) -> f64 {
    0.0 - z
}

/// Lexicographically sorted distinct rows plus, for every input row, the
/// index of its distinct row.
///
/// `-0.0` and `+0.0` count as the same coordinate and come out as `+0.0`.
pub fn unique_rows_with_inverse(rows: &[PairLocation]) -> (Vec<PairLocation>, Vec<usize>) {
    let rows: Vec<PairLocation> = rows.iter().map(|row| row.map(|v| v + 0.0)).collect();
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&i, &j| compare_rows(&rows[i], &rows[j]));

    let mut unique: Vec<PairLocation> = Vec::new();
    let mut inverse = vec![0; rows.len()];
    for i in order {
        let is_new = unique
            .last()
            .map_or(true, |last| compare_rows(last, &rows[i]) != Ordering::Equal);
        if is_new {
            unique.push(rows[i]);
        }
        inverse[i] = unique.len() - 1;
    }
    (unique, inverse)
}

fn compare_rows(a: &PairLocation, b: &PairLocation) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("electrode {id} is referenced by a measurement but missing from the coordinate table")]
    UnknownElectrode { id: u32 },

    #[error("invalid coordinate row {row}: {reason}")]
    InvalidCoordinate { row: usize, reason: String },
}
