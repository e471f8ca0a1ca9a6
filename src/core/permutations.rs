//! Superfecta Line Enumeration
//!
//! Ranks every ordered 4-subset of the strongest `top_n` competitors under the
//! Plackett–Luce (sequential weighted draw without replacement) model:
//!
//! ```text
//!     P(a,b,c,d) = s(a)/S * s(b)/(S-s(a)) * s(c)/(S-s(a)-s(b)) * s(d)/(S-s(a)-s(b)-s(c))
//! ```
//!
//! Where:
//!     s(x) = strength of competitor x
//!     S    = sum of candidate strengths
//!
//! Each denominator is accumulated from the strengths still undrawn rather
//! than subtracted from S, so lopsided fields keep their precision.
//! Candidate count is capped so the O(top_n^4) enumeration stays bounded.

use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, warn};

use super::strength::{strength_order, StrengthMap};
use crate::error::{validate_top_n, EngineError, Result};
use crate::models::{permutation_count, Competitor, CompetitorId, RankedLine, LINE_DEPTH};

/// Hard cap on candidates: 12 * 11 * 10 * 9 = 11,880 lines
pub const MAX_TOP_N: usize = 12;
/// Default truncation
pub const DEFAULT_TOP_N: usize = 10;

type LineIndex = [usize; LINE_DEPTH];

/// Sequential-choice probability of one ordered 4-tuple
///
/// `others` is the combined strength of the candidates outside the line.
/// A non-positive or non-finite strength, or an invalid `others`, yields 0.
///
/// # Examples
/// ```
/// use superfecta::core::permutations::plackett_luce_probability;
/// // field 5, 4, 3, 2 plus two competitors of strength 1
/// let p = plackett_luce_probability([5.0, 4.0, 3.0, 2.0], 2.0);
/// assert!((p - 120.0 / 4928.0).abs() < 1e-12);
/// ```
pub fn plackett_luce_probability(line: [f64; LINE_DEPTH], others: f64) -> f64 {
    if !others.is_finite() || others < 0.0 || line.iter().any(|s| !s.is_finite() || *s <= 0.0) {
        return 0.0;
    }

    // last draw first: every denominator is a sum of undrawn strengths
    let mut remaining = others;
    let mut probability = 1.0;
    for s in line.iter().rev() {
        remaining += s;
        probability *= s / remaining;
    }

    if probability.is_finite() && probability > 0.0 {
        probability
    } else {
        0.0
    }
}

/// Probability of the line `line` (indices into `strengths`) over the whole of `strengths`
pub fn line_probability(strengths: &[f64], line: [usize; LINE_DEPTH]) -> f64 {
    let others: f64 = strengths
        .iter()
        .enumerate()
        .filter(|(i, _)| !line.contains(i))
        .map(|(_, s)| *s)
        .sum();
    plackett_luce_probability(line.map(|i| strengths[i]), others)
}

/// One point on the coverage curve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoveragePoint {
    pub lines: usize,
    pub lines_fraction: f64,
    pub cumulative_probability: f64,
    /// Cumulative probability relative to picking the same number of lines at random
    pub efficiency: f64,
}

/// Probability-ranked lines for one market
#[derive(Debug, Clone, Serialize)]
pub struct RankedLines {
    pub market_id: String,
    /// Candidate set, strongest first
    pub candidates: Vec<Competitor>,
    pub lines: Vec<RankedLine>,
    #[serde(skip)]
    indices: Vec<LineIndex>,
}

impl RankedLines {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn top(&self) -> Option<&RankedLine> {
        self.lines.first()
    }

    /// Probability mass retained by the truncated candidate set
    pub fn total_probability(&self) -> f64 {
        self.lines
            .last()
            .map(|l| l.cumulative_probability)
            .unwrap_or(0.0)
    }

    /// Number of top-ranked lines bought at coverage fraction `alpha`
    pub fn lines_for_coverage(&self, alpha: f64) -> usize {
        lines_for_coverage(self.len(), alpha)
    }

    /// The `m` most probable lines
    pub fn covered(&self, m: usize) -> &[RankedLine] {
        &self.lines[..m.min(self.len())]
    }

    /// Cumulative probability of the `m` most probable lines
    pub fn cumulative_at(&self, m: usize) -> f64 {
        match m.min(self.len()) {
            0 => 0.0,
            k => self.lines[k - 1].cumulative_probability,
        }
    }

    /// Whether every competitor of `finish` survived truncation
    pub fn contains_all(&self, finish: &[CompetitorId; LINE_DEPTH]) -> bool {
        finish
            .iter()
            .all(|id| self.candidates.iter().any(|c| &c.id == id))
    }

    /// Locate an exact finishing order
    pub fn find(&self, finish: &[CompetitorId; LINE_DEPTH]) -> Option<&RankedLine> {
        if !self.contains_all(finish) {
            return None;
        }
        self.lines.iter().find(|line| line.matches(finish))
    }

    /// Candidates making up the line at `position` (0-based)
    pub fn line_candidates(&self, position: usize) -> Option<[&Competitor; LINE_DEPTH]> {
        let idx = self.indices.get(position)?;
        Some(idx.map(|i| &self.candidates[i]))
    }

    /// Market-implied win probability of a candidate
    ///
    /// 1/odds when odds are known, strength share of the candidate set otherwise.
    pub fn implied_probability(&self, candidate: &Competitor) -> f64 {
        match candidate.decimal_odds {
            Some(odds) if odds > 1.0 => 1.0 / odds,
            _ => {
                let total: f64 = self.candidates.iter().map(|c| c.strength).sum();
                if total > 0.0 {
                    candidate.strength / total
                } else {
                    0.0
                }
            }
        }
    }

    pub fn coverage_curve(&self) -> Vec<CoveragePoint> {
        let total = self.len() as f64;
        self.lines
            .iter()
            .map(|line| {
                let lines_fraction = line.rank as f64 / total;
                CoveragePoint {
                    lines: line.rank,
                    lines_fraction,
                    cumulative_probability: line.cumulative_probability,
                    efficiency: line.cumulative_probability / lines_fraction,
                }
            })
            .collect()
    }
}

/// round(alpha * total) clamped to [0, total]
pub fn lines_for_coverage(total: usize, alpha: f64) -> usize {
    if !alpha.is_finite() || alpha <= 0.0 {
        return 0;
    }
    let m = (alpha.min(1.0) * total as f64).round() as usize;
    m.min(total)
}

/// Plackett–Luce line enumerator over a truncated candidate set
#[derive(Debug, Clone)]
pub struct PermutationEnumerator {
    top_n: usize,
}

impl PermutationEnumerator {
    /// Rejects `top_n < 4`; clamps values above [`MAX_TOP_N`]
    pub fn new(top_n: usize) -> Result<Self> {
        validate_top_n(top_n)?;
        let top_n = if top_n > MAX_TOP_N {
            warn!(
                requested = top_n,
                clamped = MAX_TOP_N,
                "top_n above enumeration cap, clamping"
            );
            MAX_TOP_N
        } else {
            top_n
        };
        Ok(Self { top_n })
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Maximum number of lines this enumerator can produce
    pub fn max_lines(&self) -> usize {
        permutation_count(self.top_n)
    }

    /// Enumerate and rank all lines for one market
    pub fn enumerate(&self, strengths: &StrengthMap) -> Result<RankedLines> {
        if strengths.len() < LINE_DEPTH {
            return Err(EngineError::InsufficientData {
                market_id: strengths.market_id.clone(),
                resolved: strengths.len(),
            });
        }

        let mut candidates = strengths.competitors.clone();
        candidates.sort_by(strength_order);
        candidates.truncate(self.top_n);

        let s: Vec<f64> = candidates.iter().map(|c| c.strength).collect();
        let n = candidates.len();

        let mut raw: Vec<(LineIndex, f64)> = (0..n)
            .into_par_iter()
            .flat_map_iter(|a| {
                let mut out = Vec::with_capacity(permutation_count(n) / n);
                for b in 0..n {
                    if b == a {
                        continue;
                    }
                    for c in 0..n {
                        if c == a || c == b {
                            continue;
                        }
                        for d in 0..n {
                            if d == a || d == b || d == c {
                                continue;
                            }
                            let idx = [a, b, c, d];
                            out.push((idx, line_probability(&s, idx)));
                        }
                    }
                }
                out
            })
            .collect();

        raw.sort_by(|x, y| {
            y.1.partial_cmp(&x.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| x.0.cmp(&y.0))
        });

        let mut cumulative = 0.0;
        let mut lines = Vec::with_capacity(raw.len());
        let mut indices = Vec::with_capacity(raw.len());
        for (i, (idx, probability)) in raw.into_iter().enumerate() {
            cumulative = (cumulative + probability).min(1.0);
            lines.push(RankedLine {
                rank: i + 1,
                competitors: idx.map(|k| candidates[k].id.clone()),
                probability,
                cumulative_probability: cumulative,
            });
            indices.push(idx);
        }

        debug!(
            market_id = %strengths.market_id,
            candidates = n,
            lines = lines.len(),
            retained_mass = cumulative,
            "enumerated superfecta lines"
        );

        Ok(RankedLines {
            market_id: strengths.market_id.clone(),
            candidates,
            lines,
            indices,
        })
    }
}

impl Default for PermutationEnumerator {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
        }
    }
}
