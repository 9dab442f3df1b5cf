//! The decoder's score model: length distributions, region content scores,
//! branch scores, and the bad-score sentinel.
//!
//! All scores are log-space `f64` values; [`BAD_SCORE`] (negative infinity)
//! marks an impossible or uninitialised value. Any transition whose score
//! sum touches [`BAD_SCORE`] is abandoned silently — "no viable path" is
//! not an error.

use physalia_core::{PhysaliaError, Range, Result};

use crate::state::{StateKind, Strand};

/// The "bad/uninitialised" score sentinel.
pub const BAD_SCORE: f64 = f64::NEG_INFINITY;

/// Whether a score is the bad sentinel (or drifted into NaN).
pub fn is_bad_score(score: f64) -> bool {
    score == BAD_SCORE || score.is_nan()
}

// ---------------------------------------------------------------------------
// Length distributions
// ---------------------------------------------------------------------------

/// Log-score of a state span length.
///
/// `scores[k]` is the score for a span of length `k + 1`; lengths of zero or
/// beyond the table are [`BAD_SCORE`], which is what bounds the decoder's
/// backward scan.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LengthDistr {
    scores: Vec<f64>,
}

impl LengthDistr {
    /// Create a distribution from per-length scores (index 0 = length 1).
    ///
    /// # Errors
    ///
    /// Returns an error if `scores` is empty or contains NaN.
    pub fn new(scores: Vec<f64>) -> Result<Self> {
        if scores.is_empty() {
            return Err(PhysaliaError::InvalidInput(
                "length distribution must cover at least length 1".into(),
            ));
        }
        if scores.iter().any(|s| s.is_nan()) {
            return Err(PhysaliaError::InvalidInput(
                "length distribution contains NaN".into(),
            ));
        }
        Ok(Self { scores })
    }

    /// A flat distribution scoring 0 for every length up to `max_len`.
    pub fn uniform(max_len: usize) -> Self {
        Self {
            scores: vec![0.0; max_len.max(1)],
        }
    }

    /// Largest admissible length.
    pub fn max_len(&self) -> usize {
        self.scores.len()
    }

    /// Score of a span of `len` positions.
    pub fn score(&self, len: usize) -> f64 {
        if len == 0 || len > self.scores.len() {
            BAD_SCORE
        } else {
            self.scores[len - 1]
        }
    }
}

// ---------------------------------------------------------------------------
// Region content scores
// ---------------------------------------------------------------------------

/// Per-position content scores, held as cumulative sums so any span scores
/// in O(1).
///
/// Three tracks: coding and intron (each per strand) and a strandless
/// intergenic track.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionScores {
    seq_len: usize,
    coding: [Vec<f64>; 2],
    intron: [Vec<f64>; 2],
    intergenic: Vec<f64>,
}

impl RegionScores {
    /// Build cumulative tracks from per-position scores.
    ///
    /// # Errors
    ///
    /// Returns an error if the tracks disagree in length or contain
    /// non-finite values (a position must never be individually infinite —
    /// impossibility is expressed through length bounds and transitions).
    pub fn new(
        coding_fwd: Vec<f64>,
        coding_rev: Vec<f64>,
        intron_fwd: Vec<f64>,
        intron_rev: Vec<f64>,
        intergenic: Vec<f64>,
    ) -> Result<Self> {
        let seq_len = coding_fwd.len();
        for (name, track) in [
            ("coding_rev", &coding_rev),
            ("intron_fwd", &intron_fwd),
            ("intron_rev", &intron_rev),
            ("intergenic", &intergenic),
        ] {
            if track.len() != seq_len {
                return Err(PhysaliaError::InvalidInput(format!(
                    "track {name} has length {}, expected {seq_len}",
                    track.len()
                )));
            }
        }
        for track in [&coding_fwd, &coding_rev, &intron_fwd, &intron_rev, &intergenic] {
            if track.iter().any(|v| !v.is_finite()) {
                return Err(PhysaliaError::InvalidInput(
                    "region tracks must be finite per position".into(),
                ));
            }
        }
        Ok(Self {
            seq_len,
            coding: [cumulate(&coding_fwd), cumulate(&coding_rev)],
            intron: [cumulate(&intron_fwd), cumulate(&intron_rev)],
            intergenic: cumulate(&intergenic),
        })
    }

    /// All-zero tracks over `seq_len` positions.
    pub fn flat(seq_len: usize) -> Self {
        let zeros = vec![0.0; seq_len];
        Self {
            seq_len,
            coding: [cumulate(&zeros), cumulate(&zeros)],
            intron: [cumulate(&zeros), cumulate(&zeros)],
            intergenic: cumulate(&zeros),
        }
    }

    /// Sequence length the tracks cover.
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// Content score of `range` for a state of `kind` on `strand`.
    pub fn span_score(&self, kind: StateKind, strand: Strand, range: Range) -> f64 {
        debug_assert!(range.end <= self.seq_len, "span {range} beyond sequence");
        let s = strand_index(strand);
        let track = match kind {
            StateKind::Intron => &self.intron[s],
            StateKind::Intergenic => &self.intergenic,
            _ => &self.coding[s],
        };
        track[range.end] - track[range.start]
    }
}

fn cumulate(scores: &[f64]) -> Vec<f64> {
    let mut cum = Vec::with_capacity(scores.len() + 1);
    let mut acc = 0.0;
    cum.push(0.0);
    for &s in scores {
        acc += s;
        cum.push(acc);
    }
    cum
}

fn strand_index(strand: Strand) -> usize {
    match strand {
        Strand::Forward => 0,
        Strand::Reverse => 1,
    }
}

// ---------------------------------------------------------------------------
// Branch scores
// ---------------------------------------------------------------------------

/// Log-scores of the four transition kinds between state families.
///
/// On the forward strand branches read left-to-right, on the reverse strand
/// right-to-left; the table is symmetric in that respect because each entry
/// is keyed by the biological transition, not by sequence order.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BranchScores {
    pub exon_to_intron: f64,
    pub intron_to_exon: f64,
    pub intergenic_to_gene: f64,
    pub gene_to_intergenic: f64,
}

impl Default for BranchScores {
    fn default() -> Self {
        Self {
            exon_to_intron: 0.0,
            intron_to_exon: 0.0,
            intergenic_to_gene: 0.0,
            gene_to_intergenic: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// The model
// ---------------------------------------------------------------------------

/// The complete score model consumed by the decoder.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoreModel {
    regions: RegionScores,
    single_exon_len: LengthDistr,
    first_exon_len: LengthDistr,
    internal_exon_len: LengthDistr,
    last_exon_len: LengthDistr,
    intron_len: LengthDistr,
    intergenic_len: LengthDistr,
    branch: BranchScores,
    multi_protein_penalty: f64,
}

impl ScoreModel {
    /// Assemble a model.
    ///
    /// # Errors
    ///
    /// Returns an error if `multi_protein_penalty` is negative or NaN.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        regions: RegionScores,
        single_exon_len: LengthDistr,
        first_exon_len: LengthDistr,
        internal_exon_len: LengthDistr,
        last_exon_len: LengthDistr,
        intron_len: LengthDistr,
        intergenic_len: LengthDistr,
        branch: BranchScores,
        multi_protein_penalty: f64,
    ) -> Result<Self> {
        if !(multi_protein_penalty >= 0.0) {
            return Err(PhysaliaError::InvalidInput(format!(
                "multi-protein penalty {multi_protein_penalty} must be non-negative"
            )));
        }
        Ok(Self {
            regions,
            single_exon_len,
            first_exon_len,
            internal_exon_len,
            last_exon_len,
            intron_len,
            intergenic_len,
            branch,
            multi_protein_penalty,
        })
    }

    /// A flat model over `seq_len` positions with every span length up to
    /// `max_len` admitted at score 0.
    pub fn flat(seq_len: usize, max_len: usize) -> Self {
        Self {
            regions: RegionScores::flat(seq_len),
            single_exon_len: LengthDistr::uniform(max_len),
            first_exon_len: LengthDistr::uniform(max_len),
            internal_exon_len: LengthDistr::uniform(max_len),
            last_exon_len: LengthDistr::uniform(max_len),
            intron_len: LengthDistr::uniform(max_len),
            intergenic_len: LengthDistr::uniform(max_len),
            branch: BranchScores::default(),
            multi_protein_penalty: 0.0,
        }
    }

    /// Replace the region tracks.
    pub fn with_regions(mut self, regions: RegionScores) -> Self {
        self.regions = regions;
        self
    }

    /// Replace the multi-protein penalty.
    pub fn with_multi_protein_penalty(mut self, penalty: f64) -> Self {
        self.multi_protein_penalty = penalty;
        self
    }

    /// Sequence length covered by the region tracks.
    pub fn seq_len(&self) -> usize {
        self.regions.seq_len()
    }

    /// The region tracks.
    pub fn regions(&self) -> &RegionScores {
        &self.regions
    }

    /// The multi-protein penalty per extra qualifying block.
    pub fn multi_protein_penalty(&self) -> f64 {
        self.multi_protein_penalty
    }

    /// Length score for a span of `len` under a state of `kind`.
    pub fn length_score(&self, kind: StateKind, len: usize) -> f64 {
        self.length_distr(kind).score(len)
    }

    /// Longest admissible span for a state of `kind`.
    pub fn max_len(&self, kind: StateKind) -> usize {
        self.length_distr(kind).max_len()
    }

    /// Content score of `range` for a state of `kind` on `strand`.
    pub fn region_score(&self, kind: StateKind, strand: Strand, range: Range) -> f64 {
        self.regions.span_score(kind, strand, range)
    }

    /// Branch score of the transition `from` → `to` (in reading order).
    pub fn branch_score(&self, from: StateKind, to: StateKind) -> f64 {
        match (from.is_genic(), to.is_genic()) {
            (false, true) => self.branch.intergenic_to_gene,
            (true, false) => self.branch.gene_to_intergenic,
            (true, true) => {
                if to == StateKind::Intron {
                    self.branch.exon_to_intron
                } else {
                    self.branch.intron_to_exon
                }
            }
            (false, false) => 0.0,
        }
    }

    fn length_distr(&self, kind: StateKind) -> &LengthDistr {
        match kind {
            StateKind::SingleExon => &self.single_exon_len,
            StateKind::FirstExon => &self.first_exon_len,
            StateKind::InternalExon => &self.internal_exon_len,
            StateKind::LastExon => &self.last_exon_len,
            StateKind::Intron => &self.intron_len,
            StateKind::Intergenic => &self.intergenic_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_score_sentinel() {
        assert!(is_bad_score(BAD_SCORE));
        assert!(is_bad_score(f64::NAN));
        assert!(!is_bad_score(-1e300));
        assert!(!is_bad_score(0.0));
    }

    #[test]
    fn length_distr_bounds() {
        let d = LengthDistr::new(vec![-0.5, -1.0, -2.0]).unwrap();
        assert_eq!(d.max_len(), 3);
        assert!(is_bad_score(d.score(0)));
        assert_eq!(d.score(1), -0.5);
        assert_eq!(d.score(3), -2.0);
        assert!(is_bad_score(d.score(4)));
    }

    #[test]
    fn length_distr_rejects_empty_and_nan() {
        assert!(LengthDistr::new(vec![]).is_err());
        assert!(LengthDistr::new(vec![0.0, f64::NAN]).is_err());
    }

    #[test]
    fn region_spans_are_prefix_sums() {
        let regions = RegionScores::new(
            vec![1.0, 2.0, 3.0, 4.0],
            vec![0.5; 4],
            vec![0.0; 4],
            vec![0.0; 4],
            vec![-1.0; 4],
        )
        .unwrap();
        let r = Range::new(1, 3);
        assert_eq!(
            regions.span_score(StateKind::InternalExon, Strand::Forward, r),
            5.0
        );
        assert_eq!(
            regions.span_score(StateKind::FirstExon, Strand::Reverse, r),
            1.0
        );
        assert_eq!(
            regions.span_score(StateKind::Intron, Strand::Forward, r),
            0.0
        );
        assert_eq!(
            regions.span_score(StateKind::Intergenic, Strand::Forward, r),
            -2.0
        );
    }

    #[test]
    fn region_tracks_must_agree_in_length() {
        let err = RegionScores::new(vec![0.0; 4], vec![0.0; 3], vec![0.0; 4], vec![0.0; 4], vec![0.0; 4]);
        assert!(err.is_err());
    }

    #[test]
    fn region_tracks_must_be_finite() {
        let err = RegionScores::new(
            vec![0.0, f64::NEG_INFINITY],
            vec![0.0; 2],
            vec![0.0; 2],
            vec![0.0; 2],
            vec![0.0; 2],
        );
        assert!(err.is_err());
    }

    #[test]
    fn branch_scores_by_transition_kind() {
        let mut model = ScoreModel::flat(10, 10);
        model.branch = BranchScores {
            exon_to_intron: -1.0,
            intron_to_exon: -2.0,
            intergenic_to_gene: -3.0,
            gene_to_intergenic: -4.0,
        };
        assert_eq!(
            model.branch_score(StateKind::FirstExon, StateKind::Intron),
            -1.0
        );
        assert_eq!(
            model.branch_score(StateKind::Intron, StateKind::LastExon),
            -2.0
        );
        assert_eq!(
            model.branch_score(StateKind::Intergenic, StateKind::SingleExon),
            -3.0
        );
        assert_eq!(
            model.branch_score(StateKind::LastExon, StateKind::Intergenic),
            -4.0
        );
    }

    #[test]
    fn negative_protein_penalty_rejected() {
        let err = ScoreModel::new(
            RegionScores::flat(4),
            LengthDistr::uniform(4),
            LengthDistr::uniform(4),
            LengthDistr::uniform(4),
            LengthDistr::uniform(4),
            LengthDistr::uniform(4),
            LengthDistr::uniform(4),
            BranchScores::default(),
            -1.0,
        );
        assert!(err.is_err());
    }
}
