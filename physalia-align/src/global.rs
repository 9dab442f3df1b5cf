//! Global alignment with affine gap costs, configurable edge-gap handling,
//! and off-diagonal banding.
//!
//! Uses the three-matrix dynamic programming formulation (Gotoh, 1982):
//!
//! - **M** — best score ending in a match/replace column
//! - **I** — best score ending in a gap in seq1 (consuming seq2)
//! - **D** — best score ending in a gap in seq2 (consuming seq1)
//!
//! Gap costs are positive magnitudes subtracted from the score: a run of
//! length `L` costs `open + L * extend`. Edge rows/columns carry their own
//! `start_*`/`end_*` costs, and each of the four sequence ends can be
//! declared free (no charge), which emulates semi-global alignment inside a
//! globally-structured matrix — the transcript still covers both sequences
//! end to end.
//!
//! # Determinism
//!
//! Ties are broken by a fixed order that is part of the public contract:
//! among equal cell scores the traceback prefers **Match over Insert over
//! Delete**, and an equal-score gap run closes (re-opens from M) rather
//! than extends. Matrix fill is strictly row-major, so identical inputs
//! always produce identical transcripts.

use physalia_core::{PhysaliaError, Result};

use crate::scoring::{ScoringMatrix, SeqSource};
use crate::transcript::{Transcript, TranscriptOp};

const NEG_INF: i32 = i32::MIN / 2;

/// Threshold below which a cell is considered unreachable.
const BAD_CELL: i32 = NEG_INF / 2;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// An off-main-diagonal band restriction.
///
/// Cell `(i, j)` is feasible when `|(j - i) - offset| <= width`, with `i`
/// indexing seq1 and `j` indexing seq2. Memory and time drop to
/// `O(len1 * width)`.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Band {
    /// Diagonal offset `j - i` of the band centre.
    pub offset: i64,
    /// Maximum distance from the centre diagonal.
    pub width: usize,
}

/// Configuration for [`global_align`].
///
/// All gap costs are positive magnitudes (subtracted); validation rejects
/// negative values. Defaults: open 5, extend 1, edge costs equal to the
/// interior costs, every end charged, no band.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlobalAlignParams {
    /// Interior gap opening cost.
    pub gap_open: i32,
    /// Interior gap extension cost (per gap column).
    pub gap_extend: i32,
    /// Opening cost for leading-edge gaps.
    pub start_gap_open: i32,
    /// Extension cost for leading-edge gaps.
    pub start_gap_extend: i32,
    /// Opening cost for trailing-edge gaps.
    pub end_gap_open: i32,
    /// Extension cost for trailing-edge gaps.
    pub end_gap_extend: i32,
    /// Leading gap in seq1 (before its first position) is free.
    pub free_left_seq1: bool,
    /// Trailing gap in seq1 (after its last position) is free.
    pub free_right_seq1: bool,
    /// Leading gap in seq2 is free.
    pub free_left_seq2: bool,
    /// Trailing gap in seq2 is free.
    pub free_right_seq2: bool,
    /// Optional band restriction.
    pub band: Option<Band>,
}

impl Default for GlobalAlignParams {
    fn default() -> Self {
        Self::uniform(5, 1)
    }
}

impl GlobalAlignParams {
    /// Parameters with the same `open`/`extend` cost at every position and
    /// every end charged.
    pub fn uniform(open: i32, extend: i32) -> Self {
        Self {
            gap_open: open,
            gap_extend: extend,
            start_gap_open: open,
            start_gap_extend: extend,
            end_gap_open: open,
            end_gap_extend: extend,
            free_left_seq1: false,
            free_right_seq1: false,
            free_left_seq2: false,
            free_right_seq2: false,
            band: None,
        }
    }

    /// Set the four end-space-free flags.
    pub fn with_free_ends(
        mut self,
        left_seq1: bool,
        right_seq1: bool,
        left_seq2: bool,
        right_seq2: bool,
    ) -> Self {
        self.free_left_seq1 = left_seq1;
        self.free_right_seq1 = right_seq1;
        self.free_left_seq2 = left_seq2;
        self.free_right_seq2 = right_seq2;
        self
    }

    /// Restrict the fill to a diagonal band.
    pub fn with_band(mut self, band: Band) -> Self {
        self.band = Some(band);
        self
    }

    fn validate(&self) -> Result<()> {
        let costs = [
            self.gap_open,
            self.gap_extend,
            self.start_gap_open,
            self.start_gap_extend,
            self.end_gap_open,
            self.end_gap_extend,
        ];
        if costs.iter().any(|&c| c < 0) {
            return Err(PhysaliaError::InvalidInput(
                "gap costs are positive magnitudes; negative values are not allowed".into(),
            ));
        }
        Ok(())
    }
}

/// The result of a global alignment: the optimal score and its transcript.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlobalAlignment {
    pub score: i32,
    pub transcript: Transcript,
}

impl physalia_core::Scored for GlobalAlignment {
    fn score(&self) -> f64 {
        self.score as f64
    }
}

// ---------------------------------------------------------------------------
// Band geometry
// ---------------------------------------------------------------------------

/// Per-row feasible column windows, shared by the three score lanes.
///
/// With no band every row spans all columns; with a band the storage is one
/// window of at most `2 * width + 1` cells per row.
struct BandGeom {
    rows: usize,
    row_lo: Vec<usize>,
    row_hi: Vec<usize>,
    row_start: Vec<usize>,
    total: usize,
}

impl BandGeom {
    fn new(len1: usize, len2: usize, band: Option<&Band>) -> Result<Self> {
        let rows = len1 + 1;
        let cols = len2 + 1;
        let mut row_lo = Vec::with_capacity(rows);
        let mut row_hi = Vec::with_capacity(rows);
        let mut row_start = Vec::with_capacity(rows);
        let mut total = 0usize;

        for i in 0..rows {
            let (lo, hi) = match band {
                None => (0usize, cols),
                Some(b) => {
                    let centre = i as i64 + b.offset;
                    let lo = (centre - b.width as i64).max(0).min(cols as i64) as usize;
                    let hi = (centre + b.width as i64 + 1).max(0).min(cols as i64) as usize;
                    if hi <= lo {
                        (lo.min(cols), lo.min(cols))
                    } else {
                        (lo, hi)
                    }
                }
            };
            row_start.push(total);
            total += hi - lo;
            row_lo.push(lo);
            row_hi.push(hi);
        }

        let geom = Self {
            rows,
            row_lo,
            row_hi,
            row_start,
            total,
        };
        if !geom.feasible(0, 0) {
            return Err(PhysaliaError::InvalidInput(
                "band excludes the matrix origin".into(),
            ));
        }
        if !geom.feasible(len1, len2) {
            return Err(PhysaliaError::InvalidInput(
                "band excludes the terminal cell".into(),
            ));
        }
        Ok(geom)
    }

    fn feasible(&self, i: usize, j: usize) -> bool {
        i < self.rows && j >= self.row_lo[i] && j < self.row_hi[i]
    }

    fn idx(&self, i: usize, j: usize) -> Option<usize> {
        if self.feasible(i, j) {
            Some(self.row_start[i] + (j - self.row_lo[i]))
        } else {
            None
        }
    }
}

struct Lanes {
    m: Vec<i32>,
    i: Vec<i32>,
    d: Vec<i32>,
}

impl Lanes {
    fn new(total: usize) -> Self {
        Self {
            m: vec![NEG_INF; total],
            i: vec![NEG_INF; total],
            d: vec![NEG_INF; total],
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Lane {
    M,
    I,
    D,
}

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// Compute the optimal global alignment of `seq1` (literal or profile)
/// against `seq2` under `params`.
///
/// Zero-length operands are legal and produce pure-gap transcripts. The
/// returned transcript covers both sequences end to end; callers detecting
/// a degenerate gap bracket (leading insert run paired with a trailing
/// delete run, or the reverse) are expected to discard or reprocess the
/// result themselves.
///
/// # Errors
///
/// Returns [`PhysaliaError::InvalidInput`] for negative gap costs, or for a
/// band that excludes the matrix origin or terminal cell or admits no
/// finite path.
pub fn global_align(
    seq1: &SeqSource<'_>,
    seq2: &[u8],
    matrix: &ScoringMatrix,
    params: &GlobalAlignParams,
) -> Result<GlobalAlignment> {
    params.validate()?;

    let m = seq1.len();
    let n = seq2.len();

    if m == 0 && n == 0 {
        return Ok(GlobalAlignment {
            score: 0,
            transcript: Transcript::new(),
        });
    }

    let geom = BandGeom::new(m, n, params.band.as_ref())?;
    let mut lanes = Lanes::new(geom.total);

    // Insert runs move along a row: leading at i == 0, trailing at i == len1.
    let ins_costs = |i: usize| -> (i32, i32) {
        if i == 0 && (params.free_left_seq1 || (m == 0 && params.free_right_seq1)) {
            (0, 0)
        } else if i == 0 {
            (params.start_gap_open, params.start_gap_extend)
        } else if i == m && params.free_right_seq1 {
            (0, 0)
        } else if i == m {
            (params.end_gap_open, params.end_gap_extend)
        } else {
            (params.gap_open, params.gap_extend)
        }
    };
    // Delete runs move along a column: leading at j == 0, trailing at j == len2.
    let del_costs = |j: usize| -> (i32, i32) {
        if j == 0 && (params.free_left_seq2 || (n == 0 && params.free_right_seq2)) {
            (0, 0)
        } else if j == 0 {
            (params.start_gap_open, params.start_gap_extend)
        } else if j == n && params.free_right_seq2 {
            (0, 0)
        } else if j == n {
            (params.end_gap_open, params.end_gap_extend)
        } else {
            (params.gap_open, params.gap_extend)
        }
    };

    let origin = geom.idx(0, 0).expect("origin feasibility checked");
    lanes.m[origin] = 0;

    for i in 0..=m {
        for j in geom.row_lo[i]..geom.row_hi[i] {
            if i == 0 && j == 0 {
                continue;
            }
            let here = geom.idx(i, j).expect("cell within its own row window");

            if i > 0 && j > 0 {
                if let Some(diag) = geom.idx(i - 1, j - 1) {
                    let best_prev = lanes.m[diag].max(lanes.i[diag]).max(lanes.d[diag]);
                    if best_prev > BAD_CELL {
                        let sub = seq1.score_at(i - 1, seq2[j - 1], matrix);
                        lanes.m[here] = best_prev + sub;
                    }
                }
            }

            if j > 0 {
                if let Some(left) = geom.idx(i, j - 1) {
                    let (open, extend) = ins_costs(i);
                    let from_ext = lanes.i[left].saturating_sub(extend);
                    let from_open = lanes.m[left]
                        .max(lanes.d[left])
                        .saturating_sub(open)
                        .saturating_sub(extend);
                    lanes.i[here] = from_ext.max(from_open);
                }
            }

            if i > 0 {
                if let Some(up) = geom.idx(i - 1, j) {
                    let (open, extend) = del_costs(j);
                    let from_ext = lanes.d[up].saturating_sub(extend);
                    let from_open = lanes.m[up]
                        .max(lanes.i[up])
                        .saturating_sub(open)
                        .saturating_sub(extend);
                    lanes.d[here] = from_ext.max(from_open);
                }
            }
        }
    }

    let terminal = geom.idx(m, n).expect("terminal feasibility checked");
    let (score, start_lane) = {
        let (mv, iv, dv) = (lanes.m[terminal], lanes.i[terminal], lanes.d[terminal]);
        let best = mv.max(iv).max(dv);
        // Tie order: Match > Insert > Delete.
        let lane = if mv == best {
            Lane::M
        } else if iv == best {
            Lane::I
        } else {
            Lane::D
        };
        (best, lane)
    };
    if score <= BAD_CELL {
        return Err(PhysaliaError::InvalidInput(
            "no feasible alignment path within the band".into(),
        ));
    }

    // Traceback, re-deriving the producing state at each step.
    let mut ops: Vec<TranscriptOp> = Vec::with_capacity(m + n);
    let mut lane = start_lane;
    let mut i = m;
    let mut j = n;

    while i > 0 || j > 0 {
        let here = geom.idx(i, j).expect("traceback stays within the band");
        match lane {
            Lane::M => {
                debug_assert!(i > 0 && j > 0, "match column requires both sequences");
                let sub = seq1.score_at(i - 1, seq2[j - 1], matrix);
                let prev = lanes.m[here] - sub;
                ops.push(if seq1.is_match(i - 1, seq2[j - 1], matrix) {
                    TranscriptOp::Match
                } else {
                    TranscriptOp::Replace
                });
                i -= 1;
                j -= 1;
                let back = geom.idx(i, j).expect("diagonal predecessor feasible");
                lane = if lanes.m[back] == prev {
                    Lane::M
                } else if lanes.i[back] == prev {
                    Lane::I
                } else {
                    Lane::D
                };
            }
            Lane::I => {
                let (open, extend) = ins_costs(i);
                let v = lanes.i[here];
                ops.push(TranscriptOp::Insert);
                j -= 1;
                let back = geom.idx(i, j).expect("row predecessor feasible");
                // Prefer closing the run; Match before Delete among openers.
                if lanes.m[back] == v + open + extend {
                    lane = Lane::M;
                } else if lanes.d[back] == v + open + extend {
                    lane = Lane::D;
                } else {
                    lane = Lane::I;
                }
            }
            Lane::D => {
                let (open, extend) = del_costs(j);
                let v = lanes.d[here];
                ops.push(TranscriptOp::Delete);
                i -= 1;
                let back = geom.idx(i, j).expect("column predecessor feasible");
                if lanes.m[back] == v + open + extend {
                    lane = Lane::M;
                } else if lanes.i[back] == v + open + extend {
                    lane = Lane::I;
                } else {
                    lane = Lane::D;
                }
            }
        }
    }

    ops.reverse();
    Ok(GlobalAlignment {
        score,
        transcript: Transcript::from_ops(ops),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::Pssm;

    fn unit_matrix() -> ScoringMatrix {
        ScoringMatrix::new(1, -1).unwrap()
    }

    fn align_literal(
        seq1: &[u8],
        seq2: &[u8],
        matrix: &ScoringMatrix,
        params: &GlobalAlignParams,
    ) -> GlobalAlignment {
        global_align(&SeqSource::Literal(seq1), seq2, matrix, params).unwrap()
    }

    #[test]
    fn identical_sequences() {
        let matrix = unit_matrix();
        let r = align_literal(b"ACGT", b"ACGT", &matrix, &GlobalAlignParams::uniform(5, 1));
        assert_eq!(r.score, 4);
        assert_eq!(r.transcript.encode(), "4M");
    }

    #[test]
    fn single_interior_mismatch() {
        let matrix = unit_matrix();
        let r = align_literal(
            b"ACGAACGT",
            b"ACGTACGT",
            &matrix,
            &GlobalAlignParams::uniform(5, 1),
        );
        // 7 matches, 1 replace, no gaps
        assert_eq!(r.transcript.encode(), "3M1R4M");
        assert_eq!(r.score, 6);
    }

    #[test]
    fn affine_gap_closed_form() {
        let matrix = unit_matrix();
        let params = GlobalAlignParams::uniform(5, 1);
        for k in [1usize, 2, 5, 20] {
            // seq2 carries an interior k-length run absent from seq1
            let left = b"ACGTACGTAC".to_vec();
            let right = b"GTACGTACGT".to_vec();
            let seq1: Vec<u8> = [left.clone(), right.clone()].concat();
            let mut seq2 = left.clone();
            seq2.extend(std::iter::repeat(b'N').take(k));
            seq2.extend_from_slice(&right);

            let r = align_literal(&seq1, &seq2, &matrix, &params);
            let expected = seq1.len() as i32 - 5 - k as i32;
            assert_eq!(r.score, expected, "k = {k}");
            let inserts = r
                .transcript
                .ops()
                .iter()
                .filter(|op| matches!(op, TranscriptOp::Insert))
                .count();
            assert_eq!(inserts, k);
        }
    }

    #[test]
    fn contained_query_with_free_seq2_ends() {
        let matrix = unit_matrix();
        // seq2 ("CGTAC") sits inside seq1 at offset 2
        let params = GlobalAlignParams::uniform(5, 1).with_free_ends(false, false, true, true);
        let r = align_literal(b"AACGTACG", b"CGTAC", &matrix, &params);
        assert_eq!(r.score, 5);
        assert_eq!(r.transcript.encode(), "2D5M1D");
    }

    #[test]
    fn all_ends_free_symmetric() {
        let matrix = unit_matrix();
        let params = GlobalAlignParams::uniform(5, 1).with_free_ends(true, true, true, true);
        let r = align_literal(b"AACGTACG", b"CGTAC", &matrix, &params);
        assert_eq!(r.score, 5);
        // and the flipped containment
        let r = align_literal(b"CGTAC", b"AACGTACG", &matrix, &params);
        assert_eq!(r.score, 5);
        assert_eq!(r.transcript.encode(), "2I5M1I");
    }

    #[test]
    fn zero_length_inputs_are_legal() {
        let matrix = unit_matrix();
        let params = GlobalAlignParams::uniform(5, 1);
        let r = align_literal(b"", b"ACG", &matrix, &params);
        assert_eq!(r.transcript.encode(), "3I");
        assert_eq!(r.score, -(5 + 3));
        let r = align_literal(b"ACG", b"", &matrix, &params);
        assert_eq!(r.transcript.encode(), "3D");
        assert_eq!(r.score, -(5 + 3));
        let r = align_literal(b"", b"", &matrix, &params);
        assert!(r.transcript.is_empty());
        assert_eq!(r.score, 0);
    }

    #[test]
    fn zero_length_with_free_edges_costs_nothing() {
        let matrix = unit_matrix();
        let params = GlobalAlignParams::uniform(5, 1).with_free_ends(true, true, false, false);
        let r = align_literal(b"", b"ACG", &matrix, &params);
        assert_eq!(r.score, 0);
        assert_eq!(r.transcript.encode(), "3I");
    }

    #[test]
    fn distinct_edge_costs_apply_on_borders() {
        let matrix = unit_matrix();
        let mut params = GlobalAlignParams::uniform(5, 1);
        params.start_gap_open = 1;
        params.start_gap_extend = 0;
        params.end_gap_open = 2;
        params.end_gap_extend = 0;
        // leading delete run (column 0) uses start costs, trailing (column n)
        // uses end costs
        let r = align_literal(b"AACGTACG", b"CGTAC", &matrix, &params);
        assert_eq!(r.transcript.encode(), "2D5M1D");
        assert_eq!(r.score, 5 - 1 - 2);
    }

    #[test]
    fn pssm_operand() {
        let matrix = ScoringMatrix::new(2, -1).unwrap();
        let pssm = Pssm::from_sequence(b"ACGT", &matrix).unwrap();
        let r = global_align(
            &SeqSource::Profile(&pssm),
            b"ACGT",
            &matrix,
            &GlobalAlignParams::uniform(5, 1),
        )
        .unwrap();
        assert_eq!(r.score, 8);
        assert_eq!(r.transcript.encode(), "4M");
    }

    #[test]
    fn transcript_consumes_both_inputs() {
        let matrix = unit_matrix();
        let r = align_literal(
            b"ACGTAA",
            b"AGTAAC",
            &matrix,
            &GlobalAlignParams::uniform(3, 1),
        );
        assert_eq!(r.transcript.seq1_len(), 6);
        assert_eq!(r.transcript.seq2_len(), 6);
    }

    #[test]
    fn banded_matches_unbanded_when_wide_enough() {
        let matrix = unit_matrix();
        let plain = GlobalAlignParams::uniform(5, 1);
        let banded = GlobalAlignParams::uniform(5, 1).with_band(Band {
            offset: 0,
            width: 8,
        });
        let full = align_literal(b"ACGTACGTAC", b"ACGTTCGTAC", &matrix, &plain);
        let band = align_literal(b"ACGTACGTAC", b"ACGTTCGTAC", &matrix, &banded);
        assert_eq!(full.score, band.score);
        assert_eq!(full.transcript, band.transcript);
    }

    #[test]
    fn band_rejects_unreachable_terminal() {
        let matrix = unit_matrix();
        // seq2 much longer than seq1: terminal diagonal offset is 6, band
        // around the main diagonal cannot reach it
        let params = GlobalAlignParams::uniform(5, 1).with_band(Band {
            offset: 0,
            width: 2,
        });
        let err = global_align(
            &SeqSource::Literal(b"AC"),
            b"ACGTACGT",
            &matrix,
            &params,
        );
        assert!(err.is_err());
    }

    #[test]
    fn narrow_band_degrades_off_band_optimum() {
        let matrix = ScoringMatrix::new(2, -1).unwrap();
        // optimal unbanded alignment needs a 4-wide excursion off the main
        // diagonal; a 1-wide band cannot take it
        let seq1 = b"AAAATTTT";
        let seq2 = b"TTTTAAAA";
        let free = GlobalAlignParams::uniform(2, 1);
        let banded = GlobalAlignParams::uniform(2, 1).with_band(Band {
            offset: 0,
            width: 1,
        });
        let full = align_literal(seq1, seq2, &matrix, &free);
        let band = align_literal(seq1, seq2, &matrix, &banded);
        assert!(
            band.score <= full.score,
            "banded {} vs unbanded {}",
            band.score,
            full.score
        );
    }

    #[test]
    fn score_additivity_with_direct_rescoring() {
        let matrix = ScoringMatrix::new(2, -1).unwrap();
        let seq1 = b"ACGTACGTAAGG";
        let seq2 = b"ACGACGTACGGG";
        let params = GlobalAlignParams::uniform(4, 1);
        let r = align_literal(seq1, seq2, &matrix, &params);
        let rescored = r.transcript.score(
            0..r.transcript.len(),
            &SeqSource::Literal(seq1),
            seq2,
            0,
            0,
            &matrix,
            4,
            1,
        );
        assert_eq!(rescored, r.score);
    }

    #[test]
    fn negative_costs_rejected() {
        let matrix = unit_matrix();
        let mut params = GlobalAlignParams::uniform(5, 1);
        params.gap_extend = -1;
        assert!(global_align(&SeqSource::Literal(b"AC"), b"AC", &matrix, &params).is_err());
    }
}
