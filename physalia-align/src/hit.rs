//! Candidate local alignments ("hits") and their refined sub-hits.

use physalia_core::Range;

use crate::transcript::Transcript;

/// One candidate alignment between a query sequence and a reference profile.
///
/// A hit list (`Vec<Hit>`) exclusively owns its hits; a hit exclusively owns
/// its `sub_hits`. While `sub_hits` is non-empty the parent's transcript is a
/// derived aggregate — the per-block sub-hit transcripts are authoritative.
///
/// Transcript orientation: seq1 is the reference/profile, seq2 the query.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hit {
    /// Index of the query sequence this hit belongs to.
    pub query_idx: usize,
    /// Index of the reference/profile this hit aligns against.
    pub ref_idx: usize,
    /// Aligned query span.
    pub query_range: Range,
    /// Aligned reference span.
    pub ref_range: Range,
    /// Alignment score.
    pub score: i32,
    /// Edit transcript over `[ref_range] x [query_range]`.
    pub transcript: Transcript,
    /// Refined per-block alignments, in reference order.
    pub sub_hits: Vec<Hit>,
}

impl Hit {
    /// Create a leaf hit (no sub-hits).
    pub fn new(
        query_idx: usize,
        ref_idx: usize,
        query_range: Range,
        ref_range: Range,
        score: i32,
        transcript: Transcript,
    ) -> Self {
        Self {
            query_idx,
            ref_idx,
            query_range,
            ref_range,
            score,
            transcript,
            sub_hits: Vec::new(),
        }
    }

    /// Fraction of a length-`query_len` query covered by this hit.
    pub fn query_coverage(&self, query_len: usize) -> f64 {
        if query_len == 0 {
            return 0.0;
        }
        self.query_range.len() as f64 / query_len as f64
    }

    /// Fraction of a length-`ref_len` reference covered by this hit.
    pub fn ref_coverage(&self, ref_len: usize) -> f64 {
        if ref_len == 0 {
            return 0.0;
        }
        self.ref_range.len() as f64 / ref_len as f64
    }

    /// Whether the transcript's consumed lengths agree with the hit ranges.
    pub fn is_consistent(&self) -> bool {
        self.transcript.seq1_len() == self.ref_range.len()
            && self.transcript.seq2_len() == self.query_range.len()
    }
}

impl physalia_core::Scored for Hit {
    fn score(&self) -> f64 {
        self.score as f64
    }
}
