//! Alignment transcripts: per-column edit operations with a run-length
//! text codec.
//!
//! A transcript records one operation per alignment column. The four codes:
//!
//! - `M` — match (both sequences consume one position)
//! - `R` — replace/mismatch (both consume one position)
//! - `I` — insert: gap in seq1, only seq2 consumes a position
//! - `D` — delete: gap in seq2, only seq1 consumes a position
//!
//! Throughout the crate seq1 is the reference/profile operand and seq2 the
//! query. Transcripts are immutable once produced by the aligner; slicing
//! produces new transcripts. The run-length text form (`"3M1R4M"`) is the
//! wire format between the aligner and any formatter and round-trips
//! exactly through [`Transcript::encode`]/[`Transcript::decode`].

use core::fmt;

use physalia_core::{PhysaliaError, Range, Result};

use crate::scoring::{ScoringMatrix, SeqSource};

/// A single alignment column operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TranscriptOp {
    /// Matching residues. Code `M`.
    Match,
    /// Mismatching residues. Code `R`.
    Replace,
    /// Gap in seq1 — consumes seq2 only. Code `I`.
    Insert,
    /// Gap in seq2 — consumes seq1 only. Code `D`.
    Delete,
}

impl TranscriptOp {
    /// Single-character text code.
    pub fn code(&self) -> char {
        match self {
            TranscriptOp::Match => 'M',
            TranscriptOp::Replace => 'R',
            TranscriptOp::Insert => 'I',
            TranscriptOp::Delete => 'D',
        }
    }

    /// Parse a text code.
    pub fn from_code(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'M' => Some(TranscriptOp::Match),
            'R' => Some(TranscriptOp::Replace),
            'I' => Some(TranscriptOp::Insert),
            'D' => Some(TranscriptOp::Delete),
            _ => None,
        }
    }

    /// Whether this operation consumes a position of seq1.
    pub fn consumes_seq1(&self) -> bool {
        matches!(
            self,
            TranscriptOp::Match | TranscriptOp::Replace | TranscriptOp::Delete
        )
    }

    /// Whether this operation consumes a position of seq2.
    pub fn consumes_seq2(&self) -> bool {
        matches!(
            self,
            TranscriptOp::Match | TranscriptOp::Replace | TranscriptOp::Insert
        )
    }

    /// Whether this operation is a gap (insert or delete).
    pub fn is_gap(&self) -> bool {
        matches!(self, TranscriptOp::Insert | TranscriptOp::Delete)
    }
}

/// The `(seq1, seq2)` coordinate ranges of one maximal run of matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchRegion {
    pub seq1: Range,
    pub seq2: Range,
}

/// An ordered sequence of per-column edit operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transcript {
    ops: Vec<TranscriptOp>,
}

impl Transcript {
    /// An empty transcript.
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Wrap an operation vector.
    pub fn from_ops(ops: Vec<TranscriptOp>) -> Self {
        Self { ops }
    }

    /// Number of operations (alignment columns).
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the transcript has no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The operation slice.
    pub fn ops(&self) -> &[TranscriptOp] {
        &self.ops
    }

    /// Append one operation.
    pub fn push(&mut self, op: TranscriptOp) {
        self.ops.push(op);
    }

    /// Append `n` copies of `op`.
    pub fn extend_with(&mut self, op: TranscriptOp, n: usize) {
        self.ops.extend(std::iter::repeat(op).take(n));
    }

    /// Append all operations of `other`.
    pub fn append(&mut self, other: &Transcript) {
        self.ops.extend_from_slice(&other.ops);
    }

    /// Number of seq1 positions consumed.
    pub fn seq1_len(&self) -> usize {
        self.ops.iter().filter(|op| op.consumes_seq1()).count()
    }

    /// Number of seq2 positions consumed.
    pub fn seq2_len(&self) -> usize {
        self.ops.iter().filter(|op| op.consumes_seq2()).count()
    }

    /// Number of match columns.
    pub fn matches(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, TranscriptOp::Match))
            .count()
    }

    /// The operations in back-to-front order.
    pub fn reversed(&self) -> Transcript {
        Transcript {
            ops: self.ops.iter().copied().rev().collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Text codec
    // -----------------------------------------------------------------------

    /// Run-length text encoding, e.g. `"3M1R4M"`.
    ///
    /// Consecutive identical operations are grouped as `<count><code>`.
    /// The empty transcript encodes as the empty string.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        let mut iter = self.ops.iter().peekable();
        while let Some(op) = iter.next() {
            let mut run = 1usize;
            while iter.peek() == Some(&op) {
                iter.next();
                run += 1;
            }
            out.push_str(&format!("{}{}", run, op.code()));
        }
        out
    }

    /// Decode a run-length text form.
    ///
    /// An omitted count means 1, so `"MMMR"` and `"3M1R"` decode to the same
    /// transcript.
    ///
    /// # Errors
    ///
    /// Returns [`PhysaliaError::Parse`] on unknown op codes or counts that
    /// do not parse.
    pub fn decode(s: &str) -> Result<Transcript> {
        let mut ops = Vec::new();
        let mut count: Option<usize> = None;
        for (i, c) in s.char_indices() {
            if c.is_ascii_digit() {
                let digit = (c as u8 - b'0') as usize;
                count = Some(count.unwrap_or(0) * 10 + digit);
            } else {
                let op = TranscriptOp::from_code(c).ok_or_else(|| {
                    PhysaliaError::Parse(format!(
                        "unknown transcript op '{c}' at position {i}"
                    ))
                })?;
                let n = count.take().unwrap_or(1);
                if n == 0 {
                    return Err(PhysaliaError::Parse(format!(
                        "zero-length run before op '{c}' at position {i}"
                    )));
                }
                ops.extend(std::iter::repeat(op).take(n));
            }
        }
        if count.is_some() {
            return Err(PhysaliaError::Parse(
                "transcript text ends with a count but no op code".into(),
            ));
        }
        Ok(Transcript { ops })
    }

    // -----------------------------------------------------------------------
    // Coordinate queries
    // -----------------------------------------------------------------------

    /// The `(seq1, seq2)` coordinate ranges of each maximal run of `M`
    /// operations, given the sequence offsets where this transcript begins.
    pub fn match_regions(&self, seq1_start: usize, seq2_start: usize) -> Vec<MatchRegion> {
        let mut regions = Vec::new();
        let mut p1 = seq1_start;
        let mut p2 = seq2_start;
        let mut open: Option<(usize, usize)> = None;

        for op in &self.ops {
            if matches!(op, TranscriptOp::Match) {
                if open.is_none() {
                    open = Some((p1, p2));
                }
            } else if let Some((s1, s2)) = open.take() {
                regions.push(MatchRegion {
                    seq1: Range::new(s1, p1),
                    seq2: Range::new(s2, p2),
                });
            }
            if op.consumes_seq1() {
                p1 += 1;
            }
            if op.consumes_seq2() {
                p2 += 1;
            }
        }
        if let Some((s1, s2)) = open {
            regions.push(MatchRegion {
                seq1: Range::new(s1, p1),
                seq2: Range::new(s2, p2),
            });
        }
        regions
    }

    /// The seq2 range covered while seq1 moves through `seq1_range`.
    ///
    /// Only aligned columns (`M`/`R`) contribute endpoints; a sub-range
    /// aligned entirely to gaps yields an empty range at the seq2 position
    /// where the sub-range begins.
    pub fn project_to_seq2(
        &self,
        seq1_range: Range,
        seq1_start: usize,
        seq2_start: usize,
    ) -> Range {
        let mut p1 = seq1_start;
        let mut p2 = seq2_start;
        let mut lo: Option<usize> = None;
        let mut hi = seq2_start;
        let mut anchor = seq2_start;

        for op in &self.ops {
            if p1 >= seq1_range.end {
                break;
            }
            let inside = p1 >= seq1_range.start;
            if inside && lo.is_none() {
                anchor = p2;
            }
            if matches!(op, TranscriptOp::Match | TranscriptOp::Replace) && inside {
                if lo.is_none() {
                    lo = Some(p2);
                }
                hi = p2 + 1;
            }
            if op.consumes_seq1() {
                p1 += 1;
            }
            if op.consumes_seq2() {
                p2 += 1;
            }
        }

        match lo {
            Some(l) => Range::new(l, hi),
            None => Range::new(anchor, anchor),
        }
    }

    /// Index of the first aligned (`M`/`R`) operation, if any.
    pub fn first_aligned_op(&self) -> Option<usize> {
        self.ops.iter().position(|op| !op.is_gap())
    }

    /// Index of the last aligned (`M`/`R`) operation, if any.
    pub fn last_aligned_op(&self) -> Option<usize> {
        self.ops.iter().rposition(|op| !op.is_gap())
    }

    /// The op kind of the leading gap run, if the transcript starts with one.
    pub fn leading_gap_kind(&self) -> Option<TranscriptOp> {
        self.ops.first().copied().filter(|op| op.is_gap())
    }

    /// The op kind of the trailing gap run, if the transcript ends with one.
    pub fn trailing_gap_kind(&self) -> Option<TranscriptOp> {
        self.ops.last().copied().filter(|op| op.is_gap())
    }

    // -----------------------------------------------------------------------
    // Extraction and re-scoring
    // -----------------------------------------------------------------------

    /// Extract the operations covering an operation-index sub-range.
    ///
    /// Indices are operation indices, not sequence coordinates.
    ///
    /// # Panics
    ///
    /// Panics if the range exceeds the operation count — out-of-range
    /// indices are a caller bug, not a recoverable condition; bound-check
    /// with [`Transcript::len`] first.
    pub fn slice(&self, ops_range: core::ops::Range<usize>) -> Transcript {
        assert!(
            ops_range.start <= ops_range.end && ops_range.end <= self.ops.len(),
            "transcript slice {}..{} out of bounds (len {})",
            ops_range.start,
            ops_range.end,
            self.ops.len()
        );
        Transcript {
            ops: self.ops[ops_range].to_vec(),
        }
    }

    /// Re-score an operation-index sub-range directly, without dynamic
    /// programming.
    ///
    /// `seq1_start`/`seq2_start` are the sequence offsets at which the
    /// sub-range begins. Matches and replaces are scored through `seq1`;
    /// each maximal gap run is charged `gap_open + len * gap_extend`
    /// (subtracted), with a run truncated by the sub-range boundary charged
    /// its own opening cost.
    ///
    /// # Panics
    ///
    /// Panics if the op range exceeds the transcript length, or if the
    /// implied sequence offsets run past either input — both caller bugs.
    pub fn score(
        &self,
        ops_range: core::ops::Range<usize>,
        seq1: &SeqSource<'_>,
        seq2: &[u8],
        seq1_start: usize,
        seq2_start: usize,
        matrix: &ScoringMatrix,
        gap_open: i32,
        gap_extend: i32,
    ) -> i32 {
        assert!(
            ops_range.start <= ops_range.end && ops_range.end <= self.ops.len(),
            "transcript score range {}..{} out of bounds (len {})",
            ops_range.start,
            ops_range.end,
            self.ops.len()
        );

        let mut total = 0i32;
        let mut p1 = seq1_start;
        let mut p2 = seq2_start;
        let mut in_gap: Option<TranscriptOp> = None;

        for &op in &self.ops[ops_range] {
            match op {
                TranscriptOp::Match | TranscriptOp::Replace => {
                    total += seq1.score_at(p1, seq2[p2], matrix);
                    p1 += 1;
                    p2 += 1;
                    in_gap = None;
                }
                TranscriptOp::Insert => {
                    if in_gap != Some(TranscriptOp::Insert) {
                        total -= gap_open;
                        in_gap = Some(TranscriptOp::Insert);
                    }
                    total -= gap_extend;
                    p2 += 1;
                }
                TranscriptOp::Delete => {
                    if in_gap != Some(TranscriptOp::Delete) {
                        total -= gap_open;
                        in_gap = Some(TranscriptOp::Delete);
                    }
                    total -= gap_extend;
                    p1 += 1;
                }
            }
        }
        total
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
