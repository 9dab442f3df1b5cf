//! Scoring sources for pairwise alignment.
//!
//! Provides simple match/mismatch scoring ([`ScoringMatrix`]), position-
//! specific scoring matrices ([`Pssm`]), residue-frequency profiles
//! ([`FreqMatrix`]), and the [`SeqSource`] operand accepted by the aligner
//! in place of a literal first sequence.
//!
//! Scores are signed integers; callers wanting sub-unit precision scale
//! their inputs by a fixed multiplier before building a [`Pssm`] — the
//! scale factor is a calling convention, not enforced here.

use physalia_core::{PhysaliaError, Result};

// ---------------------------------------------------------------------------
// Residue alphabet
// ---------------------------------------------------------------------------

/// Matrix dimension: 20 standard amino acids + B (Asx), Z (Glx), X, *.
///
/// The nucleotide letters A, C, G, T are members of the amino-acid alphabet,
/// so the same index space serves both residue types.
pub const ALPHABET_SIZE: usize = 24;

/// Maps a residue letter to its 0-based column index.
///
/// Returns `None` for unrecognized characters.
pub fn residue_index(residue: u8) -> Option<usize> {
    match residue.to_ascii_uppercase() {
        b'A' => Some(0),
        b'R' => Some(1),
        b'N' => Some(2),
        b'D' => Some(3),
        b'C' => Some(4),
        b'Q' => Some(5),
        b'E' => Some(6),
        b'G' => Some(7),
        b'H' => Some(8),
        b'I' => Some(9),
        b'L' => Some(10),
        b'K' => Some(11),
        b'M' => Some(12),
        b'F' => Some(13),
        b'P' => Some(14),
        b'S' => Some(15),
        b'T' => Some(16),
        b'W' => Some(17),
        b'Y' => Some(18),
        b'V' => Some(19),
        b'B' => Some(20),
        b'Z' => Some(21),
        b'X' => Some(22),
        b'*' => Some(23),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Simple scoring
// ---------------------------------------------------------------------------

/// A simple match/mismatch scoring matrix.
///
/// Suitable for literal sequences where all matches score the same and all
/// mismatches score the same. Gap costs live in the aligner parameters, not
/// here.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoringMatrix {
    pub match_score: i32,
    pub mismatch_score: i32,
}

impl ScoringMatrix {
    /// Create a new scoring matrix.
    ///
    /// # Errors
    ///
    /// Returns an error if `match_score` is not positive or `mismatch_score`
    /// is not negative.
    pub fn new(match_score: i32, mismatch_score: i32) -> Result<Self> {
        if match_score <= 0 {
            return Err(PhysaliaError::InvalidInput(
                "match_score must be positive".into(),
            ));
        }
        if mismatch_score >= 0 {
            return Err(PhysaliaError::InvalidInput(
                "mismatch_score must be negative".into(),
            ));
        }
        Ok(Self {
            match_score,
            mismatch_score,
        })
    }

    /// Default scoring for nucleotides: +2 match, -1 mismatch.
    pub fn dna_default() -> Self {
        Self {
            match_score: 2,
            mismatch_score: -1,
        }
    }

    /// Score a pair of residues. Case-insensitive.
    pub fn score_pair(&self, a: u8, b: u8) -> i32 {
        if a.to_ascii_uppercase() == b.to_ascii_uppercase() {
            self.match_score
        } else {
            self.mismatch_score
        }
    }
}

// ---------------------------------------------------------------------------
// Position-specific scoring
// ---------------------------------------------------------------------------

/// A position-specific scoring matrix: one score column per position.
///
/// Each column holds [`ALPHABET_SIZE`] integer scores, one per residue.
/// Used as the first aligner operand in place of a literal sequence.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pssm {
    ncols: usize,
    /// `ncols * ALPHABET_SIZE` scores, column-major by position.
    scores: Vec<i32>,
}

impl Pssm {
    /// Create a PSSM from a flattened score table.
    ///
    /// # Errors
    ///
    /// Returns an error if `scores.len() != ncols * ALPHABET_SIZE`.
    pub fn new(ncols: usize, scores: Vec<i32>) -> Result<Self> {
        if scores.len() != ncols * ALPHABET_SIZE {
            return Err(PhysaliaError::InvalidInput(format!(
                "PSSM score table length {} != {} columns * {}",
                scores.len(),
                ncols,
                ALPHABET_SIZE
            )));
        }
        Ok(Self { ncols, scores })
    }

    /// Build a degenerate PSSM from a literal sequence: each column scores
    /// `match_score` for the observed residue and `mismatch_score` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence contains unrecognized residues.
    pub fn from_sequence(seq: &[u8], matrix: &ScoringMatrix) -> Result<Self> {
        let mut scores = Vec::with_capacity(seq.len() * ALPHABET_SIZE);
        for (pos, &residue) in seq.iter().enumerate() {
            let idx = residue_index(residue).ok_or_else(|| {
                PhysaliaError::InvalidInput(format!(
                    "unrecognized residue {:?} at position {pos}",
                    residue as char
                ))
            })?;
            for col in 0..ALPHABET_SIZE {
                scores.push(if col == idx {
                    matrix.match_score
                } else {
                    matrix.mismatch_score
                });
            }
        }
        Ok(Self {
            ncols: seq.len(),
            scores,
        })
    }

    /// Number of positions (columns).
    pub fn len(&self) -> usize {
        self.ncols
    }

    /// Whether the PSSM has zero columns.
    pub fn is_empty(&self) -> bool {
        self.ncols == 0
    }

    /// Score for aligning `residue` against position `pos`.
    ///
    /// Unrecognized residues receive the worst score in the column.
    pub fn score(&self, pos: usize, residue: u8) -> i32 {
        let col = self.column(pos);
        match residue_index(residue) {
            Some(i) => col[i],
            None => col.iter().copied().min().unwrap_or(0),
        }
    }

    /// The full score column at `pos`.
    pub fn column(&self, pos: usize) -> &[i32] {
        &self.scores[pos * ALPHABET_SIZE..(pos + 1) * ALPHABET_SIZE]
    }

    /// A new PSSM restricted to the given column range.
    pub fn slice(&self, range: physalia_core::Range) -> Pssm {
        Pssm {
            ncols: range.len(),
            scores: self.scores[range.start * ALPHABET_SIZE..range.end * ALPHABET_SIZE].to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Residue frequencies
// ---------------------------------------------------------------------------

/// Per-position residue-frequency columns.
///
/// The target of the frequency-blending pass: reference-derived columns are
/// mixed into a query profile built from its literal sequence.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FreqMatrix {
    ncols: usize,
    /// `ncols * ALPHABET_SIZE` frequencies, column-major by position.
    freqs: Vec<f64>,
}

impl FreqMatrix {
    /// Create a frequency matrix from a flattened table.
    ///
    /// # Errors
    ///
    /// Returns an error if `freqs.len() != ncols * ALPHABET_SIZE`.
    pub fn new(ncols: usize, freqs: Vec<f64>) -> Result<Self> {
        if freqs.len() != ncols * ALPHABET_SIZE {
            return Err(PhysaliaError::InvalidInput(format!(
                "frequency table length {} != {} columns * {}",
                freqs.len(),
                ncols,
                ALPHABET_SIZE
            )));
        }
        Ok(Self { ncols, freqs })
    }

    /// Build a frequency matrix from a literal sequence: frequency 1.0 at
    /// each observed residue.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence contains unrecognized residues.
    pub fn from_sequence(seq: &[u8]) -> Result<Self> {
        let mut freqs = vec![0.0; seq.len() * ALPHABET_SIZE];
        for (pos, &residue) in seq.iter().enumerate() {
            let idx = residue_index(residue).ok_or_else(|| {
                PhysaliaError::InvalidInput(format!(
                    "unrecognized residue {:?} at position {pos}",
                    residue as char
                ))
            })?;
            freqs[pos * ALPHABET_SIZE + idx] = 1.0;
        }
        Ok(Self {
            ncols: seq.len(),
            freqs,
        })
    }

    /// Number of positions (columns).
    pub fn len(&self) -> usize {
        self.ncols
    }

    /// Whether the matrix has zero columns.
    pub fn is_empty(&self) -> bool {
        self.ncols == 0
    }

    /// The frequency column at `pos`.
    pub fn column(&self, pos: usize) -> &[f64] {
        &self.freqs[pos * ALPHABET_SIZE..(pos + 1) * ALPHABET_SIZE]
    }

    /// Overwrite the column at `pos` with `source` down-weighted by
    /// `1 - boost`, then add `boost` at `observed`'s index.
    ///
    /// `observed` residues outside the alphabet leave the column at the
    /// down-weighted source values.
    pub fn blend_column(&mut self, pos: usize, source: &[f64], boost: f64, observed: u8) {
        let col = &mut self.freqs[pos * ALPHABET_SIZE..(pos + 1) * ALPHABET_SIZE];
        for (dst, &src) in col.iter_mut().zip(source.iter()) {
            *dst = src * (1.0 - boost);
        }
        if let Some(idx) = residue_index(observed) {
            col[idx] += boost;
        }
    }
}

// ---------------------------------------------------------------------------
// Aligner operand
// ---------------------------------------------------------------------------

/// The first operand of the global aligner: a literal sequence scored
/// through a [`ScoringMatrix`], or a position-specific profile.
#[derive(Debug, Clone, Copy)]
pub enum SeqSource<'a> {
    /// A literal residue sequence.
    Literal(&'a [u8]),
    /// A position-specific scoring matrix.
    Profile(&'a Pssm),
}

impl<'a> SeqSource<'a> {
    /// Number of positions in the operand.
    pub fn len(&self) -> usize {
        match self {
            SeqSource::Literal(s) => s.len(),
            SeqSource::Profile(p) => p.len(),
        }
    }

    /// Whether the operand has zero positions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Score for pairing position `pos` of this operand with `residue`.
    pub fn score_at(&self, pos: usize, residue: u8, matrix: &ScoringMatrix) -> i32 {
        match self {
            SeqSource::Literal(s) => matrix.score_pair(s[pos], residue),
            SeqSource::Profile(p) => p.score(pos, residue),
        }
    }

    /// Whether position `pos` paired with `residue` counts as a match.
    ///
    /// Literal operands compare residues case-insensitively; profile
    /// operands count a positive column score as a match.
    pub fn is_match(&self, pos: usize, residue: u8, _matrix: &ScoringMatrix) -> bool {
        match self {
            SeqSource::Literal(s) => s[pos].to_ascii_uppercase() == residue.to_ascii_uppercase(),
            SeqSource::Profile(p) => p.score(pos, residue) > 0,
        }
    }
}
