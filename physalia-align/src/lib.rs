//! Pairwise alignment engine for the Physalia toolkit.
//!
//! Provides global alignment with affine gap costs, per-edge gap handling,
//! and off-diagonal banding ([`global_align`]); compact edit transcripts
//! with a run-length text codec ([`Transcript`]); position-specific scoring
//! ([`Pssm`]); and reconciliation of coarse hits against reference block
//! boundaries ([`realign`]).
//!
//! # Quick start
//!
//! ```
//! use physalia_align::{global_align, GlobalAlignParams, ScoringMatrix, SeqSource};
//!
//! let matrix = ScoringMatrix::new(1, -1).unwrap();
//! let params = GlobalAlignParams::uniform(5, 1);
//! let result = global_align(
//!     &SeqSource::Literal(b"ACGAACGT"),
//!     b"ACGTACGT",
//!     &matrix,
//!     &params,
//! )
//! .unwrap();
//! assert_eq!(result.transcript.encode(), "3M1R4M");
//! assert_eq!(result.score, 6);
//! ```

pub mod global;
pub mod hit;
pub mod realign;
pub mod report;
pub mod scoring;
pub mod transcript;

pub use global::{global_align, Band, GlobalAlignParams, GlobalAlignment};
pub use hit::Hit;
pub use realign::{
    add_up_sub_hits, assign_residue_frequencies, blocks_are_sorted, load_block_boundaries,
    purge_unwanted_hits, realign_blocks, resolve_sub_hit_conflicts, Block, RealignParams,
};
pub use report::write_hit_table;
pub use scoring::{FreqMatrix, Pssm, ScoringMatrix, SeqSource, ALPHABET_SIZE};
pub use transcript::{MatchRegion, Transcript, TranscriptOp};
