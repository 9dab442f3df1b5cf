//! Gene-model decoding for the Physalia toolkit.
//!
//! A generalized Viterbi-style decoder over a lattice of biological states
//! (exons by position and phase, introns, intergenic stretches, split by
//! strand and protein-evidence flag). Signals — splice sites, start and
//! stop codons — instantiate candidate states left to right; each keeps a
//! single best-scoring predecessor, and the terminal backtrace partitions
//! the best chain into [`GeneModel`]s.
//!
//! The score model ([`ScoreModel`]) combines branch, length-distribution,
//! region-content, and terminal-signal scores, all in log space with
//! [`BAD_SCORE`] as the "no viable path" sentinel.

pub mod decoder;
pub mod gene;
pub mod model;
pub mod report;
pub mod signal;
pub mod state;

pub use decoder::{decode, DecoderParams};
pub use gene::{CoordMap, FrameShift, FrameShiftKind, GeneModel, Support};
pub use model::{is_bad_score, BranchScores, LengthDistr, RegionScores, ScoreModel, BAD_SCORE};
pub use report::write_gene_table;
pub use signal::{scan_signals, Signal, SignalKind};
pub use state::{Lattice, LatticeState, ProteinEvidence, StateClass, StateKind, StateRef, Strand};

#[cfg(test)]
mod tests {
    use super::*;
    use physalia_core::Range;

    /// Sequence with exactly one forward gene's worth of signals: ATG at
    /// 10, GT at 19, AG ending at 40, TAA ending at 52; N padding
    /// elsewhere produces no spurious motifs.
    fn synthetic_sequence() -> Vec<u8> {
        let mut seq = vec![b'N'; 60];
        seq[10..13].copy_from_slice(b"ATG");
        seq[19] = b'G';
        seq[20] = b'T';
        seq[38] = b'A';
        seq[39] = b'G';
        seq[49..52].copy_from_slice(b"TAA");
        seq
    }

    fn gene_model() -> ScoreModel {
        let mut coding_fwd = vec![1.0; 60];
        for v in coding_fwd.iter_mut().take(40).skip(19) {
            *v = -5.0;
        }
        let regions = RegionScores::new(
            coding_fwd,
            vec![0.0; 60],
            vec![0.0; 60],
            vec![0.0; 60],
            vec![0.0; 60],
        )
        .unwrap();
        ScoreModel::flat(60, 100).with_regions(regions)
    }

    #[test]
    fn scan_then_decode_end_to_end() {
        let seq = synthetic_sequence();
        let signals = scan_signals(&seq);
        assert_eq!(signals.len(), 4, "unexpected signals: {signals:?}");

        let genes = decode(
            &gene_model(),
            &signals,
            &[],
            &[],
            None,
            &DecoderParams::default(),
        )
        .unwrap();
        assert_eq!(genes.len(), 1);
        assert_eq!(genes[0].exons, vec![Range::new(10, 19), Range::new(40, 52)]);
        assert_eq!(genes[0].start_codon, Some(Range::new(10, 13)));
        assert_eq!(genes[0].stop_codon, Some(Range::new(49, 52)));
    }

    #[test]
    fn decoded_output_is_byte_identical_across_runs() {
        let seq = synthetic_sequence();
        let model = gene_model();
        let mut first = Vec::new();
        let mut second = Vec::new();
        for out in [&mut first, &mut second] {
            let signals = scan_signals(&seq);
            let genes = decode(&model, &signals, &[], &[], None, &DecoderParams::default())
                .unwrap();
            write_gene_table(out, &genes).unwrap();
        }
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }
}
