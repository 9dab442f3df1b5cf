//! The Viterbi-style forward pass over the state lattice and its terminal
//! backtrace into gene models.
//!
//! States advance strictly by increasing sequence position. Each signal
//! instantiates the candidate classes it implies; for every candidate the
//! decoder scans its admissible predecessor families backward — bounded by
//! the class's maximum span length and by the too-far heuristic — summing
//! branch, length, region, and terminal scores, and keeps only the single
//! best predecessor. A candidate with no finite predecessor is not
//! inserted. Determinism is part of the contract: families are visited in a
//! fixed order and ties keep the first best.

use physalia_core::{log_sum_exp, PhysaliaError, Range, Result};

use crate::gene::{CoordMap, GeneModel, Support};
use crate::model::{is_bad_score, ScoreModel, BAD_SCORE};
use crate::signal::{Signal, SignalKind};
use crate::state::{
    Lattice, LatticeState, ProteinEvidence, StateClass, StateKind, StateRef, Strand,
};

/// Tuning for one decode call.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecoderParams {
    /// Backward-scan distance bound: once any finite candidate is found,
    /// predecessors further than this are not considered (default: 50_000).
    /// A performance tunable, not a correctness knob.
    pub too_far: usize,
    /// Allow any state to terminate at the sequence end, scoring its tail
    /// with its own region track (default: false — only intergenic and
    /// gene-end states may stay open).
    pub allow_partial: bool,
    /// Force the terminal state to a particular kind.
    pub right_anchor: Option<StateKind>,
}

impl Default for DecoderParams {
    fn default() -> Self {
        Self {
            too_far: 50_000,
            allow_partial: false,
            right_anchor: None,
        }
    }
}

/// Decode the best-scoring chain of gene models from a signal track.
///
/// `signals` must be sorted by position and lie within the model's sequence
/// length; `protein_blocks` must be sorted by start. `supports` are offered
/// to each reconstructed gene; `coord_map` remaps the output into original
/// coordinates when frameshift edits were applied upstream.
///
/// # Errors
///
/// - [`PhysaliaError::InvalidInput`] for unsorted or out-of-range inputs —
///   precondition violations, not data quality.
/// - [`PhysaliaError::Resource`] if growing a state family fails.
/// - [`PhysaliaError::Invariant`] if the backtrace reaches exon states but
///   reconstructs no gene group — a decoder bug, not bad input.
pub fn decode(
    model: &ScoreModel,
    signals: &[Signal],
    protein_blocks: &[Range],
    supports: &[Support],
    coord_map: Option<&CoordMap>,
    params: &DecoderParams,
) -> Result<Vec<GeneModel>> {
    let seq_len = model.seq_len();
    if !signals.windows(2).all(|w| w[0].pos <= w[1].pos) {
        return Err(PhysaliaError::InvalidInput(
            "signal track must be sorted by position".into(),
        ));
    }
    if signals.last().is_some_and(|s| s.pos > seq_len) {
        return Err(PhysaliaError::InvalidInput(format!(
            "signal position beyond sequence length {seq_len}"
        )));
    }
    if !protein_blocks.windows(2).all(|w| w[0].start <= w[1].start) {
        return Err(PhysaliaError::InvalidInput(
            "protein blocks must be sorted by start".into(),
        ));
    }

    let mut lattice = Lattice::new();
    for signal in signals {
        for cand in candidate_classes(signal) {
            advance_candidate(&mut lattice, model, signal, &cand, protein_blocks, params)?;
        }
    }

    let Some(terminal) = select_terminal(&lattice, model, params) else {
        return Ok(Vec::new());
    };
    backtrace(&lattice, terminal, supports, coord_map)
}

// ---------------------------------------------------------------------------
// Candidate enumeration
// ---------------------------------------------------------------------------

const PROTEIN_FLAGS: [ProteinEvidence; 2] = [ProteinEvidence::No, ProteinEvidence::Required];

fn intergenic_class() -> StateClass {
    StateClass::new(
        StateKind::Intergenic,
        Strand::Forward,
        0,
        ProteinEvidence::Indifferent,
    )
}

/// The state classes a signal can end.
fn candidate_classes(signal: &Signal) -> Vec<StateClass> {
    use SignalKind::*;
    use StateKind::*;
    use Strand::*;

    let mut out = Vec::new();
    match (signal.kind, signal.strand) {
        // a gene opens here, so the intergenic stretch ends
        (StartCodon, Forward) | (StopCodon, Reverse) => out.push(intergenic_class()),
        (Donor, Forward) => {
            for protein in PROTEIN_FLAGS {
                for phase in 0..3 {
                    out.push(StateClass::new(FirstExon, Forward, phase, protein));
                    out.push(StateClass::new(InternalExon, Forward, phase, protein));
                }
            }
        }
        (Acceptor, Forward) => {
            for protein in PROTEIN_FLAGS {
                for phase in 0..3 {
                    out.push(StateClass::new(Intron, Forward, phase, protein));
                }
            }
        }
        (StopCodon, Forward) => {
            for protein in PROTEIN_FLAGS {
                out.push(StateClass::new(LastExon, Forward, 0, protein));
                out.push(StateClass::new(SingleExon, Forward, 0, protein));
            }
        }
        (Acceptor, Reverse) => {
            for protein in PROTEIN_FLAGS {
                for phase in 0..3 {
                    out.push(StateClass::new(LastExon, Reverse, phase, protein));
                    out.push(StateClass::new(InternalExon, Reverse, phase, protein));
                }
            }
        }
        (Donor, Reverse) => {
            for protein in PROTEIN_FLAGS {
                for phase in 0..3 {
                    out.push(StateClass::new(Intron, Reverse, phase, protein));
                }
            }
        }
        (StartCodon, Reverse) => {
            for protein in PROTEIN_FLAGS {
                out.push(StateClass::new(FirstExon, Reverse, 0, protein));
                out.push(StateClass::new(SingleExon, Reverse, 0, protein));
            }
        }
    }
    out
}

/// Admissible predecessor classes of a candidate, in reading order.
fn pred_classes(cand: &StateClass) -> Vec<StateClass> {
    use StateKind::*;
    use Strand::*;

    let mut out = Vec::new();
    match (cand.kind, cand.strand) {
        (Intergenic, _) => {
            for protein in PROTEIN_FLAGS {
                out.push(StateClass::new(LastExon, Forward, 0, protein));
                out.push(StateClass::new(SingleExon, Forward, 0, protein));
                out.push(StateClass::new(FirstExon, Reverse, 0, protein));
                out.push(StateClass::new(SingleExon, Reverse, 0, protein));
            }
        }
        (FirstExon, Forward) | (SingleExon, _) | (LastExon, Reverse) => {
            out.push(intergenic_class());
        }
        (InternalExon, strand) => {
            for protein in PROTEIN_FLAGS {
                for phase in 0..3 {
                    out.push(StateClass::new(Intron, strand, phase, protein));
                }
            }
        }
        (Intron, Forward) => {
            for protein in PROTEIN_FLAGS {
                out.push(StateClass::new(FirstExon, Forward, cand.phase, protein));
                out.push(StateClass::new(InternalExon, Forward, cand.phase, protein));
            }
        }
        (Intron, Reverse) => {
            for protein in PROTEIN_FLAGS {
                out.push(StateClass::new(LastExon, Reverse, cand.phase, protein));
                out.push(StateClass::new(InternalExon, Reverse, cand.phase, protein));
            }
        }
        (LastExon, Forward) | (FirstExon, Reverse) => {
            for protein in PROTEIN_FLAGS {
                for phase in 0..3 {
                    out.push(StateClass::new(Intron, cand.strand, phase, protein));
                }
            }
        }
    }
    out
}

/// Phase and length admissibility of a span between `pred` and `cand`.
fn span_ok(cand: &StateClass, pred: &StateClass, len: usize) -> bool {
    use StateKind::*;
    let phase = cand.phase as usize;
    match (cand.kind, cand.strand) {
        (FirstExon, Strand::Forward) | (LastExon, Strand::Reverse) => {
            len >= 3 && len % 3 == phase
        }
        (LastExon, Strand::Forward) | (FirstExon, Strand::Reverse) => {
            len >= 3 && (pred.phase as usize + len) % 3 == 0
        }
        (InternalExon, _) => (pred.phase as usize + len) % 3 == phase,
        (SingleExon, _) => len >= 6 && len % 3 == 0,
        (Intron, _) => pred.phase == cand.phase,
        (Intergenic, _) => true,
    }
}

// ---------------------------------------------------------------------------
// Forward pass
// ---------------------------------------------------------------------------

fn strand_slot(strand: Strand) -> usize {
    match strand {
        Strand::Forward => 0,
        Strand::Reverse => 1,
    }
}

/// Count protein blocks falling entirely within `[start, end)`.
pub(crate) fn count_blocks_within(blocks: &[Range], start: usize, end: usize) -> usize {
    let lo = blocks.partition_point(|b| b.start < start);
    blocks[lo..]
        .iter()
        .take_while(|b| b.start < end)
        .filter(|b| b.end <= end)
        .count()
}

fn advance_candidate(
    lattice: &mut Lattice,
    model: &ScoreModel,
    signal: &Signal,
    cand: &StateClass,
    protein_blocks: &[Range],
    params: &DecoderParams,
) -> Result<()> {
    let p = signal.pos;
    let family = lattice
        .family_id(cand)
        .expect("candidate classes come from the fixed enumeration");
    let max_len = model.max_len(cand.kind);

    let mut best = BAD_SCORE;
    let mut best_ref = StateRef::Root;
    // per-strand bests feed the intergenic log-sum merge
    let mut strand_best = [BAD_SCORE; 2];
    let mut strand_ref = [StateRef::Root; 2];

    for pred in pred_classes(cand) {
        let Some(pf) = lattice.family_id(&pred) else {
            continue;
        };
        for (k, st) in lattice.states(pf).iter().enumerate().rev() {
            if st.stop >= p {
                continue;
            }
            let len = p - st.stop;
            if len > max_len {
                break;
            }
            if best > BAD_SCORE && st.stop + params.too_far < p {
                break;
            }
            if !span_ok(cand, &pred, len) {
                continue;
            }
            if is_bad_score(st.score) {
                continue;
            }

            let branch = model.branch_score(pred.kind, cand.kind);
            let length = model.length_score(cand.kind, len);
            let region = model.region_score(cand.kind, cand.strand, Range::new(st.stop, p));
            let mut total = st.score + branch + length + region + signal.score;
            if pred.protein.disagrees_with(&cand.protein) {
                let extra = count_blocks_within(protein_blocks, st.stop, p).saturating_sub(1);
                total -= model.multi_protein_penalty() * extra as f64;
            }
            if is_bad_score(total) {
                continue;
            }

            let node = StateRef::Node { family: pf, index: k };
            if cand.kind == StateKind::Intergenic {
                let slot = strand_slot(pred.strand);
                if total > strand_best[slot] {
                    strand_best[slot] = total;
                    strand_ref[slot] = node;
                }
            }
            if total > best {
                best = total;
                best_ref = node;
            }
        }
    }

    let (score, left) = if cand.kind == StateKind::Intergenic {
        // the sequence may open mid-intergenic
        let mut root_total = BAD_SCORE;
        if p > 0 && p <= max_len {
            let length = model.length_score(StateKind::Intergenic, p);
            let region =
                model.region_score(StateKind::Intergenic, cand.strand, Range::new(0, p));
            let total = length + region + signal.score;
            if !is_bad_score(total) {
                root_total = total;
            }
        }
        let merged = log_sum_exp(strand_best[0], strand_best[1]);
        if root_total > merged {
            (root_total, StateRef::Root)
        } else if merged > BAD_SCORE {
            let slot = if strand_best[0] >= strand_best[1] { 0 } else { 1 };
            (merged, strand_ref[slot])
        } else {
            (BAD_SCORE, StateRef::Root)
        }
    } else {
        (best, best_ref)
    };

    if is_bad_score(score) {
        return Ok(());
    }
    lattice.push(
        family,
        LatticeState {
            stop: p,
            score,
            left,
        },
    )
}

// ---------------------------------------------------------------------------
// Termination and backtrace
// ---------------------------------------------------------------------------

/// A state allowed to stay open at the sequence end: intergenic, or the
/// final state of a complete gene.
fn is_gene_end(class: &StateClass) -> bool {
    matches!(
        (class.kind, class.strand),
        (StateKind::LastExon, Strand::Forward)
            | (StateKind::SingleExon, _)
            | (StateKind::FirstExon, Strand::Reverse)
    )
}

fn select_terminal(
    lattice: &Lattice,
    model: &ScoreModel,
    params: &DecoderParams,
) -> Option<(usize, usize)> {
    let seq_len = model.seq_len();
    let mut best = BAD_SCORE;
    let mut best_at = None;

    for family in 0..lattice.n_families() {
        let class = lattice.class(family);
        let eligible = match params.right_anchor {
            Some(kind) => class.kind == kind,
            None => {
                params.allow_partial
                    || class.kind == StateKind::Intergenic
                    || is_gene_end(class)
            }
        };
        if !eligible {
            continue;
        }
        // gene-end and intergenic states ride an implicit intergenic tail;
        // partial states continue under their own track
        let tail_kind = if class.kind == StateKind::Intergenic || is_gene_end(class) {
            StateKind::Intergenic
        } else {
            class.kind
        };
        for (index, st) in lattice.states(family).iter().enumerate() {
            let tail = Range::new(st.stop, seq_len);
            let tail_score = if tail.is_empty() {
                0.0
            } else {
                model.region_score(tail_kind, class.strand, tail)
            };
            let total = st.score + tail_score;
            if is_bad_score(total) {
                continue;
            }
            if total > best {
                best = total;
                best_at = Some((family, index));
            }
        }
    }
    best_at
}

struct ChainLink {
    class: StateClass,
    span: Range,
    score: f64,
    /// Cumulative score before this state (its predecessor's score).
    prior: f64,
}

fn backtrace(
    lattice: &Lattice,
    terminal: (usize, usize),
    supports: &[Support],
    coord_map: Option<&CoordMap>,
) -> Result<Vec<GeneModel>> {
    let mut links: Vec<ChainLink> = Vec::new();
    let mut cur = StateRef::Node {
        family: terminal.0,
        index: terminal.1,
    };
    while let StateRef::Node { family, index } = cur {
        let class = *lattice.class(family);
        let st = &lattice.states(family)[index];
        let (start, prior) = match lattice.resolve(st.left) {
            Some((_, pred)) => (pred.stop, pred.score),
            None => (0, 0.0),
        };
        links.push(ChainLink {
            class,
            span: Range::new(start, st.stop),
            score: st.score,
            prior,
        });
        cur = st.left;
    }
    links.reverse();

    let exon_states = links.iter().filter(|l| l.class.kind.is_exon()).count();

    let mut genes = Vec::new();
    let mut run: Vec<&ChainLink> = Vec::new();
    for link in &links {
        if link.class.kind.is_genic() {
            run.push(link);
        } else {
            flush_gene(&mut genes, &run, supports, coord_map);
            run.clear();
        }
    }
    flush_gene(&mut genes, &run, supports, coord_map);

    if exon_states > 0 && genes.is_empty() {
        return Err(PhysaliaError::Invariant(
            "terminal backtrace reached exon states but reconstructed no gene group".into(),
        ));
    }
    Ok(genes)
}

fn flush_gene(
    genes: &mut Vec<GeneModel>,
    run: &[&ChainLink],
    supports: &[Support],
    coord_map: Option<&CoordMap>,
) {
    let exon_links: Vec<&&ChainLink> = run.iter().filter(|l| l.class.kind.is_exon()).collect();
    if exon_links.is_empty() {
        return;
    }
    let strand = exon_links[0].class.strand;
    debug_assert!(
        run.iter().all(|l| l.class.strand == strand),
        "mixed strands within one gene run"
    );

    let first = exon_links[0];
    let last = exon_links[exon_links.len() - 1];

    // reading frame at the leftmost exon's start
    let frame = (first.class.phase as i64 - first.span.len() as i64).rem_euclid(3) as u8;

    let (start_exon, stop_exon) = match strand {
        Strand::Forward => (first, last),
        Strand::Reverse => (last, first),
    };
    let start_codon = match (start_exon.class.kind, strand) {
        (StateKind::FirstExon | StateKind::SingleExon, Strand::Forward) => Some(Range::new(
            start_exon.span.start,
            start_exon.span.start + 3,
        )),
        (StateKind::FirstExon | StateKind::SingleExon, Strand::Reverse) => {
            Some(Range::new(start_exon.span.end - 3, start_exon.span.end))
        }
        _ => None,
    };
    let stop_codon = match (stop_exon.class.kind, strand) {
        (StateKind::LastExon | StateKind::SingleExon, Strand::Forward) => {
            Some(Range::new(stop_exon.span.end - 3, stop_exon.span.end))
        }
        (StateKind::LastExon | StateKind::SingleExon, Strand::Reverse) => Some(Range::new(
            stop_exon.span.start,
            stop_exon.span.start + 3,
        )),
        _ => None,
    };

    let exons: Vec<Range> = exon_links.iter().map(|l| l.span).collect();
    let score = run[run.len() - 1].score - run[0].prior;

    let mut support: Vec<usize> = supports
        .iter()
        .filter(|s| {
            exons.iter().any(|e| e.intersects(&s.range))
                && s.frame.map_or(true, |f| f == frame)
        })
        .map(|s| s.id)
        .collect();
    support.sort_unstable();
    support.dedup();

    let map = |r: Range| coord_map.map_or(r, |m| m.map_range(r));
    genes.push(GeneModel {
        strand,
        exons: exons.into_iter().map(map).collect(),
        frame,
        start_codon: start_codon.map(map),
        stop_codon: stop_codon.map(map),
        score,
        support,
    });
}
