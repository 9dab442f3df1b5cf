//! Reconciliation of coarse hits against reference block boundaries.
//!
//! Given a hit list and a side-table of reference blocks (e.g. conserved-
//! domain boundaries), this module refines each hit into per-block sub-hits:
//! it realigns the hit's query against each intersecting block with the
//! global aligner, trims unreliable edges, resolves query-axis conflicts
//! between neighbouring sub-hits, aggregates the survivors into a composite
//! parent transcript, and projects reference residue frequencies onto the
//! query profiles.
//!
//! The filters here (coverage threshold, fudge extension bound, minimum
//! sub-range length) fire routinely on noisy data and are deliberately
//! silent: a rejected hit or block is dropped, not reported.

use std::io::BufRead;

use physalia_core::{PhysaliaError, Range, Result};

use crate::global::{global_align, GlobalAlignParams};
use crate::hit::Hit;
use crate::scoring::{FreqMatrix, Pssm, ScoringMatrix, SeqSource};
use crate::transcript::{Transcript, TranscriptOp};

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// One reference block: a sub-interval of a reference profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    pub ref_idx: usize,
    pub range: Range,
}

/// Parse a block-boundary table: one `ref_idx start end` triple per line.
///
/// Blank lines and `#` comments are skipped. Entries for the same reference
/// must be contiguous and sorted by start offset — check with
/// [`blocks_are_sorted`]; handing unsorted input to [`realign_blocks`]
/// produces undefined block assignment.
///
/// # Errors
///
/// Returns [`PhysaliaError::Parse`] on malformed lines or inverted ranges.
pub fn load_block_boundaries<R: BufRead>(reader: R) -> Result<Vec<Block>> {
    let mut blocks = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let parse_field = |field: Option<&str>, name: &str| -> Result<usize> {
            field
                .ok_or_else(|| {
                    PhysaliaError::Parse(format!("line {}: missing {name}", lineno + 1))
                })?
                .parse::<usize>()
                .map_err(|e| PhysaliaError::Parse(format!("line {}: bad {name}: {e}", lineno + 1)))
        };
        let ref_idx = parse_field(fields.next(), "reference index")?;
        let start = parse_field(fields.next(), "start offset")?;
        let end = parse_field(fields.next(), "end offset")?;
        if end <= start {
            return Err(PhysaliaError::Parse(format!(
                "line {}: block end {end} not past start {start}",
                lineno + 1
            )));
        }
        blocks.push(Block {
            ref_idx,
            range: Range::new(start, end),
        });
    }
    Ok(blocks)
}

/// The comparator callers use to check the [`realign_blocks`] ordering
/// precondition: sorted by `(ref_idx, start)`.
pub fn blocks_are_sorted(blocks: &[Block]) -> bool {
    blocks
        .windows(2)
        .all(|w| (w[0].ref_idx, w[0].range.start) <= (w[1].ref_idx, w[1].range.start))
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Tuning for the block-realignment pass.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RealignParams {
    /// A hit covering less than this fraction of both the query and the
    /// reference is discarded (default: 0.6).
    pub min_coverage: f64,
    /// Symmetric extension of each block sub-range toward its neighbours,
    /// in positions (default: 6).
    pub fudge: usize,
    /// Sub-ranges collapsing to this length or shorter are dropped
    /// (default: 2).
    pub min_len: usize,
    /// Gap opening cost for realignment and re-scoring (default: 11).
    pub gap_open: i32,
    /// Gap extension cost for realignment and re-scoring (default: 1).
    pub gap_extend: i32,
}

impl Default for RealignParams {
    fn default() -> Self {
        Self {
            min_coverage: 0.6,
            fudge: 6,
            min_len: 2,
            gap_open: 11,
            gap_extend: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Transcript helpers
// ---------------------------------------------------------------------------

/// A transcript bracketed by opposite-direction gap runs (insert...delete or
/// delete...insert) signals an unreliable realignment.
fn is_degenerate(t: &Transcript) -> bool {
    matches!(
        (t.leading_gap_kind(), t.trailing_gap_kind()),
        (Some(TranscriptOp::Insert), Some(TranscriptOp::Delete))
            | (Some(TranscriptOp::Delete), Some(TranscriptOp::Insert))
    )
}

/// The operation span of `t` covering seq1 offsets `rel` (relative to the
/// transcript's own start), plus the relative seq2 offsets it consumes.
///
/// Gap columns at the span boundaries that consume no seq1 are excluded.
fn ops_covering_seq1(t: &Transcript, rel: Range) -> (core::ops::Range<usize>, Range) {
    let ops = t.ops();
    let mut c1 = 0usize;
    let mut c2 = 0usize;
    let mut op_lo = ops.len();
    let mut op_hi = ops.len();
    let mut s2_lo = 0usize;
    let mut s2_hi = 0usize;
    let mut started = false;
    let mut done = false;

    for (k, op) in ops.iter().enumerate() {
        if !started && op.consumes_seq1() && c1 >= rel.start {
            started = true;
            op_lo = k;
            s2_lo = c2;
        }
        if started && !done && c1 >= rel.end {
            done = true;
            op_hi = k;
            s2_hi = c2;
        }
        if op.consumes_seq1() {
            c1 += 1;
        }
        if op.consumes_seq2() {
            c2 += 1;
        }
    }
    if started && !done {
        op_hi = ops.len();
        s2_hi = c2;
    }
    if !started {
        op_lo = ops.len();
        op_hi = ops.len();
        s2_lo = c2;
        s2_hi = c2;
    }
    (op_lo..op_hi, Range::new(s2_lo, s2_hi))
}

/// The shortest op prefix of `t` consuming exactly `target` seq2 positions.
///
/// Gap columns sitting right at the boundary stay out of the prefix.
fn ops_prefix_for_seq2(t: &Transcript, target: usize) -> usize {
    let mut c2 = 0usize;
    for (k, op) in t.ops().iter().enumerate() {
        if c2 >= target {
            return k;
        }
        if op.consumes_seq2() {
            c2 += 1;
        }
    }
    t.len()
}

/// Strip leading/trailing gap runs from `t`, returning the trimmed
/// transcript and the `(seq1, seq2)` positions consumed by the dropped
/// prefix and suffix.
fn trim_gap_edges(t: &Transcript) -> Option<(Transcript, (usize, usize), (usize, usize))> {
    let first = t.first_aligned_op()?;
    let last = t.last_aligned_op()?;
    let prefix = t.slice(0..first);
    let suffix = t.slice(last + 1..t.len());
    Some((
        t.slice(first..last + 1),
        (prefix.seq1_len(), prefix.seq2_len()),
        (suffix.seq1_len(), suffix.seq2_len()),
    ))
}

// ---------------------------------------------------------------------------
// Block realignment
// ---------------------------------------------------------------------------

/// Refine every hit into per-block sub-hits.
///
/// `blocks` must be sorted by `(ref_idx, start)` (see [`blocks_are_sorted`]).
/// `queries` and `profiles` are indexed by the hits' `query_idx`/`ref_idx`.
/// Hits that fail the coverage filter or end up with no sub-hits are removed
/// from the list.
///
/// # Errors
///
/// Returns [`PhysaliaError::InvalidInput`] when a hit references a missing
/// query or profile, and propagates aligner failures.
pub fn realign_blocks(
    hits: &mut Vec<Hit>,
    blocks: &[Block],
    queries: &[Vec<u8>],
    profiles: &[Pssm],
    matrix: &ScoringMatrix,
    params: &RealignParams,
) -> Result<()> {
    for hit in hits.iter_mut() {
        hit.sub_hits.clear();

        let query = queries.get(hit.query_idx).ok_or_else(|| {
            PhysaliaError::InvalidInput(format!("hit references missing query {}", hit.query_idx))
        })?;
        let profile = profiles.get(hit.ref_idx).ok_or_else(|| {
            PhysaliaError::InvalidInput(format!("hit references missing profile {}", hit.ref_idx))
        })?;

        // Significance filter: a hit thinly covering both sequences is noise.
        if hit.query_coverage(query.len()) < params.min_coverage
            && hit.ref_coverage(profile.len()) < params.min_coverage
        {
            continue;
        }

        let lo = blocks.partition_point(|b| b.ref_idx < hit.ref_idx);
        let hi = blocks.partition_point(|b| b.ref_idx <= hit.ref_idx);
        let ref_blocks = &blocks[lo..hi];

        // lower_bound on start, stepping back once for a block straddling
        // the hit's left edge
        let mut idx = ref_blocks.partition_point(|b| b.range.start < hit.ref_range.start);
        if idx > 0 && ref_blocks[idx - 1].range.end > hit.ref_range.start {
            idx -= 1;
        }

        let mut sub_hits = Vec::new();
        while idx < ref_blocks.len() && ref_blocks[idx].range.start < hit.ref_range.end {
            let block = &ref_blocks[idx];
            idx += 1;

            let ref_sub = block.range.intersection(&hit.ref_range);
            if ref_sub.is_empty() {
                continue;
            }
            let query_sub =
                hit.transcript
                    .project_to_seq2(ref_sub, hit.ref_range.start, hit.query_range.start);

            let ref_f = ref_sub.expanded(params.fudge, params.fudge, &hit.ref_range);
            let query_f = query_sub.expanded(params.fudge, params.fudge, &hit.query_range);
            if ref_f.len() <= params.min_len || query_f.len() <= params.min_len {
                continue;
            }

            let narrowed = profile.slice(ref_f);
            let nw = GlobalAlignParams::uniform(params.gap_open, params.gap_extend);
            let aligned = global_align(
                &SeqSource::Profile(&narrowed),
                &query[query_f.start..query_f.end],
                matrix,
                &nw,
            )?;

            let sub = if is_degenerate(&aligned.transcript) {
                // Unreliable realignment: keep the original block transcript,
                // re-scored directly.
                rebuild_from_parent(hit, ref_sub, profile, query, matrix, params)
            } else {
                finish_sub_hit(
                    hit,
                    aligned.transcript,
                    ref_f,
                    query_f,
                    profile,
                    query,
                    matrix,
                    params,
                )
            };
            if let Some(sub) = sub {
                sub_hits.push(sub);
            }
        }
        hit.sub_hits = sub_hits;
    }

    purge_unwanted_hits(hits);
    Ok(())
}

/// Trim a freshly realigned transcript and build the sub-hit, or `None`
/// when it collapses below the minimum length.
#[allow(clippy::too_many_arguments)]
fn finish_sub_hit(
    hit: &Hit,
    transcript: Transcript,
    ref_f: Range,
    query_f: Range,
    profile: &Pssm,
    query: &[u8],
    matrix: &ScoringMatrix,
    params: &RealignParams,
) -> Option<Hit> {
    let (trimmed, (d1, d2), (e1, e2)) = trim_gap_edges(&transcript)?;
    let sub_ref = Range::new(ref_f.start + d1, ref_f.end - e1);
    let sub_query = Range::new(query_f.start + d2, query_f.end - e2);
    if sub_ref.len() <= params.min_len || sub_query.len() <= params.min_len {
        return None;
    }
    let score = trimmed.score(
        0..trimmed.len(),
        &SeqSource::Profile(profile),
        query,
        sub_ref.start,
        sub_query.start,
        matrix,
        params.gap_open,
        params.gap_extend,
    );
    Some(Hit::new(
        hit.query_idx,
        hit.ref_idx,
        sub_query,
        sub_ref,
        score,
        trimmed,
    ))
}

/// Fall back to the parent transcript restricted to the block.
fn rebuild_from_parent(
    hit: &Hit,
    ref_sub: Range,
    profile: &Pssm,
    query: &[u8],
    matrix: &ScoringMatrix,
    params: &RealignParams,
) -> Option<Hit> {
    let rel = Range::new(
        ref_sub.start - hit.ref_range.start,
        ref_sub.end - hit.ref_range.start,
    );
    let (op_range, q_rel) = ops_covering_seq1(&hit.transcript, rel);
    let piece = hit.transcript.slice(op_range);
    let (trimmed, (d1, d2), (e1, e2)) = trim_gap_edges(&piece)?;
    let sub_ref = Range::new(ref_sub.start + d1, ref_sub.end - e1);
    let sub_query = Range::new(
        hit.query_range.start + q_rel.start + d2,
        hit.query_range.start + q_rel.end - e2,
    );
    if sub_ref.len() <= params.min_len || sub_query.len() <= params.min_len {
        return None;
    }
    let score = trimmed.score(
        0..trimmed.len(),
        &SeqSource::Profile(profile),
        query,
        sub_ref.start,
        sub_query.start,
        matrix,
        params.gap_open,
        params.gap_extend,
    );
    Some(Hit::new(
        hit.query_idx,
        hit.ref_idx,
        sub_query,
        sub_ref,
        score,
        trimmed,
    ))
}

/// Remove hits left with no sub-hits.
pub fn purge_unwanted_hits(hits: &mut Vec<Hit>) {
    hits.retain(|h| !h.sub_hits.is_empty());
}

// ---------------------------------------------------------------------------
// Conflict resolution
// ---------------------------------------------------------------------------

/// Resolve query-axis overlaps between sub-hits of one parent.
///
/// Overlapping neighbours are split at the query boundary maximising the sum
/// of their directly re-scored halves (first best wins on ties). Sub-hits
/// collapsing to an empty range on either axis are dropped. Afterwards no
/// two sub-hits overlap on the query axis.
pub fn resolve_sub_hit_conflicts(
    hit: &mut Hit,
    query: &[u8],
    profile: &Pssm,
    matrix: &ScoringMatrix,
    params: &RealignParams,
) {
    let mut subs = std::mem::take(&mut hit.sub_hits);
    subs.sort_by_key(|s| (s.query_range.start, s.ref_range.start));

    let mut resolved: Vec<Hit> = Vec::with_capacity(subs.len());
    for next in subs {
        let Some(prev) = resolved.last() else {
            resolved.push(next);
            continue;
        };
        if prev.query_range.end <= next.query_range.start {
            resolved.push(next);
            continue;
        }
        let prev = resolved.pop().expect("just observed");
        let (left, right) = split_at_best_boundary(prev, next, query, profile, matrix, params);
        if let Some(left) = left {
            resolved.push(left);
        }
        if let Some(right) = right {
            resolved.push(right);
        }
    }
    hit.sub_hits = resolved;
}

/// Split two query-overlapping sub-hits at the best-scoring boundary.
fn split_at_best_boundary(
    left: Hit,
    right: Hit,
    query: &[u8],
    profile: &Pssm,
    matrix: &ScoringMatrix,
    params: &RealignParams,
) -> (Option<Hit>, Option<Hit>) {
    let lo = right.query_range.start;
    let hi = left.query_range.end.min(right.query_range.end);

    let mut best_total = i32::MIN;
    let mut best = None;
    for x in lo..=hi {
        let left_part = truncate_tail(&left, x, query, profile, matrix, params);
        let right_part = truncate_head(&right, x, query, profile, matrix, params);
        let total = left_part.as_ref().map_or(0, |h| h.score)
            + right_part.as_ref().map_or(0, |h| h.score);
        if total > best_total {
            best_total = total;
            best = Some((left_part, right_part));
        }
    }
    best.unwrap_or((None, None))
}

/// The part of `sub` whose query columns lie before `boundary`.
fn truncate_tail(
    sub: &Hit,
    boundary: usize,
    query: &[u8],
    profile: &Pssm,
    matrix: &ScoringMatrix,
    params: &RealignParams,
) -> Option<Hit> {
    let keep = boundary.saturating_sub(sub.query_range.start);
    let cut = ops_prefix_for_seq2(&sub.transcript, keep);
    let piece = sub.transcript.slice(0..cut);
    let (trimmed, (d1, d2), _) = trim_gap_edges(&piece)?;
    let q = Range::new(
        sub.query_range.start + d2,
        sub.query_range.start + d2 + trimmed.seq2_len(),
    );
    let r = Range::new(
        sub.ref_range.start + d1,
        sub.ref_range.start + d1 + trimmed.seq1_len(),
    );
    if q.is_empty() || r.is_empty() {
        return None;
    }
    let score = trimmed.score(
        0..trimmed.len(),
        &SeqSource::Profile(profile),
        query,
        r.start,
        q.start,
        matrix,
        params.gap_open,
        params.gap_extend,
    );
    Some(Hit::new(sub.query_idx, sub.ref_idx, q, r, score, trimmed))
}

/// The part of `sub` whose query columns lie at or after `boundary`.
fn truncate_head(
    sub: &Hit,
    boundary: usize,
    query: &[u8],
    profile: &Pssm,
    matrix: &ScoringMatrix,
    params: &RealignParams,
) -> Option<Hit> {
    let drop = boundary.saturating_sub(sub.query_range.start);
    let cut = ops_prefix_for_seq2(&sub.transcript, drop);
    let dropped = sub.transcript.slice(0..cut);
    let piece = sub.transcript.slice(cut..sub.transcript.len());
    let (trimmed, (d1, d2), _) = trim_gap_edges(&piece)?;
    let q_start = sub.query_range.start + dropped.seq2_len() + d2;
    let r_start = sub.ref_range.start + dropped.seq1_len() + d1;
    let q = Range::new(q_start, q_start + trimmed.seq2_len());
    let r = Range::new(r_start, r_start + trimmed.seq1_len());
    if q.is_empty() || r.is_empty() {
        return None;
    }
    let score = trimmed.score(
        0..trimmed.len(),
        &SeqSource::Profile(profile),
        query,
        r.start,
        q.start,
        matrix,
        params.gap_open,
        params.gap_extend,
    );
    Some(Hit::new(sub.query_idx, sub.ref_idx, q, r, score, trimmed))
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Concatenate validated, non-conflicting sub-hits into the parent's
/// composite transcript, bridging unaligned interiors with gap runs.
///
/// The parent's ranges span the first to the last sub-hit and its score is
/// the sum of sub-hit scores (bridging gaps are bookkeeping, not charged);
/// the sub-hits stay attached as the authoritative per-block transcripts.
///
/// # Errors
///
/// Returns [`PhysaliaError::InvalidInput`] if sub-hits still overlap or run
/// backwards on either axis — conflicts must be resolved first.
pub fn add_up_sub_hits(hit: &mut Hit) -> Result<()> {
    if hit.sub_hits.is_empty() {
        return Ok(());
    }
    let mut subs: Vec<&Hit> = hit.sub_hits.iter().collect();
    subs.sort_by_key(|s| (s.query_range.start, s.ref_range.start));

    let mut transcript = Transcript::new();
    let mut score = 0i32;
    for (k, sub) in subs.iter().enumerate() {
        if k > 0 {
            let prev = subs[k - 1];
            if sub.query_range.start < prev.query_range.end
                || sub.ref_range.start < prev.ref_range.end
            {
                return Err(PhysaliaError::InvalidInput(
                    "sub-hits overlap; resolve conflicts before adding up".into(),
                ));
            }
            let ref_gap = sub.ref_range.start - prev.ref_range.end;
            let query_gap = sub.query_range.start - prev.query_range.end;
            transcript.extend_with(TranscriptOp::Delete, ref_gap);
            transcript.extend_with(TranscriptOp::Insert, query_gap);
        }
        transcript.append(&sub.transcript);
        score += sub.score;
    }

    hit.query_range = Range::new(
        subs[0].query_range.start,
        subs.last().expect("non-empty").query_range.end,
    );
    hit.ref_range = Range::new(
        subs[0].ref_range.start,
        subs.last().expect("non-empty").ref_range.end,
    );
    hit.transcript = transcript;
    hit.score = score;
    Ok(())
}

// ---------------------------------------------------------------------------
// Residue frequencies
// ---------------------------------------------------------------------------

/// Blend reference residue frequencies into the query profiles along the
/// match runs of each accepted hit.
///
/// Hits are processed in descending score order (ties by list position); a
/// hit whose query range intersects an already-accepted higher scorer on
/// the same query is skipped. `boost` weights the query's own observed
/// residue in each blended column.
///
/// # Errors
///
/// Returns [`PhysaliaError::InvalidInput`] when `boost` is outside `[0, 1]`
/// or a hit references a missing query/profile/frequency matrix.
pub fn assign_residue_frequencies(
    hits: &[Hit],
    queries: &[Vec<u8>],
    ref_freqs: &[FreqMatrix],
    query_freqs: &mut [FreqMatrix],
    boost: f64,
) -> Result<()> {
    if !(0.0..=1.0).contains(&boost) {
        return Err(PhysaliaError::InvalidInput(format!(
            "frequency boost {boost} outside [0, 1]"
        )));
    }

    let mut order: Vec<usize> = (0..hits.len()).collect();
    order.sort_by_key(|&k| (std::cmp::Reverse(hits[k].score), k));

    let mut accepted: Vec<(usize, Range)> = Vec::new();
    for k in order {
        let hit = &hits[k];
        if accepted
            .iter()
            .any(|(q, r)| *q == hit.query_idx && r.intersects(&hit.query_range))
        {
            continue;
        }
        accepted.push((hit.query_idx, hit.query_range));

        let query = queries.get(hit.query_idx).ok_or_else(|| {
            PhysaliaError::InvalidInput(format!("hit references missing query {}", hit.query_idx))
        })?;
        let source = ref_freqs.get(hit.ref_idx).ok_or_else(|| {
            PhysaliaError::InvalidInput(format!(
                "hit references missing frequency matrix {}",
                hit.ref_idx
            ))
        })?;
        let target = query_freqs.get_mut(hit.query_idx).ok_or_else(|| {
            PhysaliaError::InvalidInput(format!(
                "missing query frequency matrix {}",
                hit.query_idx
            ))
        })?;

        let segments: Vec<&Hit> = if hit.sub_hits.is_empty() {
            vec![hit]
        } else {
            hit.sub_hits.iter().collect()
        };
        for seg in segments {
            for region in seg
                .transcript
                .match_regions(seg.ref_range.start, seg.query_range.start)
            {
                for offset in 0..region.seq1.len() {
                    let rpos = region.seq1.start + offset;
                    let qpos = region.seq2.start + offset;
                    target.blend_column(qpos, source.column(rpos), boost, query[qpos]);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::residue_index;
    use std::io::Cursor;

    fn matrix() -> ScoringMatrix {
        ScoringMatrix::new(2, -1).unwrap()
    }

    fn params_no_fudge() -> RealignParams {
        RealignParams {
            fudge: 0,
            gap_open: 5,
            gap_extend: 1,
            ..RealignParams::default()
        }
    }

    fn t(text: &str) -> Transcript {
        Transcript::decode(text).unwrap()
    }

    // --- Block table parsing ---

    #[test]
    fn parse_block_table() {
        let input = "0 0 6\n0 6 12\n# comment line\n\n1 0 5\n";
        let blocks = load_block_boundaries(Cursor::new(input)).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].range, Range::new(6, 12));
        assert_eq!(blocks[2].ref_idx, 1);
        assert!(blocks_are_sorted(&blocks));
    }

    #[test]
    fn parse_rejects_malformed_lines() {
        assert!(load_block_boundaries(Cursor::new("0 6 6\n")).is_err());
        assert!(load_block_boundaries(Cursor::new("0 x 6\n")).is_err());
        assert!(load_block_boundaries(Cursor::new("0 6\n")).is_err());
    }

    #[test]
    fn sorted_comparator() {
        let sorted = vec![
            Block { ref_idx: 0, range: Range::new(0, 4) },
            Block { ref_idx: 0, range: Range::new(4, 8) },
            Block { ref_idx: 1, range: Range::new(0, 4) },
        ];
        assert!(blocks_are_sorted(&sorted));
        let unsorted = vec![
            Block { ref_idx: 0, range: Range::new(4, 8) },
            Block { ref_idx: 0, range: Range::new(0, 4) },
        ];
        assert!(!blocks_are_sorted(&unsorted));
    }

    // --- Realignment ---

    #[test]
    fn realign_splits_hit_at_block_boundaries() {
        let m = matrix();
        let queries = vec![b"ACGTACGTACGT".to_vec()];
        let profiles = vec![Pssm::from_sequence(b"ACGTACGTACGT", &m).unwrap()];
        let blocks = vec![
            Block { ref_idx: 0, range: Range::new(0, 6) },
            Block { ref_idx: 0, range: Range::new(6, 12) },
        ];
        let mut hits = vec![Hit::new(
            0,
            0,
            Range::new(0, 12),
            Range::new(0, 12),
            24,
            t("12M"),
        )];

        realign_blocks(&mut hits, &blocks, &queries, &profiles, &m, &params_no_fudge()).unwrap();

        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.sub_hits.len(), 2);
        assert_eq!(hit.sub_hits[0].ref_range, Range::new(0, 6));
        assert_eq!(hit.sub_hits[0].query_range, Range::new(0, 6));
        assert_eq!(hit.sub_hits[0].transcript.encode(), "6M");
        assert_eq!(hit.sub_hits[0].score, 12);
        assert_eq!(hit.sub_hits[1].ref_range, Range::new(6, 12));
        assert!(hit.sub_hits.iter().all(|s| s.is_consistent()));
    }

    #[test]
    fn low_coverage_hit_is_dropped() {
        let m = matrix();
        let queries = vec![b"ACGTACGTACGT".to_vec()];
        let profiles = vec![Pssm::from_sequence(b"ACGTACGTACGT", &m).unwrap()];
        let blocks = vec![Block { ref_idx: 0, range: Range::new(0, 12) }];
        // covers only 3 of 12 positions on both axes
        let mut hits = vec![Hit::new(
            0,
            0,
            Range::new(0, 3),
            Range::new(0, 3),
            6,
            t("3M"),
        )];
        realign_blocks(&mut hits, &blocks, &queries, &profiles, &m, &params_no_fudge()).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn missing_profile_is_an_error() {
        let m = matrix();
        let queries = vec![b"ACGT".to_vec()];
        let profiles: Vec<Pssm> = Vec::new();
        let mut hits = vec![Hit::new(0, 0, Range::new(0, 4), Range::new(0, 4), 8, t("4M"))];
        let err = realign_blocks(&mut hits, &[], &queries, &profiles, &m, &params_no_fudge());
        assert!(err.is_err());
    }

    #[test]
    fn fudged_sub_hits_overlap_then_resolve_cleanly() {
        let m = matrix();
        let query = b"ACGTACGTACGT".to_vec();
        let profile = Pssm::from_sequence(b"ACGTACGTACGT", &m).unwrap();
        let queries = vec![query.clone()];
        let profiles = vec![profile];
        let blocks = vec![
            Block { ref_idx: 0, range: Range::new(0, 6) },
            Block { ref_idx: 0, range: Range::new(6, 12) },
        ];
        let params = RealignParams {
            fudge: 2,
            gap_open: 5,
            gap_extend: 1,
            ..RealignParams::default()
        };
        let mut hits = vec![Hit::new(
            0,
            0,
            Range::new(0, 12),
            Range::new(0, 12),
            24,
            t("12M"),
        )];
        realign_blocks(&mut hits, &blocks, &queries, &profiles, &m, &params).unwrap();

        let hit = &mut hits[0];
        assert_eq!(hit.sub_hits.len(), 2);
        assert!(
            hit.sub_hits[0].query_range.intersects(&hit.sub_hits[1].query_range),
            "fudge extension should make neighbouring sub-hits overlap"
        );

        resolve_sub_hit_conflicts(hit, &queries[0], &profiles[0], &m, &params);
        for pair in hit.sub_hits.windows(2) {
            assert!(
                !pair[0].query_range.intersects(&pair[1].query_range),
                "query overlap must be gone after conflict resolution"
            );
        }

        add_up_sub_hits(hit).unwrap();
        assert_eq!(hit.transcript.encode(), "12M");
        assert_eq!(hit.score, 24);
        assert!(hit.is_consistent());
    }

    // --- Degenerate transcript handling ---

    #[test]
    fn degenerate_bracket_detection() {
        assert!(is_degenerate(&t("2I3M2D")));
        assert!(is_degenerate(&t("2D3M2I")));
        assert!(!is_degenerate(&t("2I3M2I")));
        assert!(!is_degenerate(&t("2I3M")));
        assert!(!is_degenerate(&t("3M")));
        assert!(!is_degenerate(&t("")));
    }

    #[test]
    fn ops_covering_seq1_spans() {
        // seq1 consumption: M M D D M, seq2: M M . . M
        let tr = t("2M2D1M");
        let (ops, q) = ops_covering_seq1(&tr, Range::new(2, 4));
        assert_eq!(ops, 2..4);
        assert_eq!(q, Range::new(2, 2));
        let (ops, q) = ops_covering_seq1(&tr, Range::new(0, 5));
        assert_eq!(ops, 0..5);
        assert_eq!(q, Range::new(0, 3));
    }

    // --- Aggregation ---

    #[test]
    fn add_up_bridges_unaligned_interiors() {
        let mut hit = Hit::new(0, 0, Range::new(0, 1), Range::new(0, 1), 0, t("1M"));
        hit.sub_hits = vec![
            Hit::new(0, 0, Range::new(0, 4), Range::new(0, 4), 8, t("4M")),
            Hit::new(0, 0, Range::new(6, 10), Range::new(8, 12), 8, t("4M")),
        ];
        add_up_sub_hits(&mut hit).unwrap();
        assert_eq!(hit.transcript.encode(), "4M4D2I4M");
        assert_eq!(hit.query_range, Range::new(0, 10));
        assert_eq!(hit.ref_range, Range::new(0, 12));
        assert_eq!(hit.score, 16);
        assert!(hit.is_consistent());
    }

    #[test]
    fn add_up_rejects_unresolved_overlap() {
        let mut hit = Hit::new(0, 0, Range::new(0, 1), Range::new(0, 1), 0, t("1M"));
        hit.sub_hits = vec![
            Hit::new(0, 0, Range::new(0, 4), Range::new(0, 4), 8, t("4M")),
            Hit::new(0, 0, Range::new(3, 7), Range::new(4, 8), 8, t("4M")),
        ];
        assert!(add_up_sub_hits(&mut hit).is_err());
    }

    // --- Residue frequencies ---

    #[test]
    fn frequencies_blend_along_match_runs() {
        let queries = vec![b"AAAA".to_vec()];
        let ref_freqs = vec![FreqMatrix::from_sequence(b"CCCC").unwrap()];
        let mut query_freqs = vec![FreqMatrix::from_sequence(b"AAAA").unwrap()];
        let hits = vec![Hit::new(0, 0, Range::new(0, 4), Range::new(0, 4), 8, t("4M"))];

        assign_residue_frequencies(&hits, &queries, &ref_freqs, &mut query_freqs, 0.25).unwrap();

        let col = query_freqs[0].column(0);
        assert!((col[residue_index(b'C').unwrap()] - 0.75).abs() < 1e-12);
        assert!((col[residue_index(b'A').unwrap()] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn conflicting_lower_scorer_is_skipped() {
        let queries = vec![b"AAAA".to_vec()];
        let ref_freqs = vec![
            FreqMatrix::from_sequence(b"CCCC").unwrap(),
            FreqMatrix::from_sequence(b"GGGG").unwrap(),
        ];
        let mut query_freqs = vec![FreqMatrix::from_sequence(b"AAAA").unwrap()];
        // lower scorer listed first; ordering is by descending score
        let hits = vec![
            Hit::new(0, 1, Range::new(2, 4), Range::new(0, 2), 1, t("2M")),
            Hit::new(0, 0, Range::new(0, 4), Range::new(0, 4), 8, t("4M")),
        ];

        assign_residue_frequencies(&hits, &queries, &ref_freqs, &mut query_freqs, 0.25).unwrap();

        let col = query_freqs[0].column(2);
        assert!(
            (col[residue_index(b'C').unwrap()] - 0.75).abs() < 1e-12,
            "column 2 should come from the accepted higher scorer"
        );
        assert_eq!(col[residue_index(b'G').unwrap()], 0.0);
    }

    #[test]
    fn boost_outside_unit_interval_is_rejected() {
        let queries = vec![b"A".to_vec()];
        let ref_freqs = vec![FreqMatrix::from_sequence(b"A").unwrap()];
        let mut query_freqs = vec![FreqMatrix::from_sequence(b"A").unwrap()];
        let err = assign_residue_frequencies(&[], &queries, &ref_freqs, &mut query_freqs, 1.5);
        assert!(err.is_err());
    }
}
