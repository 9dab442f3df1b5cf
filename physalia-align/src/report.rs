//! Tabular formatting of hits for downstream consumers.
//!
//! One record per aligned segment, tab-separated:
//!
//! ```text
//! query_idx  ref_idx  q_start  q_end  r_start  r_end  score  transcript
//! ```
//!
//! The transcript field is the run-length text form, the wire format
//! shared with any external formatter.

use std::io::Write;

use physalia_core::Result;

use crate::hit::Hit;

/// Write one record per aligned segment of each hit.
///
/// Hits with sub-hits emit one record per sub-hit (the authoritative
/// per-block alignments); leaf hits emit themselves.
///
/// # Errors
///
/// Propagates I/O failures from the writer.
pub fn write_hit_table<W: Write>(writer: &mut W, hits: &[Hit]) -> Result<()> {
    for hit in hits {
        if hit.sub_hits.is_empty() {
            write_segment(writer, hit)?;
        } else {
            for sub in &hit.sub_hits {
                write_segment(writer, sub)?;
            }
        }
    }
    Ok(())
}

fn write_segment<W: Write>(writer: &mut W, hit: &Hit) -> Result<()> {
    writeln!(
        writer,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        hit.query_idx,
        hit.ref_idx,
        hit.query_range.start,
        hit.query_range.end,
        hit.ref_range.start,
        hit.ref_range.end,
        hit.score,
        hit.transcript.encode(),
    )?;
    Ok(())
}
