//! Tabular formatting of gene models for downstream consumers.
//!
//! One tab-separated record per model:
//!
//! ```text
//! strand  exons  frame  start_codon  stop_codon  score  support
//! ```
//!
//! Exons are `start-end` pairs joined by commas; absent codon ranges and
//! empty support lists print as `.`.

use std::io::Write;

use physalia_core::{Range, Result};

use crate::gene::GeneModel;

/// Write one record per gene model.
///
/// # Errors
///
/// Propagates I/O failures from the writer.
pub fn write_gene_table<W: Write>(writer: &mut W, models: &[GeneModel]) -> Result<()> {
    for model in models {
        let exons = model
            .exons
            .iter()
            .map(range_field)
            .collect::<Vec<_>>()
            .join(",");
        let support = if model.support.is_empty() {
            ".".to_string()
        } else {
            model
                .support
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",")
        };
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{:.4}\t{}",
            model.strand,
            exons,
            model.frame,
            codon_field(&model.start_codon),
            codon_field(&model.stop_codon),
            model.score,
            support,
        )?;
    }
    Ok(())
}

fn range_field(range: &Range) -> String {
    format!("{}-{}", range.start, range.end)
}

fn codon_field(codon: &Option<Range>) -> String {
    match codon {
        Some(r) => range_field(r),
        None => ".".to_string(),
    }
}
