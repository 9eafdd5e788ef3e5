//! Change log & output (C11): per-thread CSV row buffers, flushed in
//! rank/thread order through the `Transport::sequential` primitive, plus
//! the process-0-only summary CSV.

use crate::error::Result;
use crate::transport::LocalTransport;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ChangeRow {
    pub tick: u64,
    pub node_id: u64,
    pub exit_state: String,
    pub contact_node_id: Option<u64>,
    pub location_id: Option<u64>,
}

/// A single thread's buffer of state-change rows for the current tick,
/// swapped out fresh at the start of each tick (`CChanges::clear`).
#[derive(Debug, Default)]
pub struct ChangeLogBuffer {
    rows: Vec<ChangeRow>,
}

impl ChangeLogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, row: ChangeRow) {
        self.rows.push(row);
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn rows(&self) -> &[ChangeRow] {
        &self.rows
    }
}

/// Writes every thread's buffered rows to `path`, in rank-then-thread
/// order, using the transport's sequential primitive so concurrent
/// processes don't interleave writes to the same file.
pub fn flush_change_log(
    transport: &LocalTransport,
    buffers: &[ChangeLogBuffer],
    path: &Path,
    has_location: bool,
) -> Result<()> {
    transport.sequential(|| {
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path).expect("open output csv");
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(&mut file);
        for buffer in buffers {
            for row in buffer.rows() {
                if has_location {
                    let _ = writer.write_record([
                        row.tick.to_string(),
                        row.node_id.to_string(),
                        row.exit_state.clone(),
                        row.contact_node_id.map(|c| c.to_string()).unwrap_or_default(),
                        row.location_id.map(|l| l.to_string()).unwrap_or_default(),
                    ]);
                } else {
                    let _ = writer.write_record([
                        row.tick.to_string(),
                        row.node_id.to_string(),
                        row.exit_state.clone(),
                        row.contact_node_id.map(|c| c.to_string()).unwrap_or_default(),
                    ]);
                }
            }
        }
        let _ = writer.flush();
    });
    Ok(())
}

/// Summary row: `tick, <state>[current], <state>[in], <state>[out] ...,
/// <var>(g|l) ..., seed` (§6).
#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub tick: u64,
    pub state_counts: Vec<(i64, i64, i64)>,
    pub variables: Vec<(String, f64)>,
    pub seed: u64,
}

pub fn write_summary_header(path: &Path, state_ids: &[String], variable_ids: &[String]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    let mut header = vec!["tick".to_string()];
    for s in state_ids {
        header.push(format!("{s}[current]"));
        header.push(format!("{s}[in]"));
        header.push(format!("{s}[out]"));
    }
    header.extend(variable_ids.iter().cloned());
    header.push("seed".to_string());
    writer.write_record(&header)?;
    writer.flush()?;
    Ok(())
}

pub fn append_summary_row(path: &Path, row: &SummaryRow) -> Result<()> {
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(&mut file);
    let mut record = vec![row.tick.to_string()];
    for (current, inn, out) in &row.state_counts {
        record.push(current.to_string());
        record.push(inn.to_string());
        record.push(out.to_string());
    }
    for (_, v) in &row.variables {
        record.push(v.to_string());
    }
    record.push(row.seed.to_string());
    writer.write_record(&record)?;
    writer.flush()?;
    Ok(())
}
