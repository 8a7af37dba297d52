//! Per-opcode and per-line cost accounting.

use std::collections::HashMap;
use std::fmt::Write as _;

use neodbg_vm::OpCode;

/// Count and cumulative cost for one opcode.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpcodeStats {
    pub count: u64,
    pub total_cost: f64,
}

/// Hit count and cumulative cost for one source line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineStats {
    pub hits: u64,
    pub cost: f64,
}

/// Tallies executed opcodes and attributes their cost to source lines.
///
/// Line attribution uses whatever line was most recently resolved by the
/// façade, so instructions between two mapped offsets bill to the line
/// being stepped through. Storage write costs arrive under the synthetic
/// `STORAGE` opcode, keeping them separate from plain syscall overhead in
/// the dump.
#[derive(Debug, Default)]
pub struct Profiler {
    opcode_stats: HashMap<OpCode, OpcodeStats>,
    line_stats: HashMap<u32, LineStats>,
    current_line: Option<u32>,
    source_lines: Vec<String>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source text used by [`dump_csv`].
    ///
    /// [`dump_csv`]: Profiler::dump_csv
    pub fn set_source(&mut self, source: &str) {
        self.source_lines = source.lines().map(str::to_string).collect();
    }

    /// Updates the line subsequent costs attribute to.
    pub fn set_current_line(&mut self, line: Option<u32>) {
        self.current_line = line;
    }

    /// Records one executed opcode and its cost.
    pub fn record(&mut self, opcode: OpCode, cost: f64) {
        let stats = self.opcode_stats.entry(opcode).or_default();
        stats.count += 1;
        stats.total_cost += cost;

        if let Some(line) = self.current_line {
            let stats = self.line_stats.entry(line).or_default();
            stats.hits += 1;
            stats.cost += cost;
        }
    }

    /// Clears the tallies; the source text survives a reset.
    pub fn reset(&mut self) {
        self.opcode_stats.clear();
        self.line_stats.clear();
        self.current_line = None;
    }

    pub fn opcode_stats(&self) -> &HashMap<OpCode, OpcodeStats> {
        &self.opcode_stats
    }

    pub fn line_stats(&self) -> &HashMap<u32, LineStats> {
        &self.line_stats
    }

    /// One CSV row per source line with its hit count and cumulative gas.
    pub fn dump_csv(&self) -> String {
        let mut out = String::from("line,hits,gas,source\n");
        if self.source_lines.is_empty() {
            // No source text loaded: dump the lines that have tallies.
            let mut lines: Vec<&u32> = self.line_stats.keys().collect();
            lines.sort_unstable();
            for line in lines {
                let stats = self.line_stats[line];
                let _ = writeln!(out, "{line},{},{:.3},", stats.hits, stats.cost);
            }
            return out;
        }

        for (index, text) in self.source_lines.iter().enumerate() {
            let line = index as u32 + 1;
            let stats = self.line_stats.get(&line).copied().unwrap_or_default();
            let _ = writeln!(
                out,
                "{line},{},{:.3},\"{}\"",
                stats.hits,
                stats.cost,
                text.replace('"', "\"\"")
            );
        }
        out
    }
}
