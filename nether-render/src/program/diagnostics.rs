//! Compile failure reports
//!
//! Driver logs name a line (`ERROR: 0:42: ...`); the report pairs the log
//! with a numbered excerpt of the assembled source around that line.

use std::fmt;

use super::key::ProgramKey;
use crate::device::{ProgramDiagnostics, ShaderSource};

/// Lines shown on each side of the failing line.
const EXCERPT_CONTEXT: usize = 6;

/// Everything known about a program that failed to compile or link.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramDiagnosticsReport {
    pub name: String,
    pub key: ProgramKey,
    pub driver: ProgramDiagnostics,
    /// Numbered source around the first vertex error, if the log names one
    pub vertex_excerpt: Option<String>,
    pub fragment_excerpt: Option<String>,
}

impl ProgramDiagnosticsReport {
    pub fn new(key: ProgramKey, source: &ShaderSource, driver: ProgramDiagnostics) -> Self {
        let vertex_excerpt =
            error_line(&driver.vertex_log).map(|line| excerpt(&source.vertex, line));
        let fragment_excerpt =
            error_line(&driver.fragment_log).map(|line| excerpt(&source.fragment, line));
        Self {
            name: source.name.clone(),
            key,
            driver,
            vertex_excerpt,
            fragment_excerpt,
        }
    }
}

impl fmt::Display for ProgramDiagnosticsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "program {} ({}) failed to build", self.name, self.key)?;
        if !self.driver.program_log.is_empty() {
            writeln!(f, "{}", self.driver.program_log.trim_end())?;
        }
        for (stage, log, excerpt) in [
            ("vertex", &self.driver.vertex_log, &self.vertex_excerpt),
            ("fragment", &self.driver.fragment_log, &self.fragment_excerpt),
        ] {
            if log.is_empty() {
                continue;
            }
            writeln!(f, "{} shader: {}", stage, log.trim_end())?;
            if let Some(excerpt) = excerpt {
                write!(f, "{}", excerpt)?;
            }
        }
        Ok(())
    }
}

/// First line number named by an `ERROR: <file>:<line>:` log entry.
pub fn error_line(log: &str) -> Option<usize> {
    log.lines().find_map(|entry| {
        let rest = entry.trim().strip_prefix("ERROR:")?;
        let mut fields = rest.trim_start().split(':');
        let _file = fields.next()?;
        fields.next()?.trim().parse().ok()
    })
}

/// Numbered lines around `line` (1-based), the failing line marked with `>`.
pub fn excerpt(source: &str, line: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let line = line.clamp(1, lines.len().max(1));
    let first = line.saturating_sub(EXCERPT_CONTEXT).max(1);
    let last = (line + EXCERPT_CONTEXT).min(lines.len());

    let mut out = String::new();
    for number in first..=last {
        let marker = if number == line { "> " } else { "  " };
        let text = lines.get(number - 1).copied().unwrap_or("");
        out.push_str(&format!("{}{:4}: {}\n", marker, number, text));
    }
    out
}
