//! Shader programs
//!
//! A material never owns shader text. Per draw the renderer derives
//! [`ProgramParameters`], hashes them into a [`ProgramKey`] and asks the
//! [`ProgramCache`] for the matching program; only a new key compiles.

mod cache;
mod chunks;
mod diagnostics;
mod key;
mod parameters;
mod source;

#[cfg(test)]
mod tests;

use thiserror::Error;

pub use cache::{Program, ProgramCache, ProgramHandle};
pub use diagnostics::ProgramDiagnosticsReport;
pub use key::{ProgramKey, get_program_cache_key};
pub use parameters::{
    CustomSource, MAX_MORPH_TARGETS, MAX_MORPH_TARGETS_WITH_NORMALS, ParameterContext,
    ProgramFeatures, ProgramParameters, ShaderId, get_parameters,
};
pub use source::assemble_source;

/// Failure to produce a usable program
#[derive(Debug, Error)]
pub enum ProgramError {
    /// The driver rejected the source
    #[error("{0}")]
    Compile(Box<ProgramDiagnosticsReport>),

    /// A template includes a chunk that does not exist
    #[error("unknown shader chunk: {0}")]
    MissingChunk(String),

    /// An unroll block whose bounds are not integer literals
    #[error("cannot unroll loop: {0}")]
    MalformedLoop(String),
}

impl ProgramError {
    /// Driver report, when the failure came from the driver.
    pub fn report(&self) -> Option<&ProgramDiagnosticsReport> {
        match self {
            ProgramError::Compile(report) => Some(report),
            _ => None,
        }
    }
}
