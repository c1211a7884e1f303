//! Program cache key

use std::fmt;
use std::hash::{Hash, Hasher};

use super::parameters::ProgramParameters;

/// Stable hash of a [`ProgramParameters`].
///
/// Equal parameters always produce equal keys, so the key alone decides
/// whether two draws can share a compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramKey(pub u64);

impl fmt::Display for ProgramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Hash every parameter that changes generated source.
pub fn get_program_cache_key(parameters: &ProgramParameters) -> ProgramKey {
    let mut hasher = xxhash_rust::xxh3::Xxh3::new();
    parameters.hash(&mut hasher);
    ProgramKey(hasher.finish())
}
