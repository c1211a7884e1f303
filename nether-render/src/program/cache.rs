//! Shared program cache
//!
//! Programs are keyed by [`ProgramKey`] and shared through `Rc` handles.
//! The cache itself only holds `Weak` references: once the last material
//! lets go of a program, the handle's `Drop` parks the GPU object in a
//! graveyard and the next [`ProgramCache::collect`] deletes it.
//!
//! A context reset bumps the cache generation. Handles from an older
//! generation still drop into the graveyard, but their GPU objects died with
//! the old context and are discarded instead of deleted.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use hashbrown::HashMap;

use super::ProgramError;
use super::diagnostics::ProgramDiagnosticsReport;
use super::key::ProgramKey;
use super::parameters::ProgramParameters;
use super::source::assemble_source;
use crate::device::{ActiveAttribute, GpuDevice, GpuProgram};
use crate::state::GpuState;
use crate::uniforms::UniformTable;

type Graveyard = Rc<RefCell<Vec<(u64, GpuProgram)>>>;

/// A linked program plus its reflected interface.
pub struct Program {
    key: ProgramKey,
    name: String,
    gpu: GpuProgram,
    /// Per-program uniform value cache
    pub(crate) uniforms: RefCell<UniformTable>,
    attributes: Vec<ActiveAttribute>,
    generation: u64,
    ready: Cell<bool>,
    graveyard: Graveyard,
}

/// Shared handle; the program is released when the last clone drops.
pub type ProgramHandle = Rc<Program>;

impl Program {
    pub fn key(&self) -> ProgramKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gpu(&self) -> GpuProgram {
        self.gpu
    }

    pub fn attributes(&self) -> &[ActiveAttribute] {
        &self.attributes
    }

    /// Whether the driver reported the program as uniform `name`'s user.
    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.borrow().contains(name)
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("gpu", &self.gpu)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        self.graveyard.borrow_mut().push((self.generation, self.gpu));
    }
}

/// Cache of compiled programs keyed by parameter hash
pub struct ProgramCache {
    programs: HashMap<ProgramKey, Weak<Program>>,
    /// Keys that failed to build, with the report handed out on every retry
    failed: HashMap<ProgramKey, ProgramDiagnosticsReport>,
    graveyard: Graveyard,
    generation: u64,
}

impl Default for ProgramCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramCache {
    pub fn new() -> Self {
        Self {
            programs: HashMap::new(),
            failed: HashMap::new(),
            graveyard: Rc::new(RefCell::new(Vec::new())),
            generation: 0,
        }
    }

    /// Return the live program for `key`, compiling it on a miss.
    ///
    /// A key that failed before returns its stored report without another
    /// compile attempt until [`ProgramCache::forget_failure`] is called.
    pub fn acquire_program<D: GpuDevice>(
        &mut self,
        state: &mut GpuState<D>,
        parameters: &ProgramParameters,
        key: ProgramKey,
    ) -> Result<ProgramHandle, ProgramError> {
        if let Some(program) = self.programs.get(&key).and_then(Weak::upgrade) {
            return Ok(program);
        }
        if let Some(report) = self.failed.get(&key) {
            return Err(ProgramError::Compile(Box::new(report.clone())));
        }

        let source = assemble_source(parameters)?;
        let gpu = match state.device_mut().create_program(&source) {
            Ok(gpu) => gpu,
            Err(driver) => {
                let report = ProgramDiagnosticsReport::new(key, &source, driver);
                tracing::warn!("{}", report);
                self.failed.insert(key, report.clone());
                return Err(ProgramError::Compile(Box::new(report)));
            }
        };

        let device = state.device();
        let uniforms = UniformTable::from_active(&device.active_uniforms(gpu));
        let attributes = device.active_attributes(gpu);
        tracing::debug!(
            "Creating program: {} key={} uniforms={} attributes={}",
            source.name,
            key,
            uniforms.len(),
            attributes.len()
        );

        let program = Rc::new(Program {
            key,
            name: source.name,
            gpu,
            uniforms: RefCell::new(uniforms),
            attributes,
            generation: self.generation,
            ready: Cell::new(false),
            graveyard: Rc::clone(&self.graveyard),
        });
        self.programs.insert(key, Rc::downgrade(&program));
        Ok(program)
    }

    /// Drop one reference; deletes the GPU program if it was the last.
    pub fn release_program<D: GpuDevice>(&mut self, state: &mut GpuState<D>, program: ProgramHandle) {
        drop(program);
        self.collect(state);
    }

    /// Delete GPU programs whose last handle has dropped.
    pub fn collect<D: GpuDevice>(&mut self, state: &mut GpuState<D>) {
        let dead: Vec<(u64, GpuProgram)> = self.graveyard.borrow_mut().drain(..).collect();
        for (generation, gpu) in dead {
            if generation == self.generation {
                tracing::debug!("Deleting program {:?}", gpu);
                state.delete_program(gpu);
            }
        }
        self.programs.retain(|_, weak| weak.strong_count() > 0);
    }

    /// Non-blocking readiness check for drivers that link in parallel.
    pub fn is_program_ready<D: GpuDevice>(&self, state: &mut GpuState<D>, program: &Program) -> bool {
        if program.ready.get() {
            return true;
        }
        let ready = state.device_mut().program_ready(program.gpu);
        program.ready.set(ready);
        ready
    }

    /// Live programs.
    pub fn len(&self) -> usize {
        self.programs.values().filter(|w| w.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Report stored for a key that failed to build.
    pub fn failure(&self, key: ProgramKey) -> Option<&ProgramDiagnosticsReport> {
        self.failed.get(&key)
    }

    /// Allow a failed key to be compiled again.
    pub fn forget_failure(&mut self, key: ProgramKey) {
        self.failed.remove(&key);
    }

    /// Forget every program after a context loss.
    ///
    /// The GPU objects are gone with the context; outstanding handles are
    /// disowned so dropping them later issues no deletes.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.programs.clear();
        self.failed.clear();
        self.graveyard.borrow_mut().clear();
    }
}
