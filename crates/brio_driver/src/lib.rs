//! Batch driver for the Brio runtime. A program file is the JSON interchange
//! form a host parser produces: an AST arena, a root node, and the reactive
//! declarations to register before the moment loop starts.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use brio::ast::{AstProgram, NodeId};
use brio::diagnostics::{ErrorKind, RuntimeError};
use brio::values::TriggerEvent;
use brio::{Runtime, RuntimeOptions};

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("program load error: {0}")]
    Load(#[from] serde_json::Error),
    #[error("runtime error: {0}")]
    Runtime(RuntimeError),
    #[error("startup constraint violation: {0}")]
    StartupConstraint(RuntimeError),
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

impl DriverError {
    /// Exit codes: 0 ok, 1 load failure, 2 runtime failure, 3 startup
    /// constraint violation.
    pub fn exit_code(&self) -> u8 {
        match self {
            DriverError::Io(_) | DriverError::Load(_) | DriverError::InvalidCommand(_) => 1,
            DriverError::Runtime(_) => 2,
            DriverError::StartupConstraint(_) => 3,
        }
    }
}

fn default_event() -> TriggerEvent {
    TriggerEvent::DataChanged
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerDecl {
    pub name: String,
    #[serde(default = "default_event")]
    pub event: TriggerEvent,
    pub condition: NodeId,
    pub action: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintDecl {
    pub name: String,
    pub condition: NodeId,
    #[serde(default)]
    pub healing: Option<NodeId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgramFile {
    #[serde(default)]
    pub options: RuntimeOptions,
    #[serde(flatten)]
    pub program: AstProgram,
    #[serde(default)]
    pub triggers: Vec<TriggerDecl>,
    #[serde(default)]
    pub constraints: Vec<ConstraintDecl>,
    /// How long to run the moment loop after the program body; omitted
    /// means execute-and-exit.
    #[serde(default)]
    pub run_for_ms: Option<u64>,
}

#[derive(Debug)]
pub struct RunOutcome {
    /// Rendered top-level value of the program body.
    pub value: String,
    /// Moments completed by the loop, when one ran.
    pub moments: u64,
    /// Final state of the global frame.
    pub snapshot: serde_json::Value,
}

pub fn run_file(path: &Path) -> Result<RunOutcome, DriverError> {
    let content = fs::read_to_string(path)?;
    let file: ProgramFile = serde_json::from_str(&content)?;
    run_program(file)
}

/// Executes the program body, registers the reactive declarations, and runs
/// the moment loop when the file asks for one.
pub fn run_program(file: ProgramFile) -> Result<RunOutcome, DriverError> {
    let mut runtime = Runtime::new(file.options.clone());
    let offset = runtime
        .arena_mut()
        .absorb(file.program.arena)
        .map_err(DriverError::Runtime)?;
    let rebase = |id: NodeId| NodeId(id.0 + offset);

    let value = runtime
        .execute(rebase(file.program.root))
        .map_err(DriverError::Runtime)?;
    let rendered = runtime.render(value);

    for decl in &file.constraints {
        let handle = runtime
            .store_mut()
            .constraint(
                decl.name.clone(),
                rebase(decl.condition),
                decl.healing.map(rebase),
            )
            .map_err(DriverError::Runtime)?;
        runtime.register_constraint(handle).map_err(|err| {
            if err.kind() == ErrorKind::ConstraintViolation {
                DriverError::StartupConstraint(err)
            } else {
                DriverError::Runtime(err)
            }
        })?;
    }
    for decl in &file.triggers {
        let handle = runtime
            .store_mut()
            .trigger(
                decl.name.clone(),
                decl.event,
                rebase(decl.condition),
                rebase(decl.action),
            )
            .map_err(DriverError::Runtime)?;
        runtime.register_trigger(handle).map_err(DriverError::Runtime)?;
    }

    let mut moments = 0;
    if let Some(run_for_ms) = file.run_for_ms {
        runtime.start();
        runtime.run(Some(Duration::from_millis(run_for_ms)));
        moments = runtime.moment_index();
    }

    let snapshot = runtime.snapshot().map_err(DriverError::Runtime)?;
    Ok(RunOutcome {
        value: rendered,
        moments,
        snapshot,
    })
}
