//! Run command - verify and execute a bytecode file.

use anyhow::Result;
use clap::Args;
use std::io::Write;
use std::path::PathBuf;
use tern_vm_core::{Interpreter, StdHost, VmConfig};
use thiserror::Error;

use super::{TrustArgs, read_program};

/// A run that verified but failed while executing
///
/// Carries the rendered `VmError`, whose values are not thread-safe.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RuntimeFailure(pub String);

#[derive(Args)]
pub struct RunCommand {
    /// Bytecode file to execute
    pub file: PathBuf,

    #[command(flatten)]
    pub trust: TrustArgs,
}

impl RunCommand {
    pub fn run(&self, mut config: VmConfig) -> Result<()> {
        self.trust.apply(&mut config);
        let program = read_program(&self.file, &config)?;

        let mut host = StdHost::new(std::io::stdout().lock());
        let result = Interpreter::new(config).run(&program, &mut host);
        host.into_inner().flush()?;
        result.map_err(|e| RuntimeFailure(e.to_string()))?;
        Ok(())
    }
}
