//! Verify command - check a bytecode file without running it.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tern_vm_core::VmConfig;

use super::{TrustArgs, read_program};

#[derive(Args)]
pub struct VerifyCommand {
    /// Bytecode file to verify
    pub file: PathBuf,

    #[command(flatten)]
    pub trust: TrustArgs,
}

impl VerifyCommand {
    pub fn run(&self, mut config: VmConfig) -> Result<()> {
        self.trust.apply(&mut config);
        let program = read_program(&self.file, &config)?;
        println!(
            "{}: ok ({} functions, {} instructions, {} constants)",
            self.file.display(),
            program.functions().len(),
            program.instruction_count(),
            program.constants().len(),
        );
        Ok(())
    }
}
