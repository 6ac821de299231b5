//! CLI command implementations.

pub mod inspect;
pub mod run;
pub mod verify;

use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;
use tern_vm_bytecode::{Program, load};
use tern_vm_core::VmConfig;

/// Loader and limit flags shared by every command
#[derive(Args, Debug, Default, Clone)]
pub struct TrustArgs {
    /// Treat the input as untrusted (requires an entry point unless overridden)
    #[arg(long)]
    pub untrusted: bool,

    /// Require or waive the `Main.main` entry point
    #[arg(long, value_name = "BOOL", action = clap::ArgAction::Set)]
    pub strict_entry: Option<bool>,

    /// Instruction budget for the run
    #[arg(long, value_name = "N")]
    pub max_steps: Option<u64>,
}

impl TrustArgs {
    /// Layer the flags over file and environment settings
    pub fn apply(&self, config: &mut VmConfig) {
        if self.untrusted {
            config.trust.untrusted = true;
        }
        if let Some(strict) = self.strict_entry {
            config.trust.strict_entry = Some(strict);
        }
        if let Some(steps) = self.max_steps {
            config.max_steps = steps;
        }
    }
}

/// Read and verify a bytecode file
pub fn read_program(path: &Path, config: &VmConfig) -> Result<Program> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let program = load(&bytes, &config.loader_options())?;
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let mut config = VmConfig::default();
        config.trust.strict_entry = Some(true);
        let args = TrustArgs {
            untrusted: true,
            strict_entry: Some(false),
            max_steps: Some(10),
        };
        args.apply(&mut config);
        assert!(config.trust.untrusted);
        assert!(!config.loader_options().strict_entry);
        assert_eq!(config.max_steps, 10);
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let mut config = VmConfig::default();
        config.max_steps = 99;
        TrustArgs::default().apply(&mut config);
        assert_eq!(config.max_steps, 99);
        assert_eq!(config.trust.strict_entry, None);
    }
}
