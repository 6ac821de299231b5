use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::filter::EnvFilter;

mod commands;
mod config;

use commands::inspect::InspectCommand;
use commands::run::{RunCommand, RuntimeFailure};
use commands::verify::VerifyCommand;

#[derive(Parser)]
#[command(name = "tern", version, about = "Tern bytecode toolchain")]
struct Cli {
    /// Path to tern.toml (searched upward from the working directory by default)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify and execute a bytecode file
    Run(RunCommand),
    /// Verify a bytecode file without running it
    Verify(VerifyCommand),
    /// Print the contents of a verified bytecode file
    Inspect(InspectCommand),
}

fn main() -> ExitCode {
    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn try_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(cmd) => cmd.run(config.vm),
        Commands::Verify(cmd) => cmd.run(config.vm),
        Commands::Inspect(cmd) => cmd.run(config.vm),
    }
}

/// 2 for failures while executing, 1 for rejected bytecode and everything else
fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<RuntimeFailure>().is_some() {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_vm_bytecode::VerifyError;

    #[test]
    fn test_exit_codes() {
        let verify: anyhow::Error = VerifyError::MissingEntryPoint {
            entry: "Main.main".into(),
        }
        .into();
        assert_eq!(exit_code(&verify), 1);

        let runtime: anyhow::Error = RuntimeFailure("uncaught exception: boom".into()).into();
        assert_eq!(exit_code(&runtime), 2);
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "tern",
            "run",
            "prog.tbc",
            "--untrusted",
            "--strict-entry",
            "false",
            "--max-steps",
            "2000",
        ])
        .unwrap();
        let Commands::Run(cmd) = cli.command else {
            panic!("expected run");
        };
        assert!(cmd.trust.untrusted);
        assert_eq!(cmd.trust.strict_entry, Some(false));
        assert_eq!(cmd.trust.max_steps, Some(2000));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
