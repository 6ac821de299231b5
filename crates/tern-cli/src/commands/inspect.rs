//! Inspect command - print the verified contents of a bytecode file.

use anyhow::Result;
use clap::Args;
use std::fmt::Write;
use std::path::PathBuf;
use tern_vm_bytecode::Program;
use tern_vm_core::VmConfig;

use super::{TrustArgs, read_program};

#[derive(Args)]
pub struct InspectCommand {
    /// Bytecode file to inspect
    pub file: PathBuf,

    /// Emit the program as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub trust: TrustArgs,
}

impl InspectCommand {
    pub fn run(&self, mut config: VmConfig) -> Result<()> {
        self.trust.apply(&mut config);
        let program = read_program(&self.file, &config)?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&program)?);
        } else {
            print!("{}", render_listing(&program)?);
        }
        Ok(())
    }
}

/// Human-readable disassembly
pub fn render_listing(program: &Program) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(out, "constants ({}):", program.constants().len())?;
    for (i, constant) in program.constants().iter().enumerate() {
        writeln!(out, "  #{i:<4} {:<6} {constant}", constant.tag().name())?;
    }

    for (i, function) in program.functions().iter().enumerate() {
        let entry = if program.entry().is_some_and(|e| e.index() as usize == i) {
            " [entry]"
        } else {
            ""
        };
        writeln!(
            out,
            "\nfn{i} {} (slots {}, {} instructions){entry}",
            function.name(),
            function.slot_count(),
            function.len(),
        )?;
        for (pc, instruction) in function.instructions().iter().enumerate() {
            writeln!(out, "  {pc:>4}  {instruction}")?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_vm_bytecode::{Constant, ENTRY_POINT, LoaderOptions, load};
    use tern_vm_compiler::{IrFunction, IrInstruction as I, IrProgram, encode};

    fn sample() -> Program {
        let mut main = IrFunction::new(ENTRY_POINT);
        main.emit(I::Const {
            dst: 0,
            value: Constant::string("hi"),
        })
        .emit(I::Print {
            src: 0,
            newline: true,
        })
        .emit(I::Return { src: None });
        let mut ir = IrProgram::new();
        ir.push(main);
        load(&encode(&ir).unwrap(), &LoaderOptions::strict()).unwrap()
    }

    #[test]
    fn test_listing_marks_entry_and_numbers_instructions() {
        let listing = render_listing(&sample()).unwrap();
        assert!(listing.starts_with("constants (1):"));
        assert!(listing.contains("\"hi\""));
        assert!(listing.contains("fn0 Main.main (slots 4, 3 instructions) [entry]"));
        assert!(listing.contains("     2  "));
    }

    #[test]
    fn test_json_lists_functions() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["functions"][0]["name"], "Main.main");
        assert_eq!(json["functions"][0]["instructions"].as_array().unwrap().len(), 3);
    }
}
