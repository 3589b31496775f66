use camino::Utf8PathBuf;
use clap::{Parser, ValueHint};
use tinyvm_emulator::runtime::{Layout, Profile};
use tinyvm_emulator::Machine;
use tracing::debug;

use super::{assemble_file, ProfileKind, WithProfile};

#[derive(Parser, Debug)]
pub struct DumpOpt {
    /// Input file
    #[arg(value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,

    /// Machine to assemble the program for
    #[arg(short, long, value_enum)]
    pub(crate) profile: ProfileKind,

    /// Print the raw words instead of the disassembly
    #[arg(short, long)]
    raw: bool,
}

impl WithProfile for DumpOpt {
    fn with<P: Profile>(self) -> anyhow::Result<()> {
        let program = assemble_file::<P>(&self.input)?;
        let machine = Machine::<P>::with_program(&program)?;

        debug!("Disassembling program");
        let mut address = 0;
        while address < program.code.len() {
            if let Some(label) = machine.symbols.code_label(address) {
                println!("{label}:");
            }

            let word = program.code[address];
            // Words that do not decode, like data in unified memories, are
            // printed as they are
            match machine.disassemble(address) {
                Ok(instruction) if !self.raw => {
                    let end = (address + P::WIDTH).min(program.code.len());
                    let words: Vec<_> = program.code[address..end]
                        .iter()
                        .map(ToString::to_string)
                        .collect();
                    println!("{address:>5}  {:<32} {instruction}", words.join(" "));
                    address += P::WIDTH;
                }
                _ => {
                    println!("{address:>5}  {word}");
                    address += 1;
                }
            }
        }

        if P::LAYOUT == Layout::Split && !program.data.is_empty() {
            println!(".data");
            for (address, value) in program.data.iter().enumerate() {
                let label = machine.symbols.data_label(address).unwrap_or_default();
                println!("{address:>5}  {label:<12} {value}");
            }
        }

        Ok(())
    }
}
