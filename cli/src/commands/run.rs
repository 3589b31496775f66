use std::str::FromStr;

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, ValueHint};
use tinyvm_emulator::runtime::{Layout, Profile};
use tinyvm_emulator::Machine;
use tracing::{info, warn};

use super::{assemble_file, ProfileKind, WithProfile};
use crate::interactive::parse::{block, Location, ParseLocationError, Region};
use crate::interactive::run_interactive;

#[derive(Parser, Debug)]
pub struct RunOpt {
    /// Input file
    #[arg(value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,

    /// Machine to run the program on
    #[arg(short, long, value_enum)]
    pub(crate) profile: ProfileKind,

    /// Run the program in interactive mode
    #[arg(short, long, action = ArgAction::SetTrue)]
    interactive: bool,

    /// Stop after this many instructions
    #[arg(short = 'n', long, value_name = "STEPS")]
    max_steps: Option<usize>,

    /// Print a block of memory at the end of the program. Can be used
    /// multiple times.
    #[arg(short, long, value_name = "ADDR[:N]")]
    dump: Vec<DumpRange>,
}

/// A block of memory, like `sum` or `table:4`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRange {
    start: Location,
    count: usize,
}

impl FromStr for DumpRange {
    type Err = ParseLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, count) = match s.rsplit_once(':') {
            Some((start, count)) => {
                let count = count
                    .parse()
                    .map_err(|_| ParseLocationError::new(format!("invalid count {count}")))?;
                (start, count)
            }
            None => (s, 1),
        };

        Ok(Self {
            start: start.parse()?,
            count,
        })
    }
}

impl RunOpt {
    fn dump<P: Profile>(&self, machine: &Machine<P>) -> anyhow::Result<()> {
        for range in &self.dump {
            let start = range.start.evaluate(&machine.symbols, Region::Data)?;
            for address in block(start, range.count)? {
                let value = machine.read(address)?;
                let label = match P::LAYOUT {
                    Layout::Unified => machine.symbols.code_label(address),
                    Layout::Split => machine.symbols.data_label(address),
                };
                println!("{address:>5}  {:<12} {value}", label.unwrap_or_default());
            }
        }
        Ok(())
    }
}

impl WithProfile for RunOpt {
    fn with<P: Profile>(self) -> anyhow::Result<()> {
        let program = assemble_file::<P>(&self.input)?;
        let mut machine = Machine::<P>::with_program(&program)?;

        info!(profile = P::NAME, "Running program");
        let outcome = if self.interactive {
            run_interactive(&mut machine)
        } else if let Some(budget) = self.max_steps {
            match machine.run_for(budget) {
                Ok(true) => Ok(()),
                Ok(false) => {
                    warn!(budget, "Step budget exhausted before the machine halted");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        } else {
            machine.run().map_err(Into::into)
        };

        info!(state = %machine.state, cycles = machine.cycles, pc = machine.pc, "End of program");
        if let Some(value) = machine.halt_value() {
            println!("{value}");
        }

        self.dump(&machine)?;
        outcome
    }
}
