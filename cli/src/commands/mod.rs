use std::process::exit;

use anyhow::Context;
use camino::Utf8Path;
use clap::ValueEnum;
use miette::NamedSource;
use tinyvm_emulator::runtime::profiles::{
    BStack, BSubleq2, Bvm2, StackMachine, Subleq, Subleq2, Vm1, Vm2,
};
use tinyvm_emulator::runtime::Profile;
use tinyvm_emulator::{assemble, Program};
use tracing::{debug, info};

mod completion;
mod dump;
mod run;

#[derive(clap::Subcommand)]
pub enum Subcommand {
    /// Assemble and run a program
    Run(self::run::RunOpt),

    /// Assemble a program and print its listing
    Dump(self::dump::DumpOpt),

    /// Generate shell completions
    Completion(self::completion::CompletionOpt),
}

impl Subcommand {
    /// Run a subcommand
    pub fn exec(self) -> anyhow::Result<()> {
        match self {
            Self::Run(opt) => opt.profile.dispatch(opt),
            Self::Dump(opt) => opt.profile.dispatch(opt),
            Self::Completion(opt) => opt.exec(),
        }
    }
}

/// The machine to assemble and run programs for
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfileKind {
    /// Accumulator machine, one operand per instruction
    Vm1,
    /// Memory to memory machine, two operands per instruction
    Vm2,
    /// Two operand machine on arbitrary precision words
    Bvm2,
    /// Two operand machine on 64-bit words
    #[value(name = "bvm2-i64")]
    Bvm2I64,
    /// Stack machine on 32-bit words
    Stack,
    /// Stack machine on arbitrary precision words
    Bstack,
    /// SUBLEQ on 32-bit words
    Subleq,
    /// SUBLEQ with indirection and a separate code memory
    Subleq2,
    /// SUBLEQ2 on arbitrary precision words
    Bsubleq2,
}

/// A command that works on any machine
pub(crate) trait WithProfile {
    fn with<P: Profile>(self) -> anyhow::Result<()>;
}

impl ProfileKind {
    pub(crate) fn dispatch<T: WithProfile>(self, task: T) -> anyhow::Result<()> {
        match self {
            Self::Vm1 => task.with::<Vm1>(),
            Self::Vm2 => task.with::<Vm2>(),
            Self::Bvm2 => task.with::<Bvm2>(),
            Self::Bvm2I64 => task.with::<Bvm2<i64>>(),
            Self::Stack => task.with::<StackMachine>(),
            Self::Bstack => task.with::<BStack>(),
            Self::Subleq => task.with::<Subleq>(),
            Self::Subleq2 => task.with::<Subleq2>(),
            Self::Bsubleq2 => task.with::<BSubleq2>(),
        }
    }
}

/// Read and assemble a source file
///
/// Assembly errors are reported with their location and end the process.
pub(crate) fn assemble_file<P: Profile>(path: &Utf8Path) -> anyhow::Result<Program<P::Word>> {
    info!(path = %path, profile = P::NAME, "Reading program");
    let source =
        std::fs::read_to_string(path).with_context(|| format!("could not read {path}"))?;

    debug!("Assembling program");
    match assemble::<P>(&source) {
        Ok(program) => Ok(program),
        Err(e) => {
            let report = miette::Report::new(e).with_source_code(NamedSource::new(path, source));
            eprintln!("{report:?}");
            exit(1);
        }
    }
}
