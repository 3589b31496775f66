//! This module implements the TTY interactive interface.
//!
//! It is mainly based on two crates:
//!   - rustyline, to handle the line-editting logic
//!   - clap, to handle the parsing of those interactive commands
//!
//! Using Parser to do this is a bit of a hack, and requires some weird options
//! to have it working but works nonetheless.

use std::collections::BTreeSet;

use clap::Parser;
use rustyline::history::DefaultHistory;
use rustyline::{Behavior, CompletionType, Config, EditMode, Editor};
use tinyvm_emulator::constants::Address;
use tinyvm_emulator::runtime::{Layout, Profile};
use tinyvm_emulator::word::Word;
use tinyvm_emulator::Machine;
use tracing::{debug, info, warn};

mod helper;
pub(crate) mod parse;

use self::helper::RunHelper;
use self::parse::{block, Location, Region};

static HELP: &str = r#"
Run "help [command]" for command-specific help.
An empty line re-runs the last valid command."#;

#[derive(Parser, Clone, Debug)]
#[command(
    help_template = "{about}\n\nCommands:\n{subcommands}\n{after-help}",
    after_help = HELP,
    disable_version_flag = true,
    infer_subcommands = true,
    no_binary_name = true,
)]
/// Interactive mode commands
enum Command {
    /// Execute the next instructions
    #[command(alias = "s")]
    Step {
        /// Number of steps to execute
        #[arg(default_value = "1")]
        number: u64,
    },

    /// Exit the emulator
    Exit,

    /// Show the registers and stacks
    State,

    /// Show the content of a block in the data memory
    Memory {
        /// The address to show, a number or a label with an optional offset
        address: Location,

        /// Number of memory cells to show
        #[arg(default_value = "1")]
        number: usize,
    },

    /// Set a word in the data memory
    Set {
        /// The address to set
        address: Location,

        /// The value to set
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },

    /// Show the next few instructions
    List {
        /// Number of instructions to show
        #[arg(default_value = "10")]
        number: usize,
    },

    /// Set a breakpoint
    Break {
        /// The address where to set the breakpoint
        address: Location,
    },

    /// Remove a breakpoint
    Unbreak {
        /// The address of the breakpoint to remove
        address: Location,
    },

    /// Continue the program until the next breakpoint or until it halts
    #[command(alias = "c")]
    Continue,

    /// Show informations about the current debugging session
    Info {
        #[command(subcommand)]
        sub: Option<InfoCommand>,
    },
}

#[derive(Parser, Clone, Debug)]
enum InfoCommand {
    /// List active breakpoints
    Breakpoints,

    /// List program labels
    Labels,

    /// Show the number of instructions executed since the beginning of the
    /// program
    Cycles,
}

/// Holds informations about a interactive session
#[derive(Debug, Default)]
struct Session {
    /// Active breakpoints, sorted by address
    breakpoints: BTreeSet<Address>,

    /// Current address for the `list` command
    list_address: Option<Address>,
}

impl Session {
    /// Add a breakpoint
    fn add_breakpoint(&mut self, address: Address) {
        if self.breakpoints.insert(address) {
            info!(address, "Setting a breakpoint");
        } else {
            warn!(address, "A breakpoint was already set");
        }
    }

    /// Remove a breakpoint
    fn remove_breakpoint(&mut self, address: Address) {
        if self.breakpoints.remove(&address) {
            info!(address, "Removing breakpoint");
        } else {
            warn!(address, "No breakpoint was set here");
        }
    }

    /// Checks if the given address has a breakpoint
    fn has_breakpoint(&self, address: Address) -> bool {
        self.breakpoints.contains(&address)
    }

    /// Reset the `list` command (after running an instruction)
    fn reset_list(&mut self) {
        self.list_address = None;
    }

    /// Offset the `list` command, returns the address to show
    fn offset_list(&mut self, pc: Address, offset: Address) -> Address {
        let addr = self.list_address.unwrap_or(pc);
        self.list_address = Some(addr.saturating_add(offset));
        addr
    }

    /// Display the list of breakpoints
    fn display_breakpoints<P: Profile>(&self, machine: &Machine<P>) {
        match self.breakpoints.len() {
            0 => info!("No breakpoints"),
            1 => info!("1 breakpoint:"),
            x => info!("{} breakpoints:", x),
        }

        for &addr in &self.breakpoints {
            self.display_instruction(machine, addr);
        }
    }

    /// Display an instruction at specified address
    fn display_instruction<P: Profile>(&self, machine: &Machine<P>, address: Address) {
        // First, display the labels on the line if any
        machine
            .symbols
            .code
            .iter()
            .filter(|(_, &a)| a == address)
            .for_each(|(label, _)| info!("          {}:", label));

        // Then compute what is supposed to show in the gutter
        let is_current_line = machine.pc == address;
        let has_breakpoint = self.has_breakpoint(address);

        let gutter = match (has_breakpoint, is_current_line) {
            (true, true) => "B>",
            (true, false) => "B ",
            (false, true) => " >",
            (false, false) => "  ",
        };

        // This is an error if the address is too high or if the words do not
        // decode to an instruction
        match machine.disassemble(address) {
            Ok(instruction) => info!("{:<2} {:>5}    {}", gutter, address, instruction),
            Err(_) => info!("{:<2} {:>5}    -", gutter, address),
        }
    }

    /// Display the list of labels
    fn display_labels<P: Profile>(machine: &Machine<P>) {
        let symbols = &machine.symbols;
        match symbols.code.len() + symbols.data.len() {
            0 => info!("No labels"),
            1 => info!("1 label:"),
            x => info!("{} labels:", x),
        }

        for (label, &addr) in &symbols.code {
            info!("  {} => {}", label, addr);
        }
        for (label, &addr) in &symbols.data {
            info!("  {} => data {}", label, addr);
        }
    }

    /// Display the number of instructions executed
    fn display_cycles<P: Profile>(machine: &Machine<P>) {
        info!("Cycles: {}", machine.cycles);
    }
}

/// Execute one instruction, returns whether the machine stopped
fn step<P: Profile>(machine: &mut Machine<P>) -> bool {
    match machine.step() {
        Ok(false) => false,
        Ok(true) => {
            if let Some(value) = machine.halt_value() {
                info!(cycles = machine.cycles, "Halted with value {value}");
            }
            true
        }
        Err(e) => {
            warn!(error = &e as &dyn std::error::Error, "Stopped");
            true
        }
    }
}

/// Debug a program from the terminal
///
/// # Errors
///
/// Fails if the terminal can not be set up.
#[allow(clippy::too_many_lines)]
pub(crate) fn run_interactive<P: Profile>(machine: &mut Machine<P>) -> anyhow::Result<()> {
    info!("Running in interactive mode. Type \"help\" to list available commands.");
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .behavior(Behavior::PreferTerm)
        .auto_add_history(true)
        .build();

    let mut session = Session::default();

    let labels = machine
        .symbols
        .code
        .keys()
        .chain(machine.symbols.data.keys())
        .cloned()
        .collect();
    let h: RunHelper<Command> = RunHelper::new(labels);
    let mut rl: Editor<RunHelper<Command>, DefaultHistory> = Editor::with_config(config)?;
    rl.set_helper(Some(h));

    let mut last_command: Option<Command> = None;

    'read: loop {
        // A macro to unwrap an error, log it and continue the loop
        macro_rules! warn_and_continue {
            ($e:expr) => {
                match $e {
                    Ok(o) => o,
                    Err(e) => {
                        tracing::warn!(error = %e);
                        continue 'read;
                    }
                }
            };
        }

        let Ok(readline) = rl.readline(">> ") else {
            info!("EOF, exitting");
            return Ok(());
        };

        let command = if readline.is_empty() {
            if let Some(command) = &last_command {
                command.clone()
            } else {
                info!("Type \"help\" to get the list of available commands");
                continue 'read;
            }
        } else {
            let Ok(words) = shell_words::split(readline.as_str()) else {
                warn!("Invalid input");
                continue 'read;
            };

            let command = warn_and_continue!(Command::try_parse_from(words));
            last_command = Some(command.clone());
            command
        };

        debug!("Executing command: {:?}", command);

        match (command, machine.is_halted()) {
            (Command::Exit, _) => break,
            (Command::Step { number }, false) => {
                session.reset_list();

                for _ in 0..number {
                    if step(machine) {
                        break;
                    }
                }
            }

            (Command::State, _) => {
                info!(pc = machine.pc, cycles = machine.cycles, "{}", machine.state);
            }

            (Command::Memory { address, number }, _) => {
                let address = warn_and_continue!(address.evaluate(&machine.symbols, Region::Data));

                let addresses = warn_and_continue!(block(address, number));
                for address in addresses {
                    let value = warn_and_continue!(machine.read(address));
                    let label = match P::LAYOUT {
                        Layout::Unified => machine.symbols.code_label(address),
                        Layout::Split => machine.symbols.data_label(address),
                    };
                    info!(address, label, value = %value);
                }
            }

            (Command::Set { address, value }, false) => {
                let address = warn_and_continue!(address.evaluate(&machine.symbols, Region::Data));
                info!("Setting memory at address {address} to {value}");
                warn_and_continue!(machine.write(address, <P::Word as Word>::from_i64(value)));
            }

            (Command::List { number }, _) => {
                let addr = session.offset_list(machine.pc, number.saturating_mul(P::WIDTH));
                let addresses = (0..number)
                    .map_while(|i| i.checked_mul(P::WIDTH)?.checked_add(addr));
                for address in addresses {
                    session.display_instruction(machine, address);
                }
            }

            (Command::Break { address }, _) => {
                let address = warn_and_continue!(address.evaluate(&machine.symbols, Region::Code));
                session.add_breakpoint(address);
            }

            (Command::Unbreak { address }, _) => {
                let address = warn_and_continue!(address.evaluate(&machine.symbols, Region::Code));
                session.remove_breakpoint(address);
            }

            (Command::Continue, false) => {
                session.reset_list();

                while !step(machine) {
                    if session.has_breakpoint(machine.pc) {
                        info!(address = machine.pc, "Stopped at a breakpoint");
                        break;
                    }
                }
            }

            (Command::Info { sub }, _) => match sub {
                Some(InfoCommand::Breakpoints) => {
                    session.display_breakpoints(machine);
                }
                Some(InfoCommand::Labels) => {
                    Session::display_labels(machine);
                }
                Some(InfoCommand::Cycles) => {
                    Session::display_cycles(machine);
                }
                None => {
                    session.display_breakpoints(machine);
                    info!("-");
                    Session::display_labels(machine);
                    info!("-");
                    Session::display_cycles(machine);
                }
            },

            (_, true) => {
                // Machine is halted but the user asked to continue, we just warn
                warn!("Machine is halted. Use \"exit\" to quit");
            }
        }
    }

    Ok(())
}
