#![forbid(unsafe_code)]

use std::io::IsTerminal;
use std::process::exit;

use clap::{ArgAction, ArgGroup, Parser};
use tracing::error;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

mod commands;
mod interactive;

use crate::commands::Subcommand;

#[derive(Parser)]
#[command(version, author, about, group(ArgGroup::new("format")))]
struct Opt {
    /// Increase the level of verbosity. Can be used multiple times.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Force colored output. Default is to check if the output is a tty
    #[arg(short = 'c', long, global = true, group = "format")]
    color: bool,

    /// Force non-colored output. Default is to check if the output is a tty
    #[arg(short = 'C', long, global = true, group = "format")]
    no_color: bool,

    /// Use JSON output for log messages
    #[arg(short, long, global = true, group = "format")]
    json: bool,

    #[command(subcommand)]
    command: Subcommand,
}

impl Opt {
    const fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "tinyvm_emulator=debug,tinyvm_cli=debug,info",
            2 => "tinyvm_emulator=trace,tinyvm_cli=trace,info",
            3 => "tinyvm_emulator=trace,tinyvm_cli=trace,debug",
            4..=u8::MAX => "trace",
        }
    }

    fn should_use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            std::io::stdout().is_terminal()
        }
    }

    fn filter_layer(&self) -> EnvFilter {
        // Parse log level from env, or infer it from args
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.log_filter()))
    }
}

fn main() {
    // First, parse the arguments
    let opt = Opt::parse();

    // Then, setup the tracing formatter for logging and instrumentation
    let registry = tracing_subscriber::Registry::default().with(opt.filter_layer());

    if opt.json {
        let json_layer = tracing_subscriber::fmt::layer().json();
        registry.with(json_layer).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .without_time()
            .with_ansi(opt.should_use_colors())
            .with_target(false);
        registry.with(fmt_layer).init();
    }

    // And run the command
    let res = opt.command.exec();
    if let Err(e) = res {
        error!("{:#}", e);
        exit(1);
    }
}
