use clap::{Command, CommandFactory, Parser};
use clap_complete::{generate, Generator, Shell};

use crate::Opt;

#[derive(Parser, Debug)]
pub struct CompletionOpt {
    #[arg(value_enum)]
    shell: Shell,
}

fn print_completions<G: Generator>(generator: G, command: &mut Command) {
    let name = command.get_name().to_string();
    generate(generator, command, name, &mut std::io::stdout());
}

impl CompletionOpt {
    #[allow(clippy::unnecessary_wraps)]
    pub fn exec(&self) -> anyhow::Result<()> {
        let mut command = Opt::command();
        print_completions(self.shell, &mut command);
        Ok(())
    }
}
