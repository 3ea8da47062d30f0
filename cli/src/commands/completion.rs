use std::io::Write;

use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::{
    generate,
    shells::{Bash, Elvish, Fish, PowerShell, Zsh},
    Generator,
};

use crate::Opt;

/// Name the completions are registered for, whatever the binary was invoked as
const BIN_NAME: &str = "lc3";

#[derive(Parser, Debug)]
pub struct CompletionOpt {
    #[clap(value_enum)]
    shell: ShellKind,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ShellKind {
    Bash,
    Elvish,
    Fish,
    #[clap(name = "powershell")]
    PowerShell,
    Zsh,
}

impl ShellKind {
    fn write_completions(self, out: &mut dyn Write) {
        fn write<G: Generator>(generator: G, out: &mut dyn Write) {
            generate(generator, &mut Opt::command(), BIN_NAME, out);
        }

        match self {
            ShellKind::Bash => write(Bash, out),
            ShellKind::Elvish => write(Elvish, out),
            ShellKind::Fish => write(Fish, out),
            ShellKind::PowerShell => write(PowerShell, out),
            ShellKind::Zsh => write(Zsh, out),
        }
    }
}

impl CompletionOpt {
    #[allow(clippy::unnecessary_wraps)]
    pub fn exec(&self) -> anyhow::Result<()> {
        self.shell.write_completions(&mut std::io::stdout());
        Ok(())
    }
}
