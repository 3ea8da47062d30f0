mod completion;
mod run;

#[derive(clap::Subcommand, Debug)]
pub enum Subcommand {
    /// Load a program image and run it
    Run(self::run::RunOpt),

    /// Generate shell completions
    Completion(self::completion::CompletionOpt),
}

impl Subcommand {
    /// Run a subcommand
    pub fn exec(self) -> anyhow::Result<()> {
        match self {
            Subcommand::Run(opt) => opt.exec(),
            Subcommand::Completion(opt) => opt.exec(),
        }
    }
}
