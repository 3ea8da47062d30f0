use std::fs::File;
use std::io::BufReader;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, ValueHint};
use lc3_emulator::{Computer, Image};
use tracing::{debug, info};

use crate::terminal::{self, RawMode, TerminalConsole};

#[derive(Parser, Debug)]
pub struct RunOpt {
    /// Program image, as produced by an LC-3 assembler
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,
}

impl RunOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        info!(path = %self.input, "Reading program");
        let file =
            File::open(&self.input).with_context(|| format!("could not open {}", self.input))?;
        let image = Image::read_from(BufReader::new(file))
            .with_context(|| format!("could not load {}", self.input))?;

        debug!(origin = image.origin, words = image.words.len(), "Building computer");
        let interrupt =
            terminal::register_interrupt().context("could not install the SIGINT handler")?;
        let raw_mode = RawMode::enable().context("could not configure the terminal")?;
        let console = TerminalConsole::new(interrupt).context("could not open the terminal")?;
        let mut computer = Computer::with_image(&image, console);

        info!("Running program");
        let result = computer.run();

        // Hand the terminal back before anything else gets printed
        drop(raw_mode);

        info!(registers = %computer.registers, steps = computer.steps, "End of program");
        result?;

        Ok(())
    }
}
