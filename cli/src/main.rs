#![forbid(unsafe_code)]

use std::io::IsTerminal;
use std::process::exit;

use clap::{ArgAction, ArgGroup, Parser};
use lc3_emulator::ProcessorError;
use tracing::error;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

mod commands;
mod terminal;

use crate::commands::Subcommand;

/// Exit code of a program stopped by SIGINT, as shells report it
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Parser)]
#[clap(version, author, about, group = ArgGroup::new("format"))]
struct Opt {
    /// Increase the level of verbosity. Can be used multiple times.
    #[clap(short, long, action = ArgAction::Count, global(true))]
    verbose: u8,

    /// Force colored output. Default is to check if the output is a tty
    #[clap(short = 'c', long, global(true), group = "format")]
    color: bool,

    /// Force non-colored output. Default is to check if the output is a tty
    #[clap(short = 'C', long, global(true), group = "format")]
    no_color: bool,

    /// Use JSON output for log messages
    #[clap(short, long, global(true), group = "format")]
    json: bool,

    #[clap(subcommand)]
    command: Subcommand,
}

impl Opt {
    // Logs share the terminal with the running program, so stay quiet by default
    const fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "lc3_emulator=info,lc3=info,warn",
            2 => "lc3_emulator=debug,lc3=debug,info",
            3 => "lc3_emulator=trace,lc3=trace,info",
            4..=u8::MAX => "trace",
        }
    }

    fn should_use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            std::io::stderr().is_terminal()
        }
    }

    fn filter_layer(&self) -> EnvFilter {
        // Parse log level from env
        EnvFilter::try_from_default_env()
            // or infer from args
            .or_else(|_| EnvFilter::try_new(self.log_filter()))
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<ProcessorError>() {
        Some(ProcessorError::Interrupted) => INTERRUPTED_EXIT_CODE,
        _ => 1,
    }
}

fn main() {
    // First, parse the arguments
    let opt = Opt::parse();

    // Then, setup the tracing formatter for logging and instrumentation
    let registry = tracing_subscriber::Registry::default().with(opt.filter_layer());

    if opt.json {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr);
        registry.with(json_layer).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .without_time()
            .with_ansi(opt.should_use_colors())
            .with_target(false)
            .with_writer(std::io::stderr);
        registry.with(fmt_layer).init();
    }

    // And run the command
    let res = opt.command.exec();
    if let Err(e) = res {
        let code = exit_code(&e);
        if code == INTERRUPTED_EXIT_CODE {
            // Leave the shell prompt on a fresh line
            println!();
        }
        error!("{e:#}");
        exit(code);
    }
}
