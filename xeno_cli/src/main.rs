#![warn(clippy::all, clippy::pedantic)]

mod dump_archive;
mod import;

use dump_archive::{dump_archive, DumpArchive};
use import::{import, Import};

use std::fmt::Display;

use clap::Parser;

#[derive(Parser)]
#[clap(version = "0.1.0")]
struct Opts {
    #[clap(subcommand)]
    subcommand: SubCommand,
}

#[derive(Parser)]
enum SubCommand {
    DumpArchive(DumpArchive),
    Import(Import),
}

fn exit_on_error<E: Display>(result: Result<(), E>) {
    if let Err(err) = result {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn main() {
    env_logger::init();

    let opts = Opts::parse();

    match opts.subcommand {
        SubCommand::DumpArchive(opts) => exit_on_error(dump_archive(&opts)),
        SubCommand::Import(opts) => exit_on_error(import(&opts)),
    }
}
