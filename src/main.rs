//! repodex - local git-aware code index and keyword search CLI.

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;

use repodex::app;
use repodex::cli::Cli;

fn main() -> Result<()> {
    env_logger::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                err.exit();
            }
            let _ = err.print();
            std::process::exit(1);
        }
    };
    app::run(cli)
}
