//! Renders the `netoutput(1)` manual page from the CLI definition.
//!
//! The page lands in `$OUT_DIR/man/netoutput.1`; packaging picks it up from
//! there instead of the source tree.

use std::{env, error::Error, fs, path::PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli.rs"]
mod cli;

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed=src/cli.rs");

    let man_dir = PathBuf::from(env::var_os("OUT_DIR").ok_or("OUT_DIR is not set")?).join("man");
    fs::create_dir_all(&man_dir)?;

    let mut page = Vec::new();
    Man::new(cli::Cli::command()).render(&mut page)?;
    fs::write(man_dir.join("netoutput.1"), page)?;
    Ok(())
}
