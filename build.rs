//! Build script for generating the `bosun` man pages.
//!
//! One page is rendered for the top-level command and one per subcommand
//! (`bosun-provision.1`, `bosun-teardown.1`) into the build output directory.

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

const SUBCOMMAND_PAGES: [(&str, &str); 2] = [
    ("provision", "bosun-provision"),
    ("teardown", "bosun-teardown"),
];

fn render_page(command: clap::Command, target: &Path) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    Man::new(command).render(&mut buffer)?;
    fs::write(target, buffer)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir =
        PathBuf::from(env::var_os("OUT_DIR").ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
        })?);

    let command = Cli::command();
    for (sub, page) in SUBCOMMAND_PAGES {
        let subcommand = command
            .find_subcommand(sub)
            .ok_or_else(|| format!("subcommand `{sub}` is not defined"))?;
        render_page(subcommand.clone().name(page), &out_dir.join(format!("{page}.1")))?;
    }
    render_page(command, &out_dir.join("bosun.1"))?;

    Ok(())
}
