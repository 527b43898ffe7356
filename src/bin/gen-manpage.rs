//! Man page generator for nuflash
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::path::PathBuf;

#[path = "../cli.rs"]
mod cli;

fn main() -> std::io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));

    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();

    // One page for the tool, one per subcommand (nuflash-program.1, ...)
    let mut pages = vec![("nuflash".to_string(), cmd.clone())];
    for sub in cmd.get_subcommands() {
        let name = format!("nuflash-{}", sub.get_name());
        pages.push((name, sub.clone()));
    }

    for (name, page) in pages {
        let mut buffer = Vec::new();
        clap_mangen::Man::new(page)
            .title(name.to_uppercase())
            .render(&mut buffer)?;
        let output_path = output_dir.join(format!("{}.1", name));
        fs::write(&output_path, buffer)?;
        println!("Man page generated at: {}", output_path.display());
    }

    println!("\nTo view the man page:");
    println!("  man -l {}", output_dir.join("nuflash.1").display());
    Ok(())
}
