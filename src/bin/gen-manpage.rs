//! Man page generator for modflash
//!
//! Writes `modflash.1` plus one `modflash-<command>.1` page per subcommand.
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::path::{Path, PathBuf};

#[path = "../cli.rs"]
mod cli;
#[allow(dead_code)]
#[path = "../devices.rs"]
mod devices;

fn render(man: clap_mangen::Man, path: &Path) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    man.render(&mut buffer)?;
    fs::write(path, buffer)
}

fn main() -> std::io::Result<()> {
    let output_dir = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from("man"), PathBuf::from);
    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();
    let mut pages = vec![output_dir.join("modflash.1")];
    for sub in cmd.get_subcommands().filter(|sub| !sub.is_hide_set()) {
        let name = format!("modflash-{}", sub.get_name());
        let path = output_dir.join(format!("{}.1", name));
        render(clap_mangen::Man::new(sub.clone()).title(name), &path)?;
        pages.push(path);
    }
    render(clap_mangen::Man::new(cmd), &pages[0])?;

    for page in &pages {
        println!("Generated {}", page.display());
    }
    println!("\nView with: man -l {}", pages[0].display());
    println!(
        "Install with: sudo cp {}/*.1 /usr/local/share/man/man1/ && sudo mandb",
        output_dir.display()
    );

    Ok(())
}
