use std::fs;
use std::path::Path;

use clap::CommandFactory;

// cli.rs only needs clap and clap_complete, both present as
// build-dependencies, so it can be included without the rest of the crate.
#[path = "src/cli.rs"]
mod cli;

fn main() {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let out_dir = std::env::var_os("OUT_DIR").expect("OUT_DIR not set by Cargo");
    let man_dir = Path::new(&out_dir).join("man");
    fs::create_dir_all(&man_dir).expect("failed to create man output directory");

    render_man_pages(cli::Cli::command(), &man_dir);
}

/// Write a man page for the command and each visible subcommand under it.
fn render_man_pages(root: clap::Command, dir: &Path) {
    let mut pending = vec![root];
    while let Some(cmd) = pending.pop() {
        let name = cmd.get_name().to_owned();

        let mut page = Vec::new();
        clap_mangen::Man::new(cmd.clone())
            .render(&mut page)
            .unwrap_or_else(|e| panic!("failed to render man page for `{name}`: {e}"));
        fs::write(dir.join(format!("{name}.1")), page)
            .unwrap_or_else(|e| panic!("failed to write {name}.1: {e}"));

        for sub in cmd.get_subcommands().filter(|s| !s.is_hide_set()) {
            pending.push(sub.clone().name(format!("{name}-{}", sub.get_name())));
        }
    }
}
