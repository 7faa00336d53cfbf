//! # Cmdtree Host
//!
//! A thin binary around the library: it reads a `cmdtree.json` describing
//! where the definition directories live, loads the tree with the built-in
//! actions and either dispatches an argv through it or inspects it.
//!
//! ```text
//! cmdtree [-c CONFIG] exec -- test cfg get --format=json
//! cmdtree index --restrict test.cfg --hidden
//! cmdtree alternates test.alpha.cfg.get --existing
//! cmdtree components
//! ```
//!
//! All parsing and wiring lives in `cli/`; this file only maps the result to
//! a process exit code.

mod cli;

fn main() {
    match cli::run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
