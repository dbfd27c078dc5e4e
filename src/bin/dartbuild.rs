// dartbuild binary
// Command-line tool for incremental dart2js builds and Dart test runs

use dartbuild::cli::run_build_cli;
use std::process;

fn main() {
    if let Err(e) = run_build_cli() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
