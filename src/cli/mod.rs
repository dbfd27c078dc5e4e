// Command-line front end for dartbuild

pub mod build_cli;

pub use build_cli::{run_build_cli, BuildCli, BuildCommand, ConfigAction};
