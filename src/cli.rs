//! `proksi server mitm --bind --port --config` / `proksi version`, per
//! spec §6's illustrative CLI surface.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "proksi", about = "Harvests, scores and forwards free public HTTP(S) proxies")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs a proxy front door.
    Server {
        #[command(subcommand)]
        kind: ServerKind,
    },
    /// Prints the build version and exits.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ServerKind {
    /// Runs the always-MITM HTTP(S) front door.
    Mitm {
        #[arg(long, default_value = "0.0.0.0")]
        bind: IpAddr,
        #[arg(long, default_value_t = 8081)]
        port: u16,
        #[arg(long, default_value = "proksi.toml")]
        config: PathBuf,
    },
}
