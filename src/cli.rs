//! Command line definition.

use clap::{Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::lists::{Ipv4Net, ListKind};

#[derive(Parser, Debug)]
#[command(name = "antibrute", version, about = "Anti-bruteforce admission control service")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the gRPC server
    Serve,
    /// Control a running server
    Ctl(CtlArgs),
}

#[derive(Args, Debug)]
pub struct CtlArgs {
    /// Server hostname
    #[arg(short = 'H', long, default_value = "localhost")]
    pub host: String,

    /// Server port
    #[arg(short, long, default_value_t = 50051)]
    pub port: u16,

    #[command(subcommand)]
    pub command: CtlCommand,
}

#[derive(Subcommand, Debug)]
pub enum CtlCommand {
    /// Add networks to the whitelist or blacklist
    Add {
        /// List kind: whitelist or blacklist
        #[arg(short, long)]
        kind: ListKind,

        /// IPv4 networks in CIDR notation
        #[arg(required = true)]
        networks: Vec<Ipv4Net>,
    },
    /// Delete networks from the whitelist or blacklist
    Delete {
        /// List kind: whitelist or blacklist
        #[arg(short, long)]
        kind: ListKind,

        /// IPv4 networks in CIDR notation
        #[arg(required = true)]
        networks: Vec<Ipv4Net>,
    },
    /// Reset the counters of a login and/or an IP
    Reset {
        /// Login to reset
        #[arg(short, long)]
        login: Option<String>,

        /// IP to reset
        #[arg(long)]
        ip: Option<IpAddr>,
    },
}
