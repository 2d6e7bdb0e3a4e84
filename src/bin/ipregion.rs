mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{cmd_build, cmd_config, cmd_fetch, cmd_inspect, cmd_query, cmd_validate};

#[derive(Parser)]
#[command(name = "ipregion")]
#[command(
    about = "Offline IPv4 to region lookups",
    long_about = "ipregion - Build, inspect and query IPv4 region databases\n\n\
    A database maps every IPv4 address to a record of the form\n\
    country|region|province|city|isp. Lookups use a two-level range index\n\
    read straight from a memory-mapped file.\n\n\
    Examples:\n\
      ipregion build ip.merge.txt -o ip2region.xdb\n\
      ipregion query ip2region.xdb 8.8.8.8 114.114.114.114\n\
      ipregion inspect ip2region.xdb --json\n\
      ipregion validate ip2region.xdb --verbose\n\
      ipregion fetch --config ipregion.toml"
)]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a database from `start|end|region` source files
    Build {
        /// Source files (one range per line, .gz accepted), or "-" for stdin
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Output database file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Fixed build timestamp in unix seconds (default: now)
        #[arg(long, value_name = "SECS")]
        created_at: Option<u32>,
    },

    /// Look up one or more addresses, printing a JSON array
    Query {
        /// Path to the database file
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Dotted-quad addresses to look up
        #[arg(value_name = "IP", required = true)]
        ips: Vec<String>,

        /// Read the whole file instead of memory-mapping it
        #[arg(long)]
        no_mmap: bool,
    },

    /// Show header values and statistics of a database
    Inspect {
        /// Path to the database file
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Validate a database file (exit code 1 on errors)
    Validate {
        /// Path to the database file
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Output results as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Fill the cache path from the configured mirrors
    Fetch {
        /// Configuration file (default: ipregion.toml if present)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Override the cache path
        #[arg(long, value_name = "FILE")]
        cache: Option<PathBuf>,

        /// Override the mirror list (repeatable)
        #[arg(long = "mirror", value_name = "URL")]
        mirrors: Vec<String>,

        /// Download even if the cache is present and valid
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Configuration file (default: ipregion.toml if present)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Print the built-in defaults instead
        #[arg(long)]
        sample: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli_utils::init_logging(cli.verbose);

    match cli.command {
        Commands::Build {
            inputs,
            output,
            created_at,
        } => cmd_build(inputs, output, created_at),
        Commands::Query {
            database,
            ips,
            no_mmap,
        } => cmd_query(database, ips, no_mmap),
        Commands::Inspect { database, json } => cmd_inspect(database, json),
        Commands::Validate { database, json } => cmd_validate(database, json, cli.verbose),
        Commands::Fetch {
            config,
            cache,
            mirrors,
            force,
        } => cmd_fetch(config, cache, mirrors, force),
        Commands::Config { config, sample } => cmd_config(config, sample),
    }
}
