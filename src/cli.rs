use clap::{ArgAction, Args, Parser, Subcommand};
use rank_finder::logging::LogFormat;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rank-finder", version, about = "Finds engineering colleges whose past cutoffs are close to your rank")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", default_value = "rank-finder.toml", global = true)]
    pub config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search colleges by rank
    Search(SearchArgs),

    /// Answer a JSON search request (file or stdin) with a JSON response
    Query {
        /// Request file; reads stdin when omitted
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// List the categories, branches and college types that can be searched
    Options,

    /// Administrative commands (require admin credentials)
    Admin(AdminArgs),
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Entrance exam rank
    #[arg(short, long, allow_hyphen_values = true)]
    pub rank: String,

    /// Category (OC, BC-A, BC-B, BC-C, BC-D, BC-E, SC, ST, EWS)
    #[arg(long)]
    pub category: Option<String>,

    /// Exact branch name
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Exact college type, e.g. PVT
    #[arg(short = 't', long)]
    pub college_type: Option<String>,

    /// Print the JSON response instead of a table
    #[arg(long)]
    pub json: bool,

    /// Also write the results to a CSV file
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct AdminArgs {
    #[arg(short, long)]
    pub username: String,

    #[arg(short, long)]
    pub password: String,

    #[command(subcommand)]
    pub command: AdminCommands,
}

#[derive(Subcommand, Debug)]
pub enum AdminCommands {
    /// Replace all data from spreadsheets, CSV or HTML files, directories or URLs
    Import {
        /// Sources; falls back to the configured data directory / URLs
        sources: Vec<String>,
    },

    /// Remove all colleges data
    Clear,

    /// Write the Excel import template
    Template {
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Dump the stored colleges data as JSON
    Data,

    /// Show dataset statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
}
