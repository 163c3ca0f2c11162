use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

use crate::application::catalog::HackathonWindow;

/// Command-line arguments for the hackhub binary.
#[derive(Debug, Parser)]
#[command(name = "hackhub", version, about = "Hackathon platform data tool")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "HACKHUB_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: CliOverrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Settings that can be overridden for any command.
#[derive(Debug, Args, Clone, Default)]
pub struct CliOverrides {
    /// JSON seed file backing the document store.
    #[arg(
        long = "data-file",
        env = "HACKHUB_STORE__DATA_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub data_file: Option<PathBuf>,

    /// Log level filter (e.g. info, debug).
    #[arg(long = "log-level", env = "HACKHUB_LOGGING__LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(
        long = "log-json",
        env = "HACKHUB_LOGGING__JSON",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Disable every cache.
    #[arg(long = "no-cache", action = clap::ArgAction::SetTrue, global = true)]
    pub no_cache: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print one resolved document.
    Get(GetArgs),
    /// List a collection.
    List(ListArgs),
    /// List hackathons with their references expanded.
    Hackathons(HackathonsArgs),
    /// Add a user to a team.
    Join(MembershipArgs),
    /// Remove a user from a team.
    Leave(MembershipArgs),
    /// Replace the events a problem statement is linked to.
    Link(LinkArgs),
}

#[derive(Debug, Args, Clone)]
pub struct GetArgs {
    pub collection: String,
    pub id: String,

    /// Expand referenced documents one level deep.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub deep: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ListArgs {
    pub collection: String,

    #[arg(long = "order-by", value_name = "FIELD")]
    pub order_by: Option<String>,

    /// Sort descending.
    #[arg(long, action = clap::ArgAction::SetTrue, requires = "order_by")]
    pub desc: bool,

    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct HackathonsArgs {
    /// all, current or previous.
    #[arg(long, default_value = "all")]
    pub window: HackathonWindow,
}

#[derive(Debug, Args, Clone)]
pub struct MembershipArgs {
    #[arg(long)]
    pub user: String,

    #[arg(long)]
    pub team: String,
}

#[derive(Debug, Args, Clone)]
pub struct LinkArgs {
    #[arg(long = "problem-statement")]
    pub problem_statement: String,

    /// Event id or `<title>|<id>`; repeat for several events.
    #[arg(long = "event", required = true)]
    pub events: Vec<String>,
}
