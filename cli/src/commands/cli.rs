use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "taskbot", version, about = "Feishu task bot with CI status relay")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file; defaults to ~/.taskbot/config.toml, then ./config.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the webhook server (default).
    Serve(ServeArgs),
    /// Run one stale-task reminder sweep and exit.
    Sweep(SweepArgs),
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ServeArgs {
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// Do not start the periodic reminder scheduler.
    #[arg(long)]
    pub no_scheduler: bool,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct SweepArgs {
    /// Override `scheduler.stale_after_hours`.
    #[arg(long)]
    pub stale_after_hours: Option<i64>,
}
