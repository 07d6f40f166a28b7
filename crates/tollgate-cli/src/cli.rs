use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tollgate",
    about = "tollgate — usage-metered, prepaid-session ledger",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a full register → open → meter → settle scenario on an
    /// embedded ledger and print the emitted settlement proof
    Demo(DemoArgs),
    /// Derive the storage address for a gateway slug
    Derive(DeriveArgs),
}

#[derive(Args)]
pub struct DemoArgs {
    /// Gateway slug to register
    #[arg(long, default_value = "demo")]
    pub slug: String,

    /// Price per request
    #[arg(long, default_value_t = 1000)]
    pub price: u64,

    /// Session deposit ceiling
    #[arg(long, default_value_t = 100_000)]
    pub deposit: u64,

    /// Session duration in seconds
    #[arg(long, default_value_t = 3600)]
    pub duration: i64,

    /// Number of usage calls to record
    #[arg(long, default_value_t = 3)]
    pub requests: u32,

    /// Usage amount per call
    #[arg(long, default_value_t = 5000)]
    pub amount: u64,
}

#[derive(Args)]
pub struct DeriveArgs {
    /// Gateway slug
    pub slug: String,
}
