use clap::{Parser, Subcommand};

mod cmd;

#[derive(Parser)]
#[command(name = "fedtax", version, about = "US federal income tax computation engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a return from a financial snapshot
    Compute(cmd::compute::ComputeCommand),
    /// Print the JSON schemas for the input formats
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Compute(cmd) => cmd.exec(),
        Command::Schema(cmd) => cmd.exec(),
    }
}
