//! Schema command - print expected input formats

use clap::Args;
use fedtax::snapshot::FinancialSnapshot;
use fedtax::CarryoverRecord;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Which input format to describe
    #[arg(value_enum, default_value = "snapshot")]
    input: SchemaInput,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaInput {
    /// JSON Schema for the financial snapshot
    Snapshot,
    /// JSON Schema for the carryover package
    Carryovers,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let schema = match self.input {
            SchemaInput::Snapshot => schema_for!(FinancialSnapshot),
            SchemaInput::Carryovers => schema_for!(Vec<CarryoverRecord>),
        };
        println!("{}", serde_json::to_string_pretty(&schema)?);
        Ok(())
    }
}
