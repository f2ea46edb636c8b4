//! Compute command - assemble a return and print or export the result

use crate::cmd::read_snapshot;
use clap::{Args, ValueEnum};
use fedtax::{assemble_return, CalculationResult, CarryoverRecord, PenaltyMethod, TaxYearConfig};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table,
};

#[derive(Args, Debug)]
pub struct ComputeCommand {
    /// JSON financial snapshot (or stdin with "-")
    #[arg(short, long)]
    snapshot: PathBuf,

    /// JSON carryover package produced by the prior year's run
    #[arg(short, long)]
    carryovers: Option<PathBuf>,

    /// Validate the snapshot and confirm statutory tables exist for its tax
    /// year, without assembling the return
    #[arg(long)]
    year_config_check: bool,

    /// Method for the estimated tax underpayment penalty
    #[arg(long, value_enum, default_value_t = PenaltyMethodArg::Short)]
    penalty_method: PenaltyMethodArg,

    /// Output the full result as JSON instead of formatted tables
    #[arg(long)]
    json: bool,

    /// Write every form line as CSV to the given file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the next-year carryover package as JSON to the given file
    #[arg(long)]
    carryover_out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum PenaltyMethodArg {
    #[default]
    Short,
    Regular,
}

impl From<PenaltyMethodArg> for PenaltyMethod {
    fn from(arg: PenaltyMethodArg) -> Self {
        match arg {
            PenaltyMethodArg::Short => PenaltyMethod::Short,
            PenaltyMethodArg::Regular => PenaltyMethod::Regular,
        }
    }
}

impl ComputeCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let snapshot = read_snapshot(&self.snapshot)?;
        if self.year_config_check {
            // Dry run: surface input problems without computing anything.
            snapshot.validate()?;
            TaxYearConfig::for_year(snapshot.tax_year)?;
            println!(
                "snapshot valid; statutory tables available for {}",
                snapshot.tax_year
            );
            return Ok(());
        }
        let carryovers = match &self.carryovers {
            Some(path) => {
                let file = File::open(path)?;
                serde_json::from_reader::<_, Vec<CarryoverRecord>>(BufReader::new(file))?
            }
            None => Vec::new(),
        };

        let result = assemble_return(&snapshot, carryovers, self.penalty_method.into())?;

        if let Some(path) = &self.csv {
            result.write_csv(File::create(path)?)?;
        }
        if let Some(path) = &self.carryover_out {
            serde_json::to_writer_pretty(File::create(path)?, &result.carryover_package)?;
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print_tables(&result);
        }
        Ok(())
    }
}

fn print_tables(result: &CalculationResult) {
    println!(
        "Tax year {} ({}), snapshot {}",
        result.tax_year,
        result.filing_status,
        &result.snapshot_digest[..12]
    );
    for section in &result.forms {
        println!("\n{}", section.form);
        let table = Table::new(&section.lines)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
    }
    if !result.carryover_package.is_empty() {
        println!("\nCarryovers to {}", result.tax_year + 1);
        for record in &result.carryover_package {
            println!(
                "  {}: {} (since {})",
                record.category, record.amount, record.origin_year
            );
        }
    }
    println!(
        "\nTotal liability: {} (tax {} + penalty {})",
        result.total_liability, result.income_tax, result.underpayment_penalty
    );
}
