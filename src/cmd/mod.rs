pub mod compute;
pub mod schema;

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use fedtax::FinancialSnapshot;

/// Read a snapshot (JSON) from a file, or stdin with "-".
pub fn read_snapshot(path: &Path) -> anyhow::Result<FinancialSnapshot> {
    if path.as_os_str() == "-" {
        read_from_stdin()
    } else {
        let file = File::open(path)?;
        let snapshot = serde_json::from_reader(BufReader::new(file))?;
        Ok(snapshot)
    }
}

fn read_from_stdin() -> anyhow::Result<FinancialSnapshot> {
    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());

    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;

    if buffer.is_empty() {
        anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
    }

    let snapshot = serde_json::from_slice(&buffer)?;
    Ok(snapshot)
}
