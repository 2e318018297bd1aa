use std::fs::OpenOptions;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::MementoError;

/// Append-only record of items that failed at the fetch stage. Injected into
/// the pipeline so tests can observe failures without real disk I/O.
pub trait FailureLedger: Send + Sync {
    fn record(&self, line: &str) -> Result<(), MementoError>;
}

pub const LEDGER_FILE_NAME: &str = "not_saved.txt";

/// Plain-text ledger in the output directory, one line per failed item. The
/// file is opened fresh for every write so an interrupted run never holds it
/// half-written, and existing lines are never overwritten.
#[derive(Debug, Clone)]
pub struct FileLedger {
    path: Utf8PathBuf,
}

impl FileLedger {
    pub fn new(out_dir: &Utf8Path) -> Self {
        Self {
            path: out_dir.join(LEDGER_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl FailureLedger for FileLedger {
    fn record(&self, line: &str) -> Result<(), MementoError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path.as_std_path())
            .map_err(|err| MementoError::Filesystem(err.to_string()))?;
        writeln!(file, "{line}").map_err(|err| MementoError::Filesystem(err.to_string()))
    }
}
