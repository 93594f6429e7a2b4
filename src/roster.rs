use std::fs::File;
use std::path::Path;

use tracing::warn;

use crate::error::{CertmailError, Result};

/// One validated roster row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

impl Recipient {
    /// Builds a recipient from raw field values. Returns `None` when either
    /// field is empty after trimming.
    pub fn from_fields(name: &str, email: &str) -> Option<Self> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || email.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            email: email.to_string(),
        })
    }
}

/// Lazy, single-pass reader over the roster CSV. Invalid rows are logged
/// and skipped; iteration never aborts the batch.
pub struct Roster {
    records: csv::StringRecordsIntoIter<File>,
    name_idx: Option<usize>,
    email_idx: Option<usize>,
}

impl Roster {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|_| CertmailError::RosterNotFound(path.display().to_string()))?;

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers = reader.headers()?.clone();
        let name_idx = headers
            .iter()
            .position(|h| normalize_header(h) == "name");
        let email_idx = headers
            .iter()
            .position(|h| normalize_header(h) == "email");

        if name_idx.is_none() || email_idx.is_none() {
            warn!(
                "Roster {} is missing a `name` or `email` column; every row will be skipped",
                path.display()
            );
        }

        Ok(Self {
            records: reader.into_records(),
            name_idx,
            email_idx,
        })
    }
}

impl Iterator for Roster {
    type Item = Recipient;

    fn next(&mut self) -> Option<Recipient> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable row: {}", e);
                    continue;
                }
            };

            let name = self.name_idx.and_then(|i| record.get(i)).unwrap_or("");
            let email = self.email_idx.and_then(|i| record.get(i)).unwrap_or("");

            match Recipient::from_fields(name, email) {
                Some(recipient) => return Some(recipient),
                None => {
                    warn!("Skipping invalid row: {:?}", record);
                    continue;
                }
            }
        }
    }
}

/// Header names are matched after trimming whitespace and any leading BOM
/// left over from UTF-8-with-BOM exports.
fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .trim()
        .to_ascii_lowercase()
}
