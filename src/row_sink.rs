use std::fs::File;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::Result;
use crate::listing::{ListingRecord, EMAIL_SEPARATOR};

pub const HEADER: [&str; 7] = [
    "Name",
    "Address",
    "City",
    "Phone",
    "Website",
    "Email",
    "Google Maps URL",
];

/// Accumulates listing rows for one run and rewrites the output file on demand.
pub struct RowSink {
    path: PathBuf,
    rows: Vec<ListingRecord>,
}

impl RowSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        RowSink {
            path: path.into(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, record: ListingRecord) {
        self.rows.push(record);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[ListingRecord] {
        &self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites the output file with the header and every row so far.
    pub fn write(&self) -> Result<()> {
        let file = File::create(&self.path)?;
        let mut writer = csv::WriterBuilder::new().from_writer(file);

        writer.write_record(HEADER)?;
        for row in &self.rows {
            writer.write_record(to_fields(row))?;
        }
        writer.flush()?;

        info!("Saved {} rows to {:?}", self.rows.len(), self.path);
        Ok(())
    }
}

fn to_fields(row: &ListingRecord) -> [String; 7] {
    [
        row.name.clone(),
        row.address.clone().unwrap_or_default(),
        row.city.clone(),
        row.phone.clone().unwrap_or_default(),
        row.website.clone().unwrap_or_default(),
        row.email_field(),
        row.source_url.clone(),
    ]
}

/// Reads a file written by [`RowSink::write`] back into records.
pub fn read_rows<P: AsRef<Path>>(path: P) -> Result<Vec<ListingRecord>> {
    let mut rdr = csv::ReaderBuilder::new().from_path(path)?;
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let field = |i: usize| record.get(i).unwrap_or("").to_string();
        let optional = |i: usize| Some(field(i)).filter(|value| !value.is_empty());

        rows.push(ListingRecord {
            name: field(0),
            address: optional(1),
            city: field(2),
            phone: optional(3),
            website: optional(4),
            emails: field(5)
                .split(EMAIL_SEPARATOR)
                .filter(|email| !email.is_empty())
                .map(String::from)
                .collect(),
            source_url: field(6),
        });
    }
    Ok(rows)
}
