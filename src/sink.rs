use std::path::{Path, PathBuf};

use log::info;

use crate::{error::SinkError, listing_parser::MemberRecord};

pub const COLUMNS: [&str; 3] = ["name", "department", "discipline"];

/// Writes the aggregated dataset as CSV with a fixed column order.
pub struct AggregationSink {
    destination: PathBuf,
}

impl AggregationSink {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Concatenates `sequences` in the order given and overwrites the
    /// destination. Missing fields become empty cells. Returns the row count.
    pub fn write<'a, I>(&self, sequences: I) -> Result<usize, SinkError>
    where
        I: IntoIterator<Item = &'a [MemberRecord]>,
    {
        let write_err = |source| SinkError::Write {
            path: self.destination.clone(),
            source,
        };

        // The header goes out by hand so an empty dataset still gets one.
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_path(&self.destination)
            .map_err(write_err)?;

        writer.write_record(COLUMNS).map_err(write_err)?;
        let mut rows = 0;
        for record in sequences.into_iter().flatten() {
            writer.serialize(record).map_err(write_err)?;
            rows += 1;
        }
        writer.flush().map_err(|source| SinkError::Flush {
            path: self.destination.clone(),
            source,
        })?;

        info!("Wrote {rows} rows to {}", self.destination.display());
        Ok(rows)
    }
}

/// Reads a dataset written by [`AggregationSink::write`]; empty cells come
/// back as `None`.
pub fn read_dataset(path: &Path) -> Result<Vec<MemberRecord>, SinkError> {
    let read_err = |source| SinkError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(read_err)?;
    let records = reader
        .deserialize::<MemberRecord>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;
    Ok(records)
}
