//! Streaming log reader.
//!
//! [`LogReader`] decodes a source, detects its delimiter and dialect,
//! resolves columns and hands back a [`RecordStream`]: a lazy iterator of
//! validated [`SampleRecord`]s. Rejected rows are tallied, never returned.

use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use crate::columns::ColumnMap;
use crate::decode::{decode_log_bytes, sniff_delimiter, TextEncoding};
use crate::dialect::{normalize_header, Dialect};
use crate::error::{IngestError, IngestResult};
use crate::field::Field;
use crate::normalize::Normalizer;
use crate::record::{RejectReason, RejectionTally, SampleRecord};

/// Counters for one ingestion pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestStats {
    /// Dialect used for column resolution.
    pub dialect: Dialect,
    /// Field delimiter.
    pub delimiter: char,
    /// Source text encoding.
    pub encoding: TextEncoding,
    /// Data rows seen (excluding the header).
    pub rows_read: usize,
    /// Rows that produced a record.
    pub rows_accepted: usize,
    /// Rejected rows by reason.
    pub rejections: RejectionTally,
}

impl IngestStats {
    /// Total rejected rows.
    #[must_use]
    pub fn rows_rejected(&self) -> usize {
        self.rejections.total()
    }
}

/// Entry point for reading dyno logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReader {
    dialect: Option<Dialect>,
}

impl LogReader {
    /// Reader with dialect auto-detection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a dialect instead of detecting one.
    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Open a log file.
    pub fn open(&self, path: &Path) -> IngestResult<RecordStream> {
        let bytes = fs::read(path).map_err(|e| IngestError::io(path, e))?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Read dyno log");
        self.from_bytes(&bytes)
    }

    /// Read a log from any byte source.
    pub fn from_reader<R: Read>(&self, mut reader: R) -> IngestResult<RecordStream> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.from_bytes(&bytes)
    }

    /// Read a log already held in memory.
    pub fn from_bytes(&self, bytes: &[u8]) -> IngestResult<RecordStream> {
        let (text, encoding) = decode_log_bytes(bytes);
        let delimiter = sniff_delimiter(&text);

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(Cursor::new(text.into_bytes()));

        let headers: Vec<String> = csv_reader.headers()?.iter().map(normalize_header).collect();
        let dialect = self.dialect.unwrap_or_else(|| Dialect::detect(&headers));
        let columns = ColumnMap::resolve(dialect, &headers)?;

        tracing::info!(
            %dialect,
            delimiter = %char::from(delimiter).escape_default(),
            ?encoding,
            columns = headers.len(),
            forced = self.dialect.is_some(),
            "Resolved dyno log columns"
        );
        let unresolved: Vec<Field> = columns.unresolved().collect();
        if !unresolved.is_empty() {
            tracing::debug!(?unresolved, "Optional columns not present");
        }
        if !columns.has(Field::KnockFront) && !columns.has(Field::KnockRear) {
            tracing::warn!(%dialect, "No knock columns resolved; spark advisory sees no knock");
        }

        Ok(RecordStream {
            records: csv_reader.into_records(),
            normalizer: Normalizer::new(columns),
            stats: IngestStats {
                dialect,
                delimiter: char::from(delimiter),
                encoding,
                rows_read: 0,
                rows_accepted: 0,
                rejections: RejectionTally::default(),
            },
            finished: false,
        })
    }
}

/// Lazy, finite sequence of validated records.
///
/// Statistics are complete once the iterator returns `None`.
pub struct RecordStream {
    records: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
    normalizer: Normalizer,
    stats: IngestStats,
    finished: bool,
}

impl fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStream")
            .field("columns", self.normalizer.columns())
            .field("stats", &self.stats)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl RecordStream {
    /// Resolved columns.
    #[must_use]
    pub fn columns(&self) -> &ColumnMap {
        self.normalizer.columns()
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Drain any remaining rows and return the final counters.
    #[must_use]
    pub fn into_stats(mut self) -> IngestStats {
        for _ in self.by_ref() {}
        self.stats
    }

    fn reject(&mut self, reason: RejectReason) {
        tracing::trace!(row = self.stats.rows_read, %reason, "Row rejected");
        self.stats.rejections.record(reason);
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let stats = &self.stats;
        tracing::info!(
            rows_read = stats.rows_read,
            rows_accepted = stats.rows_accepted,
            rows_rejected = stats.rows_rejected(),
            "Ingestion complete"
        );
        if !stats.rejections.is_empty() {
            let summary: Vec<String> = stats
                .rejections
                .iter()
                .map(|(reason, n)| format!("{reason}={n}"))
                .collect();
            tracing::warn!(rejected = stats.rows_rejected(), reasons = %summary.join(", "), "Rows rejected during ingestion");
        }
    }
}

impl Iterator for RecordStream {
    type Item = SampleRecord;

    fn next(&mut self) -> Option<SampleRecord> {
        loop {
            let row = match self.records.next() {
                Some(row) => row,
                None => {
                    self.finish();
                    return None;
                }
            };
            self.stats.rows_read += 1;
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    tracing::debug!(row = self.stats.rows_read, error = %err, "Unreadable row");
                    self.reject(RejectReason::Malformed);
                    continue;
                }
            };
            let cells: Vec<&str> = row.iter().collect();
            match self.normalizer.normalize(&cells) {
                Ok(record) => {
                    self.stats.rows_accepted += 1;
                    return Some(record);
                }
                Err(reason) => self.reject(reason),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENERIC: &str = "rpm,map_kpa,torque,afr_cmd_f,afr_meas_f\n\
                           3000,80,70,13.0,13.5\n\
                           3000,80,,13.0,13.5\n\
                           9000,80,70,13.0,13.5\n\
                           3500,65,75,13.2,13.2\n";

    #[test]
    fn stream_accepts_and_tallies() {
        let mut stream = LogReader::new().from_bytes(GENERIC.as_bytes()).unwrap();
        let records: Vec<SampleRecord> = stream.by_ref().collect();
        assert_eq!(records.len(), 2);

        let stats = stream.stats();
        assert_eq!(stats.dialect, Dialect::Generic);
        assert_eq!(stats.delimiter, ',');
        assert_eq!(stats.rows_read, 4);
        assert_eq!(stats.rows_accepted, 2);
        assert_eq!(stats.rows_rejected(), 2);
        assert_eq!(
            stats.rejections.count(RejectReason::MissingField { field: Field::Torque }),
            1
        );
        assert_eq!(stats.rejections.count(RejectReason::OutOfRange { field: Field::Rpm }), 1);
    }

    #[test]
    fn into_stats_drains() {
        let stream = LogReader::new().from_bytes(GENERIC.as_bytes()).unwrap();
        let stats = stream.into_stats();
        assert_eq!(stats.rows_read, 4);
        assert_eq!(stats.rows_accepted, 2);
    }

    #[test]
    fn forced_dialect_is_used() {
        let stream = LogReader::new()
            .with_dialect(Dialect::Generic)
            .from_bytes(b"Engine RPM,MAP,Torque,AFR,AFR_Target\n3000,80,70,13.5,13.0\n")
            .unwrap();
        assert_eq!(stream.stats().dialect, Dialect::Generic);
        assert_eq!(stream.into_stats().rows_accepted, 1);
    }

    #[test]
    fn schema_error_surfaces_before_streaming() {
        let result = LogReader::new().from_bytes(b"time,map_kpa,torque\n1,80,70\n");
        assert!(matches!(result, Err(IngestError::Schema { field: Field::Rpm, .. })));
    }
}
