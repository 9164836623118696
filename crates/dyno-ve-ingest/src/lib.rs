//! # Dyno-VE Ingest
//!
//! Reads delimited dynamometer logs into validated [`SampleRecord`]s.
//!
//! Three export families are supported (see [`Dialect`]). The dialect is
//! detected from header keywords unless forced, columns are resolved to
//! logical [`Field`]s, and each data row is validated and normalized.
//! Rows that fail validation are tallied by [`RejectReason`] and skipped;
//! only an unresolvable required column is an error.
//!
//! ```rust
//! use dyno_ve_ingest::LogReader;
//!
//! let log = "rpm,map_kpa,torque,afr_cmd_f,afr_meas_f\n3000,80,70,13.0,13.5\n";
//! let mut stream = LogReader::new().from_bytes(log.as_bytes()).unwrap();
//! let records: Vec<_> = stream.by_ref().collect();
//! assert_eq!(records.len(), 1);
//! assert_eq!(stream.stats().rows_accepted, 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod columns;
pub mod decode;
pub mod dialect;
pub mod error;
pub mod field;
pub mod normalize;
pub mod reader;
pub mod record;

pub use columns::ColumnMap;
pub use decode::TextEncoding;
pub use dialect::Dialect;
pub use error::{IngestError, IngestResult};
pub use field::Field;
pub use normalize::Normalizer;
pub use reader::{IngestStats, LogReader, RecordStream};
pub use record::{afr_error_pct, RejectReason, RejectionTally, SampleRecord};
