//! Purpose: Define the public Rust API boundary for sqlbridge.
//! Exports: Core types and operations needed by the CLI and tests.
//! Role: Public surface; the CLI only reaches storage and CSV code through here.
//! Invariants: Re-exports only; behavior lives in `core` and `session`.

mod session;

pub use crate::core::csv_export::{ExportOptions, export_result};
pub use crate::core::csv_import::{ImportOptions, ImportResult, import_csv};
pub use crate::core::cursor::{CursorState, QueryCursor, ResultPreview};
pub use crate::core::db::Database;
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::infer::{InferredType, infer, widen};
pub use crate::core::schema::{ColumnSpec, build as build_schema};
pub use crate::core::value::Value;
pub use session::{QueryOutcome, Session, SessionOptions};
