// Core modules implementing inference, schema derivation, the SQLite collaborator, and CSV streaming.
pub mod csv_export;
pub mod csv_import;
pub mod cursor;
pub mod db;
pub mod error;
pub mod infer;
pub mod schema;
pub mod value;
