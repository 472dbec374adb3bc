//! Purpose: Library crate behind the `sqlbridge` shell.
//! Exports: `api` (sessions, CSV import/export, inference, errors) and `core`.
//! Role: Keeps the streaming CSV <-> SQLite bridge testable without the REPL.
//! Invariants: Library code never prints; the binary owns stdout and stderr.
pub mod api;
pub mod core;
