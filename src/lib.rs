//! # Bitacora Backend Library
//!
//! Core of the catalog and inventory backend: gapless document numbering ("folios")
//! and the field-level change ledger ("bitácora") that every catalog mutation
//! writes to.
//!
//! ## Architecture
//!
//! - **Axum**: HTTP server and routing
//! - **SQLx**: Asynchronous, transactional SQLite access
//! - **Tokio**: Async runtime
//! - **Serde**: JSON snapshots and API payloads
//!
//! ## Core Components
//!
//! - [`folio`]: Folio allocation per (subsystem, year) and the privileged reset
//! - [`audit`]: Snapshot diffing, entity registration and the append-only ledger
//! - [`store`]: Generic entity store that routes every mutation through the recorder
//! - [`config`]: Layered configuration
//! - [`db`]: Pool setup and schema initialization
//! - [`error`]: Domain errors and HTTP error responses
//! - [`metrics`]: Counters for allocations and audit writes
//! - [`middleware`]: Bearer/admin token checks and actor extraction
//! - [`routes`]: HTTP API endpoint handlers
//! - [`state`]: Shared application state
//! - [`types`]: Request and response DTOs

pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod folio;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;
