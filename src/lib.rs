//! Wholesale Lead CRM Library
//!
//! HTTP service for tracking wholesale real-estate leads: lead and activity
//! records, filtered listings, CSV import and export, and dashboard counters.
//!
//! # Modules
//!
//! - `api`: Route table and middleware.
//! - `core`: Domain logic (validation, query, import, export, stats).
//! - `config`: Configuration management.
//! - `db`: Database connection pool and migrations.
//! - `errors`: Error handling types.
//! - `export`: CSV export.
//! - `handlers`: HTTP request handlers.
//! - `import`: CSV import.
//! - `models`: Core data models.
//! - `query`: Lead filtering, sorting and pagination.
//! - `services`: Lead and activity operations.
//! - `stats`: Dashboard counters and equity bands.
//! - `store`: Data-access trait with PostgreSQL and in-memory backends.
//! - `validation`: Payload schemas.

pub mod api;
pub mod core;

pub mod config;
pub mod db;
pub mod errors;
pub mod export;
pub mod handlers;
pub mod import;
pub mod models;
pub mod query;
pub mod services;
pub mod stats;
pub mod store;
pub mod validation;
