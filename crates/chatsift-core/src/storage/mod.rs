//! Storage layer - SQLite
//!
//! Provides database management and migrations for chatsift.
//!
//! # Architecture
//!
//! - `database`: Connection pool management, storage profiles and initialization
//! - `migrations`: Schema versioning and automatic migration
//!
//! # Usage
//!
//! ```ignore
//! use chatsift_core::storage::{Database, DatabaseConfig};
//!
//! // Create an in-memory database for testing
//! let db = Database::in_memory().await?;
//!
//! // Or open a file with the relaxed bulk-import profile
//! let db = Database::new(DatabaseConfig::with_path("chatsift.db").bulk_import()).await?;
//! ```

pub mod database;
pub mod migrations;

// Re-export commonly used types
pub use database::{Database, DatabaseConfig, StorageProfile, default_database_path};
pub use migrations::{CURRENT_VERSION, MigrationStatus, migration_status, run_migrations};
