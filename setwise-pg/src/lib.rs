//! Setwise PG - PostgreSQL Storage Gateway
//!
//! Implements `StorageGateway` over a `deadpool-postgres` pool with plain
//! parameterised SQL. Table creation is left to the deployment's migrations;
//! the expected columns are:
//!
//! ```text
//! id uuid primary key, "group" text, key text unique, value text null,
//! structured_value jsonb null, type text default 'string',
//! description text null, is_locked boolean default false,
//! created_at timestamptz, updated_at timestamptz
//! ```

pub mod config;
pub mod row;
pub mod storage;

pub use config::DbConfig;
pub use storage::PgStorage;
