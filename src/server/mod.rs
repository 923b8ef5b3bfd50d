//! Server module for metergate
//!
//! Contains the server initialization and runtime logic.
//!
//! # Module Structure
//!
//! - `config`: Configuration structures for all server components
//! - `loader`: Configuration loading from files and environment
//! - `init_stores`: Usage store selection and ledger construction
//! - `init`: Main server initialization and run loop

pub mod config;
mod init;
mod init_stores;
mod loader;

// Re-export public API
pub use init::run;
pub use init_stores::build_ledger;
pub use loader::load_config;
