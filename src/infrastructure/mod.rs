//! Infrastructure layer - Framework implementations
//!
//! This layer contains:
//! - Database connection and schema bootstrap (db)
//! - Configuration loading (config)
//! - Collaborator implementations (authorizer, notifier)
//! - Demo data (seed)
//! - Background overdue sweep (sweeper)
//! - Router assembly (server)
//! - Application state (state)

pub mod authorizer;
pub mod config;
pub mod db;
pub mod notifier;
pub mod seed;
pub mod server;
pub mod state;
pub mod sweeper;

pub use authorizer::SeaOrmAuthorizer;
pub use notifier::LogNotifier;
pub use state::AppState;
