pub mod audit;
pub mod clock;
pub mod config;
pub mod confirmation;
pub mod context;
pub mod engine;
pub mod error;
pub mod fixture;
pub mod io;
pub mod notify;
pub mod paths;
pub mod reconcile;
pub mod release;
pub mod rules;
pub mod status;
pub mod store;
pub mod types;
pub mod vault;

pub use engine::Engine;
pub use error::{DeadhandError, Result};
