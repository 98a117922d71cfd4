//! AttrSync Sync — Google Admin Directory client, reconciliation engine, and
//! the sync orchestrator with its audit and notification collaborators.

pub mod audit;
pub mod client;
pub mod models;
pub mod notify;
pub mod state;
pub mod sync;
