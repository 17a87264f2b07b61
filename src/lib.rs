//! slotguard - purchase-code verification and slot accounting for licensed deployments
//!
//! Authenticates purchase codes against the marketplace that sold them, proves
//! that an activating server controls the domain it claims, and limits how many
//! domains may hold a license at once.

pub mod authority;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod handshake;
pub mod ledger;
pub mod models;
pub mod network;
pub mod rate_limit;
pub mod slots;
pub mod status;
pub mod util;
