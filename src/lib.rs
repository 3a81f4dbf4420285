//! RiderGo: client core for phone-verified riders and clients.

pub mod api;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
