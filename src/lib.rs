pub mod aggregate;
pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod matches;
pub mod model;
pub mod notify;
pub mod recordings;
pub mod service;
pub mod suggestions;
pub mod teams;
pub mod timer;
pub mod xg;
pub mod zones;

pub use error::{Result, StatoError};
pub use service::Stato;
