//! # certmail
//!
//! A library and CLI tool for personalizing certificate PDFs and emailing
//! them to a roster of recipients.

pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod mail;
pub mod pdf;
pub mod roster;

// Re-exports
pub use batch::{BatchReport, RecipientFailure};
pub use cli::Cli;
pub use config::Config;
pub use error::{CertmailError, Result};
pub use pdf::{compose_certificate, PageGeometry};
pub use roster::{Recipient, Roster};
