//! `mailshelf`: deliver e-books sent by email into a calibre library.
//!
//! A message is read once, its first book attachment is inserted into the
//! library, the new entry is found again by exact author and title, and every
//! other configured format is generated and attached to the same entry.

pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod library;
pub mod model;
pub mod parser;
pub mod process;
