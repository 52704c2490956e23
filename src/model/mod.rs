//! Core data model types: accepted formats, book files and their metadata.

pub mod book;
pub mod format;
pub mod metadata;
