//! Mail parsing: locating and extracting book attachments.

pub mod attachment;
