#![forbid(unsafe_code)]
//! Contact record SSOT.
//!
//! The store is schemaless and co-locates multiple logical record kinds in
//! one collection, so every persisted contact carries the `"Contact"`
//! discriminator and every query filters on it.

mod contact;

pub use contact::{
    Contact, ContactDocument, ContactId, ValidationError, DOC_TYPE, ID_MAX_LEN, NAME_MAX_LEN,
};

pub const CRATE_NAME: &str = "contactd-model";
