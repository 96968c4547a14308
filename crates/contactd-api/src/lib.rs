#![forbid(unsafe_code)]
//! Presentation surface for contactd: transfer models, structured API
//! errors, and the error-code to HTTP-status mapping.

mod convert;
mod dto;
mod error_mapping;
mod errors;

pub use convert::{contact_dto, contact_list_dto};
pub use dto::{ContactDto, ContactForm, ContactListDto, ListStatsDto};
pub use error_mapping::{map_error, ApiErrorMapping};
pub use errors::{ApiError, ApiErrorCode};

pub const CRATE_NAME: &str = "contactd-api";
pub const API_VERSION: &str = "v1";
