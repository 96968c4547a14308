// SPDX-License-Identifier: Apache-2.0

use crate::{ApiError, ApiErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiErrorMapping {
    pub status_code: u16,
}

#[must_use]
pub fn map_error(error: &ApiError) -> ApiErrorMapping {
    let status_code = match error.code {
        ApiErrorCode::InvalidParameter => 400,
        ApiErrorCode::WriteTokenRejected => 403,
        ApiErrorCode::ContactNotFound => 404,
        ApiErrorCode::StoreConflict => 409,
        ApiErrorCode::ValidationFailed => 422,
        ApiErrorCode::StoreUnavailable | ApiErrorCode::NotReady => 503,
        ApiErrorCode::Timeout => 504,
        ApiErrorCode::Internal => 500,
    };
    ApiErrorMapping { status_code }
}
