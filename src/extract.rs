//! Extractors whose rejections render through `ApiError`, so malformed
//! bodies and query strings get the same `{"detail": ...}` shape as every
//! other error.

use axum::extract::{FromRequest, FromRequestParts, Query};
use axum::Json;

use crate::error::ApiError;

/// `Json` with `ApiError` rejections
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` with `ApiError` rejections
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
