use axum::extract::FromRequest;
use crate::error::AppError;

/// `axum::Json`, but a body that fails to parse is a 400 with the reason in `details`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);
