//! Request extractors shared by module routers.

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::AppError;

/// The router's generic "no route matched" response.
///
/// Used both as the router fallback and as the rejection of path
/// constraints, so a constrained segment that does not match is
/// indistinguishable from an unknown path.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteNotFound;

impl IntoResponse for RouteNotFound {
    fn into_response(self) -> Response {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Not Found", "status": 404})),
        )
            .into_response()
    }
}

/// Router fallback handler.
pub async fn route_not_found() -> RouteNotFound {
    RouteNotFound
}

/// Single path parameter constrained to `[0-9]+`.
///
/// Any other segment is rejected with [`RouteNotFound`] before the handler
/// runs. Digit runs that overflow `i64` still match the route; they simply
/// cannot name an existing record, see [`NumericId::as_i64`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericId {
    raw: String,
}

impl NumericId {
    /// Accept a segment made only of ASCII digits.
    pub fn parse(segment: &str) -> Option<Self> {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self {
                raw: segment.to_string(),
            })
        } else {
            None
        }
    }

    /// Numeric value, or `None` when it does not fit in an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        self.raw.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl<S> FromRequestParts<S> for NumericId
where
    S: Send + Sync,
{
    type Rejection = RouteNotFound;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(segment) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| RouteNotFound)?;

        NumericId::parse(&segment).ok_or(RouteNotFound)
    }
}

/// JSON request body with validation-envelope rejections.
///
/// The content type is not enforced and an empty body reads as `{}`, so a
/// body-less update is an empty patch rather than a rejection.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<T> JsonBody<T>
where
    T: DeserializeOwned,
{
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AppError> {
        let payload: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            bytes
        };

        serde_json::from_slice(payload).map(JsonBody).map_err(|e| {
            AppError::validation(
                vec![json!({"line": e.line(), "column": e.column()})],
                e.to_string(),
            )
        })
    }
}

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

        Self::from_bytes(&bytes)
    }
}
