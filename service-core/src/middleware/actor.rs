//! Actor context extractor.
//!
//! The authentication gate in front of the services resolves the user and
//! forwards the identity in `X-User-ID` / `X-User-Name`. Handlers never talk to
//! the identity provider; they only read these headers.

use crate::error::AppError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const USER_NAME_HEADER: &str = "X-User-Name";

/// Already-authenticated identity performing a state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub user_id: String,
    pub display_name: Option<String>,
}

impl ActorContext {
    pub fn new(user_id: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name,
        }
    }

    /// Actor used for transitions triggered by the system itself.
    pub fn system() -> Self {
        Self::new("system", Some("System".to_string()))
    }

    /// Name recorded in audit entries.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.user_id)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!(
                    "Missing X-User-ID header (required from the auth gate)"
                ))
            })?;

        let display_name = parts
            .headers
            .get(USER_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        tracing::Span::current().record("actor_id", user_id);

        Ok(ActorContext::new(user_id, display_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<ActorContext, AppError> {
        let (mut parts, _) = req.into_parts();
        ActorContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extracts_user_and_name() {
        let req = Request::builder()
            .header(USER_ID_HEADER, "u-42")
            .header(USER_NAME_HEADER, "Ana Ruiz")
            .body(())
            .unwrap();
        let actor = extract(req).await.unwrap();
        assert_eq!(actor.user_id, "u-42");
        assert_eq!(actor.label(), "Ana Ruiz");
    }

    #[tokio::test]
    async fn test_missing_user_is_unauthorized() {
        let req = Request::builder().body(()).unwrap();
        let err = extract(req).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_label_falls_back_to_id() {
        let req = Request::builder()
            .header(USER_ID_HEADER, "u-7")
            .body(())
            .unwrap();
        assert_eq!(extract(req).await.unwrap().label(), "u-7");
    }
}
