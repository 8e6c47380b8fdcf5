use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;
use crate::session::model::{RotateOutcome, RotateTokens, Session};

/// Authoritative mapping from tokens to sessions
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Exact match on a currently active refresh token. Never mutates.
    async fn lookup_by_refresh_token(&self, token: &str) -> Result<Option<Session>, StoreError>;

    /// Exact match on a current access token. Never mutates.
    async fn lookup_by_access_token(&self, token: &str) -> Result<Option<Session>, StoreError>;

    /// Replace both tokens of a session if, and only if, its refresh token
    /// still equals `request.old_refresh_token`.
    async fn rotate_tokens(&self, request: &RotateTokens) -> Result<RotateOutcome, StoreError>;

    /// Register a session. Login owns this in production; it is exposed for
    /// seeding and tests.
    async fn insert_session(&self, session: Session) -> Result<(), StoreError>;
}

/// Run a store call under the caller's deadline
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(deadline.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deadline_passes_through_result() {
        let value = with_deadline(Duration::from_millis(50), async { Ok::<_, StoreError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn deadline_exceeded_is_a_timeout() {
        let result = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, StoreError>(())
        })
        .await;
        assert_eq!(result, Err(StoreError::Timeout(10)));
    }
}
