/// Token Refresh Route
///
/// Exchanges a refresh token for a new access/refresh token pair. The old
/// refresh token is consumed by the exchange and never works again.

use actix_web::{http::Method, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::auth::{fingerprint, TokenGenerator};
use crate::configuration::RotationSettings;
use crate::error::{AppError, AuthError, ClientError, ErrorContext};
use crate::session::{with_deadline, RotateOutcome, RotateTokens, SessionStore};

/// Token refresh request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// New token pair
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in_ms: Option<i64>,
}

/// POST /_matrix/client/v3/refresh
///
/// Every verb is routed here so that anything but POST gets the
/// "Bad method" answer instead of actix's generic one.
///
/// # Errors
/// - 405: not a POST
/// - 400: body is not JSON of the expected shape, or `refresh_token` is missing/empty
/// - 403: token unknown, already consumed, or consumed concurrently
/// - 500: store or token generation failure
pub async fn refresh(
    req: HttpRequest,
    body: web::Bytes,
    store: web::Data<dyn SessionStore>,
    generator: web::Data<dyn TokenGenerator>,
    settings: web::Data<RotationSettings>,
) -> HttpResponse {
    let context = ErrorContext::new();
    let span = tracing::info_span!(
        "token_refresh",
        request_id = %context.request_id,
        token = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    let result = match parse_request(req.method(), &body) {
        Ok(presented) => {
            span.record("token", fingerprint(&presented).as_str());
            rotate_session(
                &presented,
                store.get_ref(),
                generator.get_ref(),
                settings.get_ref(),
            )
            .instrument(span.clone())
            .await
        }
        Err(e) => Err(e),
    };

    let _entered = span.enter();
    match result {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => context.respond(&e),
    }
}

/// Check the verb and pull a non-empty refresh token out of the body
fn parse_request(method: &Method, body: &[u8]) -> Result<String, AppError> {
    if *method != Method::POST {
        return Err(ClientError::UnsupportedMethod(method.to_string()).into());
    }

    let request: RefreshRequest = serde_json::from_slice(body)
        .map_err(|e| ClientError::MalformedRequest(e.to_string()))?;

    match request.refresh_token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(ClientError::MissingParameter("refresh_token".to_string()).into()),
    }
}

fn invalid_token(outcome: &str) -> AppError {
    tracing::Span::current().record("outcome", outcome);
    AuthError::InvalidRefreshToken.into()
}

async fn rotate_session(
    presented: &str,
    store: &dyn SessionStore,
    generator: &dyn TokenGenerator,
    settings: &RotationSettings,
) -> Result<RefreshResponse, AppError> {
    let deadline = settings.store_timeout();

    let session = with_deadline(deadline, store.lookup_by_refresh_token(presented))
        .await?
        .ok_or_else(|| invalid_token("unknown_token"))?;

    let new_access_token = generator.generate()?;
    let new_refresh_token = generator.generate()?;
    if new_access_token == new_refresh_token
        || new_refresh_token == presented
        || new_access_token == session.access_token
    {
        return Err(AppError::Internal(
            "token generator returned a token that is already in use".to_string(),
        ));
    }

    let request = RotateTokens {
        device_id: session.device_id,
        user_id: session.user_id,
        old_refresh_token: presented.to_string(),
        new_access_token,
        new_refresh_token,
    };

    match with_deadline(deadline, store.rotate_tokens(&request)).await? {
        RotateOutcome::Committed => {
            tracing::Span::current().record("outcome", "rotated");
            tracing::info!(
                user_id = %request.user_id,
                device_id = %request.device_id,
                "Tokens rotated"
            );
            Ok(RefreshResponse {
                access_token: request.new_access_token,
                refresh_token: request.new_refresh_token,
                expires_in_ms: settings.access_token_lifetime_ms,
            })
        }
        RotateOutcome::LostRace => Err(invalid_token("lost_race")),
    }
}
