use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use uuid::Uuid;

use crate::state::AppState;

/// Opaque identity of one browsing session. Handlers only compare it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerToken(pub String);

pub fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Reads the session cookie, minting and setting a new one when the caller
/// has none, and injects the token for handlers.
pub async fn caller_token_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let existing = jar
        .get(&state.session.cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());

    let (token, minted) = match existing {
        Some(token) => (token, false),
        None => (generate_token(), true),
    };

    req.extensions_mut().insert(CallerToken(token.clone()));
    let response = next.run(req).await;

    if !minted {
        return response;
    }

    tracing::debug!("Issued new caller token");
    let cookie = Cookie::build((state.session.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::seconds(state.session.max_age_seconds));

    (jar.add(cookie), response).into_response()
}
