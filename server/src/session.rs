//! Browser sessions, and the gates in front of protected routes.
//!
//! A session is a single cookie holding the platform's access and refresh tokens, base64-encoded
//! JSON behind a `base64-` prefix. Gates recognise the session owner, refresh expired tokens once,
//! and make the resulting [`Viewer`] available to the endpoint as a request extension.

use crate::app::State;
use base64::prelude::*;
use serde_json::json;
use studio_model::auth::{self, Tokens, Viewer};
use tide::{
    http::{
        cookies::{Cookie, SameSite},
    },
    Middleware, Next, Redirect, Request, Response, StatusCode,
};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "studio-session";

const PREFIX: &str = "base64-";

pub fn encode(tokens: &Tokens) -> String {
    let json = json!({
        "access_token": tokens.access_token,
        "refresh_token": tokens.refresh_token,
    });
    format!("{PREFIX}{}", BASE64_STANDARD.encode(json.to_string()))
}

/// Decode a session cookie value, or [`None`] if it is malformed.
pub fn decode(value: &str) -> Option<Tokens> {
    let encoded = value.strip_prefix(PREFIX)?;
    let bytes = BASE64_STANDARD
        .decode(encoded)
        .or_else(|_| BASE64_URL_SAFE_NO_PAD.decode(encoded))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// The cookie storing `tokens`.
pub fn session_cookie(tokens: &Tokens, secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, encode(tokens))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .finish()
}

/// A cookie which, when removed from a response, clears the session.
pub fn expired_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, "").path("/").finish()
}

/// The tokens in the request's session cookie, if any.
pub fn tokens(req: &Request<State>) -> Option<Tokens> {
    decode(req.cookie(SESSION_COOKIE)?.value())
}

/// Who may pass a gate, and what happens to everybody else.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    /// Any signed-in user. Anonymous visitors are sent to the login page.
    ClientPage,
    /// Administrators. Anonymous visitors are sent to the login page, other users are sent there
    /// with an error.
    AdminPage,
    /// Administrators. Everybody else gets a JSON 401.
    Api,
    /// Like [`Gate::Api`], for endpoints whose error bodies carry an `ok` flag.
    UploadApi,
}

impl Gate {
    fn deny(&self, req: &Request<State>, signed_in: bool) -> Response {
        match self {
            Self::Api => Response::builder(StatusCode::Unauthorized)
                .body(json!({ "error": "Unauthorized" }))
                .build(),
            Self::UploadApi => Response::builder(StatusCode::Unauthorized)
                .body(json!({ "ok": false, "error": "Unauthorized" }))
                .build(),
            Self::AdminPage if signed_in => Redirect::new("/login?error=unauthorized").into(),
            _ => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair("next", req.url().path())
                    .finish();
                Redirect::new(format!("/login?{query}")).into()
            }
        }
    }
}

#[tide::utils::async_trait]
impl Middleware<State> for Gate {
    async fn handle(&self, mut req: Request<State>, next: Next<'_, State>) -> tide::Result {
        let state = req.state().clone();
        let had_cookie = req.cookie(SESSION_COOKIE).is_some();
        let viewer = match tokens(&req) {
            Some(tokens) => auth::authenticate(state.platform(), tokens).await?,
            None => None,
        };

        let Some(viewer) = viewer else {
            tracing::debug!(path = %req.url().path(), "anonymous request denied");
            let mut res = self.deny(&req, false);
            if had_cookie {
                res.remove_cookie(expired_cookie());
            }
            return Ok(res);
        };

        let refreshed = viewer
            .refreshed
            .then(|| session_cookie(&viewer.tokens, state.secure_cookies()));
        if *self != Self::ClientPage && !auth::is_admin(state.platform(), &viewer).await {
            tracing::info!(user = %viewer.user.id, path = %req.url().path(), "non-admin denied");
            let mut res = self.deny(&req, true);
            if let Some(cookie) = refreshed {
                res.insert_cookie(cookie);
            }
            return Ok(res);
        }

        req.set_ext(viewer);
        let mut res = next.run(req).await;
        if let Some(cookie) = refreshed {
            res.insert_cookie(cookie);
        }
        Ok(res)
    }
}

/// The viewer a gate let through.
pub fn viewer(req: &Request<State>) -> tide::Result<Viewer> {
    req.ext::<Viewer>()
        .cloned()
        .ok_or_else(|| tide::Error::from_str(StatusCode::Unauthorized, "Unauthorized"))
}
