//! Signing in, recognising returning users, and deciding what they may see.

use crate::error::{Error, Result};
use crate::platform::{fetch_optional, Access, Platform, Query, Session, User};
use crate::roles::{normalize_role_value, resolve_role_from_metadata, to_client_slug, Role};
use crate::schema::{self, UserRole};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The tokens kept in a browser session.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<&Session> for Tokens {
    fn from(session: &Session) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
        }
    }
}

/// A request made by a signed-in user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Viewer {
    pub user: User,
    pub tokens: Tokens,
    /// Whether `tokens` were reissued while authenticating, and must be sent back to the browser.
    pub refreshed: bool,
}

impl Viewer {
    /// Platform access acting as this user.
    pub fn access(&self) -> Access<'_> {
        Access::User(&self.tokens.access_token)
    }
}

/// Recognise the user owning a browser session.
///
/// An expired access token is refreshed once. Returns [`None`] if the session is no longer valid.
pub async fn authenticate<P: Platform + ?Sized>(
    platform: &P,
    tokens: Tokens,
) -> Result<Option<Viewer>> {
    if let Some(user) = platform.user(&tokens.access_token).await? {
        return Ok(Some(Viewer {
            user,
            tokens,
            refreshed: false,
        }));
    }

    match platform.refresh(&tokens.refresh_token).await {
        Ok(session) => {
            tracing::debug!(user = %session.user.id, "refreshed session");
            Ok(Some(Viewer {
                tokens: Tokens::from(&session),
                user: session.user,
                refreshed: true,
            }))
        }
        Err(Error::Platform { message, .. }) => {
            tracing::debug!("session expired: {message}");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// The role of a signed-in user.
///
/// The role recorded in the user's metadata wins; otherwise the `user_roles` table is consulted
/// with the user's own credentials. A failed lookup counts as no role.
pub async fn role_of<P: Platform + ?Sized>(platform: &P, viewer: &Viewer) -> Option<Role> {
    if let Some(role) = resolve_role_from_metadata(&viewer.user) {
        return Some(role);
    }

    let query = Query::table(schema::USER_ROLES)
        .select("user_id, role")
        .eq("user_id", &viewer.user.id);
    match fetch_optional::<UserRole, _>(platform, viewer.access(), &query).await {
        Ok(row) => normalize_role_value(
            row.and_then(|row| row.role)
                .map(Value::String)
                .as_ref(),
        ),
        Err(err) => {
            tracing::warn!(user = %viewer.user.id, "cannot look up role: {err}");
            None
        }
    }
}

/// Whether a signed-in user is an administrator.
pub async fn is_admin<P: Platform + ?Sized>(platform: &P, viewer: &Viewer) -> bool {
    role_of(platform, viewer).await == Some(Role::Admin)
}

/// Where a user lands after signing in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// The admin dashboard.
    Admin,
    /// The portal of the client with this slug.
    Client { slug: String },
}

impl Destination {
    /// The path of this destination.
    pub fn path(&self) -> String {
        match self {
            Self::Admin => "/admin".into(),
            Self::Client { slug } => format!("/clientes/{slug}"),
        }
    }
}

/// The outcome of a successful sign-in.
#[derive(Clone, Debug)]
pub struct Login {
    pub session: Session,
    pub destination: Destination,
}

/// Message shown to users who can sign in but have nowhere to go.
pub const NO_VALID_PROFILE: &str = "Tu usuario no tiene un perfil válido para ingresar.";

/// Sign in with email and password, and work out where the user belongs.
///
/// A user with no role but a named client profile is treated as a client. A user who ends up with
/// neither an admin role nor a usable client name is signed out again.
pub async fn login<P: Platform + ?Sized>(
    platform: &P,
    email: &str,
    password: &str,
) -> Result<Login> {
    let session = platform.sign_in(email.trim(), password).await?;
    let viewer = Viewer {
        user: session.user.clone(),
        tokens: Tokens::from(&session),
        refreshed: false,
    };

    let query = Query::table(schema::CLIENT_PROFILES).eq("user_id", &session.user.id);
    let profile: Option<Map<String, Value>> =
        fetch_optional(platform, viewer.access(), &query).await?;

    let mut role = role_of(platform, &viewer).await;
    if role.is_none() {
        role = normalize_role_value(profile.as_ref().and_then(|p| p.get("role")));
    }
    let client_name = profile
        .as_ref()
        .and_then(|p| p.get("client_name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty());
    if role.is_none() && client_name.is_some() {
        role = Some(Role::Client);
    }

    let destination = match (role, client_name.map(to_client_slug)) {
        (Some(Role::Admin), _) => Some(Destination::Admin),
        (Some(Role::Client), Some(slug)) if !slug.is_empty() => {
            Some(Destination::Client { slug })
        }
        _ => None,
    };

    match destination {
        Some(destination) => {
            tracing::info!(user = %session.user.id, path = %destination.path(), "signed in");
            Ok(Login {
                session,
                destination,
            })
        }
        None => {
            tracing::info!(user = %session.user.id, "signed in without a valid profile");
            if let Err(err) = platform.sign_out(&session.access_token).await {
                tracing::warn!("cannot sign out user without profile: {err}");
            }
            Err(Error::invalid(NO_VALID_PROFILE))
        }
    }
}
