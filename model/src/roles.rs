//! User roles and client slugs.

use crate::platform::User;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// The role a signed-in user plays on the site.
#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, Hash, EnumString, Deserialize, Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Client,
}

/// Interpret a free-form role string.
///
/// Role strings come from user metadata and from the `user_roles` table, where both English and
/// Spanish spellings appear.
pub fn normalize_role(value: &str) -> Option<Role> {
    match value.trim().to_lowercase().as_str() {
        "admin" | "administrator" => Some(Role::Admin),
        "client" | "cliente" => Some(Role::Client),
        _ => None,
    }
}

/// Interpret an arbitrary JSON value as a role; anything but a string is no role.
pub fn normalize_role_value(value: Option<&Value>) -> Option<Role> {
    value.and_then(Value::as_str).and_then(normalize_role)
}

/// The role recorded in a user's metadata, if any.
///
/// `user_metadata` is editable by the user and takes precedence over `app_metadata`.
pub fn resolve_role_from_metadata(user: &User) -> Option<Role> {
    normalize_role_value(user.user_metadata.get("role"))
        .or_else(|| normalize_role_value(user.app_metadata.get("role")))
}

/// The URL slug for a client name.
///
/// Accents are stripped and every run of non-alphanumeric characters becomes a single `-`, so
/// `"  María José Pérez "` becomes `"maria-jose-perez"`. An empty result means the name has no
/// usable slug.
pub fn to_client_slug(client_name: &str) -> String {
    let mut slug = String::with_capacity(client_name.len());
    let mut pending_dash = false;
    for c in client_name
        .trim()
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
    {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}
