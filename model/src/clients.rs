//! Client management from the admin dashboard.
//!
//! A client is spread across four places on the platform: an auth user, a `user_roles` row, a
//! `client_profiles` row and one `client_links` row per [`LinkCategory`]. Creating a client
//! writes them in that order and undoes the earlier writes if a later one fails; deleting a client
//! removes them in the opposite order.

use crate::error::{Error, Result};
use crate::platform::{fetch, fetch_optional, insert, Access, NewUser, Platform, Query};
use crate::roles::Role;
use crate::schema::{self, ClientLink, ClientProfile, ClientSummary, LinkCategory, LinkEntry};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// Request to create a client.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClient {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub project_status: Option<String>,
    #[serde(default)]
    pub links: HashMap<String, String>,
}

/// Request to update a client's project status and editable links.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientUpdate {
    #[serde(default)]
    pub project_status: Option<String>,
    #[serde(default)]
    pub links: HashMap<String, String>,
}

/// Request to delete a client.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRemoval {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// A client's profile and editable links, as shown in the admin project view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClientDetail {
    pub profile: Option<ClientSummary>,
    pub links: Vec<LinkEntry>,
}

fn trimmed(value: &Option<String>) -> &str {
    value.as_deref().map(str::trim).unwrap_or("")
}

fn blank_to_none(value: &Option<String>) -> Option<String> {
    Some(trimmed(value))
        .filter(|value| !value.is_empty())
        .map(String::from)
}

/// Pick the trimmed link for each category, failing on the first one missing.
fn require_links(
    links: &HashMap<String, String>,
    categories: impl IntoIterator<Item = LinkCategory>,
    missing: impl Fn(LinkCategory) -> String,
) -> Result<Vec<(LinkCategory, String)>> {
    categories
        .into_iter()
        .map(|category| {
            let url = links
                .get(&category.to_string())
                .map(|url| url.trim())
                .unwrap_or("");
            if url.is_empty() {
                Err(Error::invalid(missing(category)))
            } else {
                Ok((category, url.to_string()))
            }
        })
        .collect()
}

fn link_rows(user_id: &str, links: Vec<(LinkCategory, String)>) -> Vec<ClientLink> {
    links
        .into_iter()
        .map(|(category, url)| ClientLink {
            user_id: user_id.into(),
            category: category.to_string(),
            url,
        })
        .collect()
}

/// Every client, ordered by name.
pub async fn list<P: Platform + ?Sized>(platform: &P) -> Result<Vec<ClientSummary>> {
    let query = Query::table(schema::CLIENT_PROFILES)
        .select("user_id, client_name, project_status")
        .order("client_name", true);
    fetch(platform, Access::Service, &query).await
}

/// Create a client, returning the new user's ID.
pub async fn create<P: Platform + ?Sized>(platform: &P, new: NewClient) -> Result<String> {
    let email = trimmed(&new.email);
    let password = trimmed(&new.password);
    let client_name = trimmed(&new.client_name);
    if email.is_empty() || password.is_empty() || client_name.is_empty() {
        return Err(Error::invalid(
            "Email, password y client_name son obligatorios.",
        ));
    }
    let links = require_links(&new.links, LinkCategory::all(), |category| {
        format!("Falta el link para la categoría {category}.")
    })?;

    let user = platform
        .create_user(&NewUser {
            email: email.into(),
            password: password.into(),
            email_confirm: true,
            user_metadata: json!({ "role": Role::Client }),
        })
        .await?;
    let user_id = user.id;
    tracing::info!(user = %user_id, client = client_name, "created client user");

    let by_user = Query::table(schema::USER_ROLES).eq("user_id", &user_id);
    let role = json!({ "user_id": user_id, "role": Role::Client });
    if let Err(err) = platform
        .insert(Access::Service, schema::USER_ROLES, vec![role])
        .await
    {
        rollback(platform, &user_id, &[]).await;
        return Err(err);
    }

    let profile = ClientProfile {
        id: None,
        user_id: user_id.clone(),
        client_name: Some(client_name.into()),
        project_status: blank_to_none(&new.project_status),
    };
    if let Err(err) = insert(platform, Access::Service, schema::CLIENT_PROFILES, [profile]).await {
        rollback(platform, &user_id, &[by_user]).await;
        return Err(err);
    }

    let rows = link_rows(&user_id, links);
    if let Err(err) = insert(platform, Access::Service, schema::CLIENT_LINKS, rows).await {
        let by_profile = Query::table(schema::CLIENT_PROFILES).eq("user_id", &user_id);
        rollback(platform, &user_id, &[by_profile, by_user]).await;
        return Err(err);
    }

    Ok(user_id)
}

/// Undo a partially created client: delete the rows matched by `writes`, then the auth user.
async fn rollback<P: Platform + ?Sized>(platform: &P, user_id: &str, writes: &[Query]) {
    tracing::warn!(user = user_id, "rolling back client creation");
    for query in writes {
        if let Err(err) = platform.delete(Access::Service, query).await {
            tracing::error!(user = user_id, "cannot roll back {query}: {err}");
        }
    }
    if let Err(err) = platform.delete_user(user_id).await {
        tracing::error!(user = user_id, "cannot roll back auth user: {err}");
    }
}

/// Delete a client and everything recorded about them.
///
/// Stops at the first failure, leaving whatever has not been deleted yet in place.
pub async fn delete<P: Platform + ?Sized>(platform: &P, removal: ClientRemoval) -> Result<()> {
    let user_id = trimmed(&removal.user_id);
    if user_id.is_empty() {
        return Err(Error::invalid("userId es obligatorio."));
    }

    for table in [
        schema::CLIENT_LINKS,
        schema::CLIENT_PROFILES,
        schema::USER_ROLES,
    ] {
        let query = Query::table(table).eq("user_id", user_id);
        platform.delete(Access::Service, &query).await?;
    }
    platform.delete_user(user_id).await?;
    tracing::info!(user = user_id, "deleted client");
    Ok(())
}

/// A client's profile and editable links.
pub async fn detail<P: Platform + ?Sized>(platform: &P, user_id: &str) -> Result<ClientDetail> {
    let query = Query::table(schema::CLIENT_PROFILES)
        .select("user_id, client_name, project_status")
        .eq("user_id", user_id);
    let profile = fetch_optional(platform, Access::Service, &query).await?;

    let query = Query::table(schema::CLIENT_LINKS)
        .select("category, url")
        .eq("user_id", user_id)
        .within("category", LinkCategory::editable());
    let links = fetch(platform, Access::Service, &query).await?;

    Ok(ClientDetail { profile, links })
}

/// Replace a client's project status and editable links.
pub async fn update<P: Platform + ?Sized>(
    platform: &P,
    user_id: &str,
    update: ClientUpdate,
) -> Result<()> {
    let links = require_links(&update.links, LinkCategory::editable(), |category| {
        format!("Falta el link para {category}.")
    })?;

    let by_user = Query::table(schema::CLIENT_PROFILES).eq("user_id", user_id);
    platform
        .update(
            Access::Service,
            &by_user,
            json!({ "project_status": blank_to_none(&update.project_status) }),
        )
        .await?;

    let editable = Query::table(schema::CLIENT_LINKS)
        .eq("user_id", user_id)
        .within("category", LinkCategory::editable());
    platform.delete(Access::Service, &editable).await?;
    insert(
        platform,
        Access::Service,
        schema::CLIENT_LINKS,
        link_rows(user_id, links),
    )
    .await?;
    tracing::info!(user = user_id, "updated client project");
    Ok(())
}
