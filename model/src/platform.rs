//! Facilities for talking to the hosted backend platform.
//!
//! All persistence, authentication and file storage live on a managed platform exposing an auth
//! API, a PostgREST table API and an object storage API. The [`Platform`] trait is the seam
//! between the site and that platform: [`Client`] talks to the real thing over HTTP, and
//! [`MockPlatform`] keeps everything in memory for tests.

use crate::error::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

mod client;
#[cfg(any(test, feature = "testing"))]
mod mock;

pub use client::{Client, Options};
#[cfg(any(test, feature = "testing"))]
pub use mock::{MockPlatform, StoredFile};

/// The credentials a call is made with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access<'a> {
    /// Act as the signed-in user owning this access token. Row-level security applies.
    User(&'a str),
    /// Act with the service-role key, bypassing row-level security.
    Service,
}

/// A hosted backend platform.
#[async_trait]
pub trait Platform: Send + Sync + 'static {
    /// Exchange an email and password for a session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    /// Exchange a refresh token for a new session.
    async fn refresh(&self, refresh_token: &str) -> Result<Session>;

    /// The user owning `access_token`, or [`None`] if the token is invalid or expired.
    async fn user(&self, access_token: &str) -> Result<Option<User>>;

    /// Revoke the session owning `access_token`.
    async fn sign_out(&self, access_token: &str) -> Result<()>;

    /// Create a new auth user. Requires the service role.
    async fn create_user(&self, user: &NewUser) -> Result<User>;

    /// Delete an auth user. Requires the service role.
    async fn delete_user(&self, user_id: &str) -> Result<()>;

    /// Run a query, returning each matching row as a JSON object.
    async fn select(&self, access: Access<'_>, query: &Query) -> Result<Vec<Value>>;

    /// Insert rows into `table`.
    async fn insert(&self, access: Access<'_>, table: &str, rows: Vec<Value>) -> Result<()>;

    /// Set the columns in `patch` on every row of `query.table` matching the query's filters.
    async fn update(&self, access: Access<'_>, query: &Query, patch: Value) -> Result<()>;

    /// Delete every row of `query.table` matching the query's filters.
    async fn delete(&self, access: Access<'_>, query: &Query) -> Result<()>;

    /// Store `file` at `path` in `bucket`.
    ///
    /// Unless `upsert` is set, storing to a path which already exists is an error.
    async fn upload(&self, bucket: &str, path: &str, file: &Upload) -> Result<()>;

    /// The public URL of the object at `path` in `bucket`.
    fn public_url(&self, bucket: &str, path: &str) -> String;

    /// List up to `limit` objects under `prefix` in `bucket`, sorted by name.
    async fn list_objects(&self, bucket: &str, prefix: &str, limit: usize)
        -> Result<Vec<StoredObject>>;

    /// Remove objects from `bucket`.
    async fn remove_objects(&self, bucket: &str, paths: &[String]) -> Result<()>;
}

/// A user of the platform's auth service.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub app_metadata: Value,
}

/// An authenticated session.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

/// Parameters for creating a new auth user.
#[derive(Clone, Debug, Serialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub email_confirm: bool,
    pub user_metadata: Value,
}

/// A file to store.
#[derive(Clone, Debug)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub upsert: bool,
}

/// An object listed from a storage bucket.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoredObject {
    pub name: String,
}

/// A filter on a single column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    /// The column equals the value.
    Eq(String, String),
    /// The column equals one of the values.
    In(String, Vec<String>),
}

/// An ordering on a single column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A query against a table.
///
/// Selects use every part of the query; updates and deletes use only the table and the filters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
}

impl Query {
    /// Query all columns of `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".into(),
            filters: vec![],
            order: vec![],
        }
    }

    /// Select only `columns`, a comma-separated list.
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    /// Keep rows where `column` equals `value`.
    pub fn eq(mut self, column: impl Into<String>, value: impl Display) -> Self {
        self.filters.push(Filter::Eq(column.into(), value.to_string()));
        self
    }

    /// Keep rows where `column` equals one of `values`.
    pub fn within<I>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Display,
    {
        self.filters.push(Filter::In(
            column.into(),
            values.into_iter().map(|v| v.to_string()).collect(),
        ));
        self
    }

    /// Sort by `column`, after any orderings already added.
    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order.push(Order {
            column: column.into(),
            ascending,
        });
        self
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}({})", self.table, self.columns)?;
        for filter in &self.filters {
            match filter {
                Filter::Eq(col, val) => write!(f, " {col}={val}")?,
                Filter::In(col, vals) => write!(f, " {col} in [{}]", vals.join(","))?,
            }
        }
        Ok(())
    }
}

/// Run a query and deserialize the rows.
pub async fn fetch<T, P>(platform: &P, access: Access<'_>, query: &Query) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    P: Platform + ?Sized,
{
    platform
        .select(access, query)
        .await?
        .into_iter()
        .map(|row| serde_json::from_value(row).map_err(crate::Error::from))
        .collect()
}

/// Run a query expected to match at most one row.
pub async fn fetch_optional<T, P>(
    platform: &P,
    access: Access<'_>,
    query: &Query,
) -> Result<Option<T>>
where
    T: DeserializeOwned,
    P: Platform + ?Sized,
{
    let mut rows = fetch(platform, access, query).await?;
    if rows.len() > 1 {
        return Err(crate::Error::Platform {
            status: 406,
            message: format!("query {query} returned {} rows, expected at most 1", rows.len()),
        });
    }
    Ok(rows.pop())
}

/// Serialize and insert rows.
pub async fn insert<T, P>(
    platform: &P,
    access: Access<'_>,
    table: &str,
    rows: impl IntoIterator<Item = T>,
) -> Result<()>
where
    T: Serialize,
    P: Platform + ?Sized,
{
    let rows = rows
        .into_iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    platform.insert(access, table, rows).await
}
