//! A platform client speaking the hosted platform's REST APIs.

use super::{Access, Filter, NewUser, Platform, Query, Session, StoredObject, Upload, User};
use crate::error::{Error, Result};
use async_trait::async_trait;
use clap::Args;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use surf::{http::Method, RequestBuilder, Url};

/// Platform connection options.
#[derive(Clone, Debug, Args)]
pub struct Options {
    /// Base URL of the hosted platform project.
    #[clap(long, env = "SUPABASE_URL")]
    pub supabase_url: Url,

    /// Public (anonymous) API key, used for calls made on behalf of signed-in users.
    #[clap(long, env = "SUPABASE_ANON_KEY")]
    pub supabase_anon_key: String,

    /// Service-role API key, used for admin calls. Never sent to browsers.
    #[clap(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
    pub supabase_service_role_key: String,

    /// Timeout for each platform request, in seconds.
    #[clap(long, env = "SUPABASE_TIMEOUT", default_value = "30")]
    pub supabase_timeout: u64,
}

impl Options {
    /// Create a client for the configured platform project.
    pub fn connect(&self) -> Result<Client, anyhow::Error> {
        let http: surf::Client = surf::Config::new()
            .set_timeout(Some(Duration::from_secs(self.supabase_timeout)))
            .try_into()
            .map_err(anyhow::Error::msg)?;
        Ok(Client {
            http,
            base: self.supabase_url.clone(),
            anon_key: self.supabase_anon_key.clone(),
            service_key: self.supabase_service_role_key.clone(),
        })
    }
}

/// A client for the hosted platform's auth, table and storage APIs.
pub struct Client {
    http: surf::Client,
    base: Url,
    anon_key: String,
    service_key: String,
}

/// The key sent as `apikey` and the bearer token sent as `Authorization`.
enum Credentials<'a> {
    /// Anonymous calls, like signing in.
    Anon,
    /// Calls on behalf of a signed-in user.
    User(&'a str),
    /// Privileged calls.
    Service,
}

impl<'a> From<Access<'a>> for Credentials<'a> {
    fn from(access: Access<'a>) -> Self {
        match access {
            Access::User(token) => Self::User(token),
            Access::Service => Self::Service,
        }
    }
}

impl Client {
    /// The URL of `path` under the platform base URL.
    ///
    /// Every segment is percent-encoded, so object names with spaces or `#` stay intact.
    fn url<'s>(&self, path: impl IntoIterator<Item = &'s str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(path);
        }
        url
    }

    fn request<'s>(
        &self,
        method: Method,
        path: impl IntoIterator<Item = &'s str>,
        credentials: Credentials<'_>,
    ) -> RequestBuilder {
        let url = self.url(path);
        tracing::debug!(%method, path = url.path(), "platform request");
        let (key, bearer) = match credentials {
            Credentials::Anon => (&self.anon_key, self.anon_key.as_str()),
            Credentials::User(token) => (&self.anon_key, token),
            Credentials::Service => (&self.service_key, self.service_key.as_str()),
        };
        self.http
            .request(method, url)
            .header("apikey", key.as_str())
            .header("Authorization", format!("Bearer {bearer}"))
    }

    fn table_request(
        &self,
        method: Method,
        access: Access<'_>,
        query: &Query,
    ) -> Result<RequestBuilder> {
        self.request(method, ["rest", "v1", query.table.as_str()], access.into())
            .query(&query_params(query))
            .map_err(|err| Error::internal(format!("cannot encode query {query}: {err}")))
    }
}

#[async_trait]
impl Platform for Client {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let req = self
            .request(Method::Post, ["auth", "v1", "token"], Credentials::Anon)
            .query(&[("grant_type", "password")])
            .map_err(|err| Error::internal(err.to_string()))?
            .body_json(&json!({ "email": email, "password": password }))
            .map_err(|err| Error::internal(err.to_string()))?;
        recv_json(req).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session> {
        let req = self
            .request(Method::Post, ["auth", "v1", "token"], Credentials::Anon)
            .query(&[("grant_type", "refresh_token")])
            .map_err(|err| Error::internal(err.to_string()))?
            .body_json(&json!({ "refresh_token": refresh_token }))
            .map_err(|err| Error::internal(err.to_string()))?;
        recv_json(req).await
    }

    async fn user(&self, access_token: &str) -> Result<Option<User>> {
        let req = self.request(
            Method::Get,
            ["auth", "v1", "user"],
            Credentials::User(access_token),
        );
        match recv_json(req).await {
            Ok(user) => Ok(Some(user)),
            Err(Error::Platform {
                status: 401 | 403, ..
            }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let req = self.request(
            Method::Post,
            ["auth", "v1", "logout"],
            Credentials::User(access_token),
        );
        send(req).await.map(|_| ())
    }

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let req = self
            .request(
                Method::Post,
                ["auth", "v1", "admin", "users"],
                Credentials::Service,
            )
            .body_json(user)
            .map_err(|err| Error::internal(err.to_string()))?;
        recv_json(req).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        let req = self.request(
            Method::Delete,
            ["auth", "v1", "admin", "users", user_id],
            Credentials::Service,
        );
        send(req).await.map(|_| ())
    }

    async fn select(&self, access: Access<'_>, query: &Query) -> Result<Vec<Value>> {
        let req = self.table_request(Method::Get, access, query)?;
        recv_json(req).await
    }

    async fn insert(&self, access: Access<'_>, table: &str, rows: Vec<Value>) -> Result<()> {
        let req = self
            .request(Method::Post, ["rest", "v1", table], access.into())
            .header("Prefer", "return=minimal")
            .body_json(&rows)
            .map_err(|err| Error::internal(err.to_string()))?;
        send(req).await.map(|_| ())
    }

    async fn update(&self, access: Access<'_>, query: &Query, patch: Value) -> Result<()> {
        let req = self
            .table_request(Method::Patch, access, query)?
            .header("Prefer", "return=minimal")
            .body_json(&patch)
            .map_err(|err| Error::internal(err.to_string()))?;
        send(req).await.map(|_| ())
    }

    async fn delete(&self, access: Access<'_>, query: &Query) -> Result<()> {
        let req = self
            .table_request(Method::Delete, access, query)?
            .header("Prefer", "return=minimal");
        send(req).await.map(|_| ())
    }

    async fn upload(&self, bucket: &str, path: &str, file: &Upload) -> Result<()> {
        let segments = ["storage", "v1", "object", bucket]
            .into_iter()
            .chain(path.split('/'));
        let req = self
            .request(Method::Post, segments, Credentials::Service)
            .body_bytes(&file.bytes)
            .header("Content-Type", file.content_type.as_str())
            .header("x-upsert", if file.upsert { "true" } else { "false" });
        send(req).await.map(|_| ())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        let segments = ["storage", "v1", "object", "public", bucket]
            .into_iter()
            .chain(path.split('/'));
        self.url(segments).to_string()
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<StoredObject>> {
        let req = self
            .request(
                Method::Post,
                ["storage", "v1", "object", "list", bucket],
                Credentials::Service,
            )
            .body_json(&json!({
                "prefix": prefix,
                "limit": limit,
                "offset": 0,
                "sortBy": { "column": "name", "order": "asc" },
            }))
            .map_err(|err| Error::internal(err.to_string()))?;
        let objects: Vec<StoredObject> = recv_json(req).await?;
        Ok(objects
            .into_iter()
            .filter(|object| !object.name.is_empty())
            .collect())
    }

    async fn remove_objects(&self, bucket: &str, paths: &[String]) -> Result<()> {
        let req = self
            .request(
                Method::Delete,
                ["storage", "v1", "object", bucket],
                Credentials::Service,
            )
            .body_json(&json!({ "prefixes": paths }))
            .map_err(|err| Error::internal(err.to_string()))?;
        send(req).await.map(|_| ())
    }
}

/// Send a request, turning non-success responses into [`Error::Platform`].
async fn send(req: RequestBuilder) -> Result<surf::Response> {
    let mut res = req.send().await.map_err(|err| {
        tracing::error!("platform request failed: {err}");
        Error::internal(format!("platform request failed: {err}"))
    })?;
    if res.status().is_success() {
        return Ok(res);
    }

    let status = u16::from(res.status());
    let body: Value = res.body_json().await.unwrap_or(Value::Null);
    let message = error_message(&body).unwrap_or_else(|| format!("platform error {status}"));
    tracing::warn!(status, %message, "platform rejected request");
    Err(Error::Platform { status, message })
}

/// Send a request and parse the JSON response body.
async fn recv_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T> {
    send(req)
        .await?
        .body_json()
        .await
        .map_err(|err| Error::internal(format!("cannot parse platform response: {err}")))
}

/// Extract the human-readable message from an error body.
///
/// The auth, table and storage APIs each name this field differently.
fn error_message(body: &Value) -> Option<String> {
    ["message", "msg", "error_description", "error"]
        .into_iter()
        .find_map(|key| body.get(key)?.as_str())
        .map(String::from)
}

/// Encode a query in the table API's URL syntax.
fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), query.columns.clone())];
    for filter in &query.filters {
        match filter {
            Filter::Eq(column, value) => params.push((column.clone(), format!("eq.{value}"))),
            Filter::In(column, values) => {
                let quoted = values
                    .iter()
                    .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
                    .collect::<Vec<_>>()
                    .join(",");
                params.push((column.clone(), format!("in.({quoted})")));
            }
        }
    }
    if !query.order.is_empty() {
        let order = query
            .order
            .iter()
            .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
            .collect::<Vec<_>>()
            .join(",");
        params.push(("order".into(), order));
    }
    params
}
