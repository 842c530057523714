//! Mock instantiation of the [`Platform`](super::Platform) interface.
//!
//! This instantiation is built on a simple in-memory store of users, sessions, tables and buckets.
//! It is useful for testing in isolation from the hosted platform.

use super::{Access, Filter, NewUser, Platform, Query, Session, StoredObject, Upload, User};
use crate::error::{Error, Result};
use async_std::sync::{Arc, RwLock};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Base of the public URLs handed out by the mock.
const PUBLIC_BASE: &str = "https://mock.platform/storage/v1/object/public";

/// An in-memory platform.
///
/// Clones share the same underlying state, so a test can keep a handle to inspect what a server
/// did with its own.
#[derive(Clone, Debug, Default)]
pub struct MockPlatform(Arc<RwLock<Db>>);

#[derive(Debug, Default)]
struct Db {
    accounts: Vec<Account>,
    sessions: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
    tables: HashMap<String, Vec<Map<String, Value>>>,
    buckets: HashMap<String, BTreeMap<String, StoredFile>>,
    failing: HashSet<String>,
    unreadable: HashSet<String>,
    next_id: u64,
}

#[derive(Debug)]
struct Account {
    user: User,
    password: String,
}

/// An object stored in a mock bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredFile {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl Db {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn issue_session(&mut self, user: User) -> Session {
        let n = self.next_id();
        let access_token = format!("access-{n}");
        let refresh_token = format!("refresh-{n}");
        self.sessions.insert(access_token.clone(), user.id.clone());
        self.refresh_tokens
            .insert(refresh_token.clone(), user.id.clone());
        Session {
            access_token,
            refresh_token,
            user,
        }
    }

    fn account(&self, user_id: &str) -> Option<&Account> {
        self.accounts.iter().find(|acct| acct.user.id == user_id)
    }

    fn check_access(&self, access: Access<'_>) -> Result<()> {
        match access {
            Access::Service => Ok(()),
            Access::User(token) if self.sessions.contains_key(token) => Ok(()),
            Access::User(_) => Err(Error::Platform {
                status: 401,
                message: "JWT expired".into(),
            }),
        }
    }

    fn check_writable(&self, name: &str) -> Result<()> {
        if self.failing.contains(name) {
            Err(Error::Platform {
                status: 500,
                message: format!("write to {name} failed"),
            })
        } else {
            Ok(())
        }
    }

    fn check_readable(&self, table: &str) -> Result<()> {
        if self.unreadable.contains(table) {
            Err(Error::Platform {
                status: 500,
                message: format!("read from {table} failed"),
            })
        } else {
            Ok(())
        }
    }
}

impl MockPlatform {
    /// Create a new, empty platform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user who can sign in with `email` and `password`.
    pub async fn add_user(&self, email: &str, password: &str, user_metadata: Value) -> String {
        let mut db = self.0.write().await;
        let id = format!("00000000-0000-4000-8000-{:012}", db.next_id());
        db.accounts.push(Account {
            user: User {
                id: id.clone(),
                email: Some(email.into()),
                user_metadata,
                app_metadata: Value::Object(Default::default()),
            },
            password: password.into(),
        });
        id
    }

    /// Whether an auth user with this ID exists.
    pub async fn has_user(&self, user_id: &str) -> bool {
        self.0.read().await.account(user_id).is_some()
    }

    /// Append rows to a table, as is, without default columns.
    pub async fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        let mut db = self.0.write().await;
        let table = db.tables.entry(table.into()).or_default();
        table.extend(rows.into_iter().filter_map(|row| match row {
            Value::Object(obj) => Some(obj),
            _ => None,
        }));
    }

    /// All rows of a table, in insertion order.
    pub async fn rows(&self, table: &str) -> Vec<Value> {
        self.0
            .read()
            .await
            .tables
            .get(table)
            .into_iter()
            .flatten()
            .cloned()
            .map(Value::Object)
            .collect()
    }

    /// The object stored at `path` in `bucket`.
    pub async fn object(&self, bucket: &str, path: &str) -> Option<StoredFile> {
        self.0.read().await.buckets.get(bucket)?.get(path).cloned()
    }

    /// Paths of every object in `bucket`.
    pub async fn object_paths(&self, bucket: &str) -> Vec<String> {
        self.0
            .read()
            .await
            .buckets
            .get(bucket)
            .into_iter()
            .flat_map(|objects| objects.keys().cloned())
            .collect()
    }

    /// Make every subsequent write to this table or bucket fail.
    pub async fn fail_writes_to(&self, name: &str) {
        self.0.write().await.failing.insert(name.into());
    }

    /// Make every subsequent select from this table fail.
    pub async fn fail_reads_from(&self, table: &str) {
        self.0.write().await.unreadable.insert(table.into());
    }

    /// Invalidate an access token, as if it had expired. Its refresh token remains valid.
    pub async fn expire(&self, access_token: &str) {
        self.0.write().await.sessions.remove(access_token);
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let mut db = self.0.write().await;
        let user = db
            .accounts
            .iter()
            .find(|acct| {
                acct.user.email.as_deref() == Some(email) && acct.password == password
            })
            .map(|acct| acct.user.clone())
            .ok_or_else(|| Error::Platform {
                status: 400,
                message: "Invalid login credentials".into(),
            })?;
        Ok(db.issue_session(user))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session> {
        let mut db = self.0.write().await;
        let invalid = || Error::Platform {
            status: 400,
            message: "Invalid Refresh Token".into(),
        };
        let user_id = db.refresh_tokens.remove(refresh_token).ok_or_else(invalid)?;
        let user = db.account(&user_id).ok_or_else(invalid)?.user.clone();
        Ok(db.issue_session(user))
    }

    async fn user(&self, access_token: &str) -> Result<Option<User>> {
        let db = self.0.read().await;
        Ok(db
            .sessions
            .get(access_token)
            .and_then(|id| db.account(id))
            .map(|acct| acct.user.clone()))
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let mut db = self.0.write().await;
        if let Some(user_id) = db.sessions.remove(access_token) {
            db.refresh_tokens.retain(|_, id| *id != user_id);
        }
        Ok(())
    }

    async fn create_user(&self, new: &NewUser) -> Result<User> {
        if self
            .0
            .read()
            .await
            .accounts
            .iter()
            .any(|acct| acct.user.email.as_deref() == Some(new.email.as_str()))
        {
            return Err(Error::Platform {
                status: 422,
                message: "A user with this email address has already been registered".into(),
            });
        }
        let id = self
            .add_user(&new.email, &new.password, new.user_metadata.clone())
            .await;
        let db = self.0.read().await;
        db.account(&id)
            .map(|acct| acct.user.clone())
            .ok_or_else(|| Error::internal("created user vanished"))
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        let mut db = self.0.write().await;
        let before = db.accounts.len();
        db.accounts.retain(|acct| acct.user.id != user_id);
        if db.accounts.len() == before {
            return Err(Error::Platform {
                status: 404,
                message: "User not found".into(),
            });
        }
        db.sessions.retain(|_, id| id != user_id);
        db.refresh_tokens.retain(|_, id| id != user_id);
        Ok(())
    }

    async fn select(&self, access: Access<'_>, query: &Query) -> Result<Vec<Value>> {
        let db = self.0.read().await;
        db.check_access(access)?;
        db.check_readable(&query.table)?;
        let mut rows = db
            .tables
            .get(&query.table)
            .into_iter()
            .flatten()
            .filter(|row| matches(row, &query.filters))
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| {
            query
                .order
                .iter()
                .map(|order| {
                    let ord = compare(a.get(&order.column), b.get(&order.column));
                    if order.ascending {
                        ord
                    } else {
                        ord.reverse()
                    }
                })
                .find(|ord| ord.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        Ok(rows
            .into_iter()
            .map(|row| Value::Object(project(row, &query.columns)))
            .collect())
    }

    async fn insert(&self, access: Access<'_>, table: &str, rows: Vec<Value>) -> Result<()> {
        let mut db = self.0.write().await;
        db.check_access(access)?;
        db.check_writable(table)?;
        let mut objects = Vec::with_capacity(rows.len());
        for row in rows {
            let Value::Object(mut obj) = row else {
                return Err(Error::Platform {
                    status: 400,
                    message: "row is not an object".into(),
                });
            };
            if !obj.contains_key("id") {
                obj.insert("id".into(), db.next_id().into());
            }
            obj.entry("created_at")
                .or_insert_with(|| Utc::now().to_rfc3339().into());
            objects.push(obj);
        }
        db.tables.entry(table.into()).or_default().extend(objects);
        Ok(())
    }

    async fn update(&self, access: Access<'_>, query: &Query, patch: Value) -> Result<()> {
        let mut db = self.0.write().await;
        db.check_access(access)?;
        db.check_writable(&query.table)?;
        let Value::Object(patch) = patch else {
            return Err(Error::Platform {
                status: 400,
                message: "patch is not an object".into(),
            });
        };
        for row in db
            .tables
            .entry(query.table.clone())
            .or_default()
            .iter_mut()
            .filter(|row| matches(row, &query.filters))
        {
            row.extend(patch.clone());
        }
        Ok(())
    }

    async fn delete(&self, access: Access<'_>, query: &Query) -> Result<()> {
        let mut db = self.0.write().await;
        db.check_access(access)?;
        db.check_writable(&query.table)?;
        if let Some(rows) = db.tables.get_mut(&query.table) {
            rows.retain(|row| !matches(row, &query.filters));
        }
        Ok(())
    }

    async fn upload(&self, bucket: &str, path: &str, file: &Upload) -> Result<()> {
        let mut db = self.0.write().await;
        db.check_writable(bucket)?;
        let objects = db.buckets.entry(bucket.into()).or_default();
        if objects.contains_key(path) && !file.upsert {
            return Err(Error::Platform {
                status: 409,
                message: "The resource already exists".into(),
            });
        }
        objects.insert(
            path.into(),
            StoredFile {
                bytes: file.bytes.clone(),
                content_type: file.content_type.clone(),
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{PUBLIC_BASE}/{bucket}/{path}")
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<StoredObject>> {
        let db = self.0.read().await;
        let prefix = prefix.trim_end_matches('/');
        Ok(db
            .buckets
            .get(bucket)
            .into_iter()
            .flat_map(|objects| objects.keys())
            .filter_map(|path| {
                let name = if prefix.is_empty() {
                    path.as_str()
                } else {
                    path.strip_prefix(prefix)?.strip_prefix('/')?
                };
                // Only direct children are listed.
                (!name.is_empty() && !name.contains('/')).then(|| StoredObject {
                    name: name.into(),
                })
            })
            .take(limit)
            .collect())
    }

    async fn remove_objects(&self, bucket: &str, paths: &[String]) -> Result<()> {
        let mut db = self.0.write().await;
        db.check_writable(bucket)?;
        if let Some(objects) = db.buckets.get_mut(bucket) {
            for path in paths {
                objects.remove(path);
            }
        }
        Ok(())
    }
}

/// The text form of a column value, as compared by filters.
fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn matches(row: &Map<String, Value>, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq(col, expected) => row.get(col).map(as_text).as_ref() == Some(expected),
        Filter::In(col, allowed) => row
            .get(col)
            .map(|v| allowed.contains(&as_text(v)))
            .unwrap_or(false),
    })
}

/// Compare column values, with nulls sorting after everything else.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => as_text(&Value::Number(x.clone())).cmp(&as_text(&Value::Number(y.clone()))),
        },
        (Some(x), Some(y)) => as_text(x).cmp(&as_text(y)),
    }
}

fn project(row: Map<String, Value>, columns: &str) -> Map<String, Value> {
    if columns.trim() == "*" {
        return row;
    }
    let wanted = columns.split(',').map(str::trim).collect::<Vec<_>>();
    row.into_iter()
        .filter(|(col, _)| wanted.contains(&col.as_str()))
        .collect()
}
