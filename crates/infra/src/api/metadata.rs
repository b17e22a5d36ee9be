//! Metadata instances on files and folders
//!
//! Creating an instance that already exists answers `409`. `try_create`
//! reports that as [`CreateError::Conflict`] so `set` can fall back to a
//! JSON-patch update without inspecting error strings.

use boxsdk_domain::impl_wire_name_conversions;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::errors::{ApiError, SessionError};
use crate::http::{BoxSession, RequestBody, RequestEnvelope};

const JSON_PATCH: &str = "application/json-patch+json";

/// Item kinds that carry metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataItemType {
    File,
    Folder,
}

impl_wire_name_conversions!(MetadataItemType {
    File => "file",
    Folder => "folder",
});

/// Failure of [`Metadata::try_create`]
#[derive(Debug, Error)]
pub enum CreateError {
    /// An instance for this template already exists on the item
    #[error("metadata instance already exists: {0}")]
    Conflict(Box<ApiError>),

    #[error(transparent)]
    Failed(SessionError),
}

impl From<CreateError> for SessionError {
    fn from(err: CreateError) -> Self {
        match err {
            CreateError::Conflict(api) => Self::Api(api),
            CreateError::Failed(err) => err,
        }
    }
}

/// JSON-patch document applied by [`Metadata::update`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetadataUpdate {
    ops: Vec<Value>,
}

impl MetadataUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collected JSON-patch operations, in order.
    pub fn ops(&self) -> &[Value] {
        &self.ops
    }

    /// Whether no operation has been added yet.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn add(&mut self, path: &str, value: impl Into<Value>) -> &mut Self {
        self.push("add", path, Some(value.into()))
    }

    /// Remove `path`, only if it still holds `old_value` when given.
    pub fn remove(&mut self, path: &str, old_value: Option<Value>) -> &mut Self {
        if let Some(old_value) = old_value {
            self.push("test", path, Some(old_value));
        }
        self.push("remove", path, None)
    }

    /// Replace `path`, only if it still holds `old_value` when given.
    pub fn update(&mut self, path: &str, value: impl Into<Value>, old_value: Option<Value>) -> &mut Self {
        if let Some(old_value) = old_value {
            self.push("test", path, Some(old_value));
        }
        self.push("replace", path, Some(value.into()))
    }

    /// Abort the whole patch unless `path` holds `value`.
    pub fn test(&mut self, path: &str, value: impl Into<Value>) -> &mut Self {
        self.push("test", path, Some(value.into()))
    }

    fn push(&mut self, op: &str, path: &str, value: Option<Value>) -> &mut Self {
        let path = if path.starts_with('/') { path.to_string() } else { format!("/{path}") };
        let mut entry = json!({"op": op, "path": path});
        if let Some(value) = value {
            entry["value"] = value;
        }
        self.ops.push(entry);
        self
    }

    /// `add` operations for every key of `values`.
    fn from_values(values: &Map<String, Value>) -> Self {
        let mut update = Self::new();
        for (key, value) in values {
            update.add(key, value.clone());
        }
        update
    }
}

/// One metadata instance: item, scope and template
#[derive(Debug, Clone)]
pub struct Metadata {
    session: BoxSession,
    item_type: MetadataItemType,
    item_id: String,
    scope: String,
    template: String,
}

impl Metadata {
    pub fn new(
        session: BoxSession,
        item_type: MetadataItemType,
        item_id: impl Into<String>,
        scope: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            session,
            item_type,
            item_id: item_id.into(),
            scope: scope.into(),
            template: template.into(),
        }
    }

    /// `{api}/{type}s/{id}/metadata/{scope}/{template}`
    pub fn url(&self) -> String {
        self.session.api_url(&format!(
            "{}s/{}/metadata/{}/{}",
            self.item_type.as_str(),
            self.item_id,
            self.scope,
            self.template
        ))
    }

    #[must_use]
    pub fn start_update() -> MetadataUpdate {
        MetadataUpdate::new()
    }

    /// Same instance accessed on behalf of another user.
    ///
    /// # Errors
    /// See [`BoxSession::as_user`].
    pub fn as_user(&self, user_id: &str) -> Result<Self, SessionError> {
        Ok(Self { session: self.session.as_user(user_id)?, ..self.clone() })
    }

    /// # Errors
    /// Propagates session failures, including `404` for a missing instance.
    pub async fn get(&self) -> Result<Value, SessionError> {
        Ok(self.session.get(self.url()).await?.json()?)
    }

    /// Create the instance, reporting an existing one as a conflict.
    ///
    /// # Errors
    /// `CreateError::Conflict` on `409`, `CreateError::Failed` otherwise.
    pub async fn try_create(&self, values: &Map<String, Value>) -> Result<Value, CreateError> {
        let result = self
            .session
            .post(self.url(), RequestBody::Json(Value::Object(values.clone())))
            .await
            .and_then(|response| Ok(response.json::<Value>()?));
        match result {
            Ok(created) => Ok(created),
            Err(SessionError::Api(api)) if api.is_conflict() => Err(CreateError::Conflict(api)),
            Err(err) => Err(CreateError::Failed(err)),
        }
    }

    /// Apply a JSON-patch update.
    ///
    /// # Errors
    /// Propagates session failures; a failed `test` op answers `409`.
    pub async fn update(&self, update: &MetadataUpdate) -> Result<Value, SessionError> {
        let body = serde_json::to_value(update)?;
        let request = RequestEnvelope::new(Method::PUT, self.url())
            .with_header(CONTENT_TYPE, HeaderValue::from_static(JSON_PATCH))
            .with_body(RequestBody::Json(body));
        Ok(self.session.send(request).await?.json()?)
    }

    /// Create the instance, or add every key to the existing one.
    ///
    /// # Errors
    /// Any failure other than the creation conflict.
    pub async fn set(&self, values: &Map<String, Value>) -> Result<Value, SessionError> {
        match self.try_create(values).await {
            Ok(created) => Ok(created),
            Err(CreateError::Conflict(_)) => {
                debug!(scope = %self.scope, template = %self.template, "metadata exists, updating");
                self.update(&MetadataUpdate::from_values(values)).await
            }
            Err(CreateError::Failed(err)) => Err(err),
        }
    }

    /// # Errors
    /// Propagates session failures.
    pub async fn delete(&self) -> Result<bool, SessionError> {
        Ok(self.session.delete(self.url()).await?.ok)
    }
}
