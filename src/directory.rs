//! User directory: email-keyed access to stored user records.
//!
//! The admin gate reads roles through here on every request, so a role change made
//! by an admin takes effect immediately for tokens that are already issued.

use serde::Serialize;
use serde_json::Value;

use crate::{
    models::{CreateUserOutcome, Role, UpdateResult, UserRecord},
    store::{Collection, Document, DocumentStore, Filter, FindOptions, StoreError},
};

pub(crate) fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(doc) => Ok(doc),
        other => Err(StoreError::Serialization(serde::ser::Error::custom(
            format!("expected a JSON object, got {other}"),
        ))),
    }
}

/// Looks up the user record stored under `email`.
pub async fn find_user(
    store: &dyn DocumentStore,
    email: &str,
) -> Result<Option<UserRecord>, StoreError> {
    let Some(doc) = store
        .find_one(Collection::Users, &Filter::all().eq("email", email))
        .await?
    else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_value(Value::Object(doc))?))
}

/// Returns the role of the user stored under `email`, if any.
pub async fn role_of(store: &dyn DocumentStore, email: &str) -> Result<Option<Role>, StoreError> {
    Ok(find_user(store, email).await?.map(|user| user.role))
}

/// Inserts `user` unless a record with the same email already exists.
pub async fn create_user_if_absent(
    store: &dyn DocumentStore,
    user: &UserRecord,
) -> Result<CreateUserOutcome, StoreError> {
    let existing = store
        .find_one(Collection::Users, &Filter::all().eq("email", user.email.as_str()))
        .await?;
    if existing.is_some() {
        tracing::debug!(email = %user.email, "user already exists, skipping insert");
        return Ok(CreateUserOutcome::already_exists());
    }

    // A concurrent request may have inserted the same email since the lookup;
    // the store's unique key turns that race into the same idempotent answer.
    match store.insert_one(Collection::Users, to_document(user)?).await {
        Ok(result) => {
            tracing::info!(email = %user.email, "created user");
            Ok(CreateUserOutcome::Created(result))
        }
        Err(StoreError::Duplicate { .. }) => {
            tracing::debug!(email = %user.email, "lost insert race, user already exists");
            Ok(CreateUserOutcome::already_exists())
        }
        Err(e) => Err(e),
    }
}

pub async fn set_role(
    store: &dyn DocumentStore,
    email: &str,
    role: Role,
) -> Result<UpdateResult, StoreError> {
    let mut set = Document::new();
    set.insert("role".to_string(), Value::String(role.as_str().to_string()));
    store
        .update_one(Collection::Users, &Filter::all().eq("email", email), set)
        .await
}

pub async fn list_members(store: &dyn DocumentStore) -> Result<Vec<Document>, StoreError> {
    store
        .find(
            Collection::Users,
            &Filter::all().eq("role", Role::Member.as_str()),
            FindOptions::default(),
        )
        .await
}
