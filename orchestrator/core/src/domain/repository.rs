// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Record Store Interface
//!
//! Resource records (servers, apps, databases, system users) are owned by an
//! external structured-record store. The engine only holds a client to it,
//! behind the narrow CRUD contract defined here and implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Implementation | Backend |
//! |----------------|---------|
//! | `InMemoryRecordStore` | process-local map, for tests and development |
//! | `HttpRecordStore` | REST record service with bearer auth |
//!
//! The trait is untyped (`serde_json::Value` bodies) so one client serves every
//! table; the typed helpers on `dyn RecordStore` convert to and from the
//! [`Record`](crate::domain::resource::Record) views the services use.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::resource::Record;

/// Equality filter over record fields (`GET /{table}?field=value`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    fields: BTreeMap<String, String>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl ToString) -> Self {
        self.fields.insert(field.into(), value.to_string());
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether a stored record satisfies every filter field
    pub fn matches(&self, record: &Value) -> bool {
        self.fields.iter().all(|(field, expected)| match record.get(field) {
            Some(Value::String(s)) => s == expected,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == *expected,
        })
    }
}

/// One page of query results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Page {
    pub data: Vec<Value>,
    pub total: u64,
}

/// Repository interface for the external record store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Find records in `table` matching every query field
    async fn find(&self, table: &str, query: &RecordQuery) -> Result<Page, RecordStoreError>;

    /// Fetch a record by id
    async fn get(&self, table: &str, id: &str) -> Result<Value, RecordStoreError>;

    /// Create a record; the store assigns and returns its id
    async fn create(&self, table: &str, body: Value) -> Result<Value, RecordStoreError>;

    /// Merge `body` into an existing record
    async fn patch(&self, table: &str, id: &str, body: Value) -> Result<Value, RecordStoreError>;

    /// Delete a record, returning what was removed
    async fn remove(&self, table: &str, id: &str) -> Result<Value, RecordStoreError>;
}

impl dyn RecordStore + '_ {
    pub async fn find_as<R: Record>(&self, query: &RecordQuery) -> Result<Vec<R>, RecordStoreError> {
        let page = self.find(R::TABLE, query).await?;
        page.data
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(RecordStoreError::from))
            .collect()
    }

    pub async fn first_as<R: Record>(&self, query: &RecordQuery) -> Result<Option<R>, RecordStoreError> {
        Ok(self.find_as::<R>(query).await?.into_iter().next())
    }

    pub async fn get_as<R: Record>(&self, id: &str) -> Result<R, RecordStoreError> {
        let value = self.get(R::TABLE, id).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn create_as<R: Record>(&self, record: &R) -> Result<R, RecordStoreError> {
        let value = self.create(R::TABLE, serde_json::to_value(record)?).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn patch_as<R: Record>(&self, id: &str, body: Value) -> Result<R, RecordStoreError> {
        let value = self.patch(R::TABLE, id, body).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn remove_as<R: Record>(&self, id: &str) -> Result<(), RecordStoreError> {
        self.remove(R::TABLE, id).await.map(|_| ())
    }
}

/// Record store errors
#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("Record not found: {table}/{id}")]
    NotFound { table: String, id: String },

    #[error("Record store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Record store unreachable: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RecordStoreError {
    fn from(err: serde_json::Error) -> Self {
        RecordStoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_matches_strings_and_scalars() {
        let record = json!({"ip": "10.0.0.5", "tenantId": "t1", "mysql": true, "port": 22});

        assert!(RecordQuery::new().matches(&record));
        assert!(RecordQuery::new().eq("ip", "10.0.0.5").eq("tenantId", "t1").matches(&record));
        assert!(RecordQuery::new().eq("mysql", true).matches(&record));
        assert!(RecordQuery::new().eq("port", 22).matches(&record));
        assert!(!RecordQuery::new().eq("ip", "10.0.0.6").matches(&record));
        assert!(!RecordQuery::new().eq("missing", "x").matches(&record));
    }
}
