// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Record Store Implementations
//!
//! Infrastructure implementations of the domain [`RecordStore`] contract.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Read and write resource records
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **HttpRecordStore** - REST record service (`/{table}`, `/{table}/{id}`)
//!   with bearer-token auth
//! - **InMemoryRecordStore** - process-local tables for tests and development

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::repository::{Page, RecordQuery, RecordStore, RecordStoreError};

#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    tables: Arc<RwLock<HashMap<String, Vec<Value>>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(table: &str, id: &str) -> RecordStoreError {
        RecordStoreError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        }
    }
}

fn has_id(record: &Value, id: &str) -> bool {
    record.get("id").and_then(Value::as_str) == Some(id)
}

fn into_object(body: Value) -> Result<Map<String, Value>, RecordStoreError> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(RecordStoreError::Serialization(format!(
            "record body must be an object, got {}",
            other
        ))),
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find(&self, table: &str, query: &RecordQuery) -> Result<Page, RecordStoreError> {
        let tables = self.tables.read().await;
        let data: Vec<Value> = tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        Ok(Page {
            total: data.len() as u64,
            data,
        })
    }

    async fn get(&self, table: &str, id: &str) -> Result<Value, RecordStoreError> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .and_then(|rows| rows.iter().find(|r| has_id(r, id)))
            .cloned()
            .ok_or_else(|| Self::not_found(table, id))
    }

    async fn create(&self, table: &str, body: Value) -> Result<Value, RecordStoreError> {
        let mut record = into_object(body)?;
        record.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        let record = Value::Object(record);

        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().push(record.clone());
        Ok(record)
    }

    async fn patch(&self, table: &str, id: &str, body: Value) -> Result<Value, RecordStoreError> {
        let changes = into_object(body)?;
        let mut tables = self.tables.write().await;
        let record = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| has_id(r, id)))
            .ok_or_else(|| Self::not_found(table, id))?;

        if let Value::Object(fields) = record {
            for (key, value) in changes {
                if key != "id" {
                    fields.insert(key, value);
                }
            }
        }
        Ok(record.clone())
    }

    async fn remove(&self, table: &str, id: &str) -> Result<Value, RecordStoreError> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| Self::not_found(table, id))?;
        let index = rows
            .iter()
            .position(|r| has_id(r, id))
            .ok_or_else(|| Self::not_found(table, id))?;
        Ok(rows.remove(index))
    }
}

/// Client for a REST record service
#[derive(Clone)]
pub struct HttpRecordStore {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl HttpRecordStore {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client: Client::new(),
        }
    }

    fn url(&self, table: &str, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}/{}/{}", self.base_url, table, id),
            None => format!("{}/{}", self.base_url, table),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(
        &self,
        request: RequestBuilder,
        table: &str,
        id: Option<&str>,
    ) -> Result<Value, RecordStoreError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| RecordStoreError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RecordStoreError::NotFound {
                table: table.to_string(),
                id: id.unwrap_or_default().to_string(),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RecordStoreError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| RecordStoreError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn find(&self, table: &str, query: &RecordQuery) -> Result<Page, RecordStoreError> {
        let params: Vec<(&str, &str)> = query.fields().collect();
        debug!(table, ?params, "Querying record store");
        let request = self.client.get(self.url(table, None)).query(&params);

        // Paginated services wrap results; plain ones return an array
        match self.send(request, table, None).await? {
            Value::Array(data) => Ok(Page {
                total: data.len() as u64,
                data,
            }),
            page @ Value::Object(_) => Ok(serde_json::from_value(page)?),
            other => Err(RecordStoreError::Serialization(format!(
                "unexpected find response: {}",
                other
            ))),
        }
    }

    async fn get(&self, table: &str, id: &str) -> Result<Value, RecordStoreError> {
        let request = self.client.get(self.url(table, Some(id)));
        self.send(request, table, Some(id)).await
    }

    async fn create(&self, table: &str, body: Value) -> Result<Value, RecordStoreError> {
        let request = self.client.post(self.url(table, None)).json(&body);
        self.send(request, table, None).await
    }

    async fn patch(&self, table: &str, id: &str, body: Value) -> Result<Value, RecordStoreError> {
        let request = self.client.patch(self.url(table, Some(id))).json(&body);
        self.send(request, table, Some(id)).await
    }

    async fn remove(&self, table: &str, id: &str) -> Result<Value, RecordStoreError> {
        let request = self.client.delete(self.url(table, Some(id)));
        self.send(request, table, Some(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_in_memory_crud() {
        let store = InMemoryRecordStore::new();

        let created = store
            .create("servers", json!({"ip": "10.0.0.5", "tenantId": "t1"}))
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        let page = store
            .find("servers", &RecordQuery::new().eq("ip", "10.0.0.5"))
            .await
            .unwrap();
        assert_eq!(page.total, 1);

        let patched = store
            .patch("servers", &id, json!({"reachable": true, "id": "other"}))
            .await
            .unwrap();
        assert_eq!(patched["reachable"], true);
        assert_eq!(patched["id"], id.as_str());

        store.remove("servers", &id).await.unwrap();
        assert!(matches!(
            store.get("servers", &id).await,
            Err(RecordStoreError::NotFound { .. })
        ));
        assert_eq!(
            store.find("servers", &RecordQuery::new()).await.unwrap().total,
            0
        );
    }

    #[tokio::test]
    async fn test_in_memory_tables_are_separate() {
        let store = InMemoryRecordStore::new();
        store.create("apps", json!({"name": "blog"})).await.unwrap();
        assert_eq!(store.find("databases", &RecordQuery::new()).await.unwrap().total, 0);
        assert!(store.create("apps", json!("not an object")).await.is_err());
    }

    #[tokio::test]
    async fn test_http_find_with_bearer_and_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/servers")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ip".into(), "10.0.0.5".into()),
                Matcher::UrlEncoded("tenantId".into(), "t1".into()),
            ]))
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"total": 1, "limit": 10, "skip": 0, "data": [{"id": "s1", "ip": "10.0.0.5"}]}"#)
            .create_async()
            .await;

        let store = HttpRecordStore::new(server.url(), Some("tok".to_string()));
        let page = store
            .find(
                "servers",
                &RecordQuery::new().eq("ip", "10.0.0.5").eq("tenantId", "t1"),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0]["id"], "s1");
    }

    #[tokio::test]
    async fn test_http_plain_array_and_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/apps")
            .with_status(200)
            .with_body(r#"[{"id": "a1"}, {"id": "a2"}]"#)
            .create_async()
            .await;
        server
            .mock("GET", "/apps/missing")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("POST", "/apps")
            .match_body(Matcher::PartialJson(json!({"name": "blog"})))
            .with_status(400)
            .with_body("name taken")
            .create_async()
            .await;

        let store = HttpRecordStore::new(format!("{}/", server.url()), None);

        let page = store.find("apps", &RecordQuery::new()).await.unwrap();
        assert_eq!(page.total, 2);

        assert!(matches!(
            store.get("apps", "missing").await,
            Err(RecordStoreError::NotFound { ref id, .. }) if id == "missing"
        ));

        match store.create("apps", json!({"name": "blog"})).await {
            Err(RecordStoreError::Rejected { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "name taken");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_patch_and_remove() {
        let mut server = mockito::Server::new_async().await;
        let patch = server
            .mock("PATCH", "/servers/s1")
            .match_body(Matcher::Json(json!({"reachable": true})))
            .with_status(200)
            .with_body(r#"{"id": "s1", "reachable": true}"#)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/servers/s1")
            .with_status(200)
            .with_body(r#"{"id": "s1"}"#)
            .create_async()
            .await;

        let store = HttpRecordStore::new(server.url(), None);
        let patched = store
            .patch("servers", "s1", json!({"reachable": true}))
            .await
            .unwrap();
        assert_eq!(patched["reachable"], true);
        store.remove("servers", "s1").await.unwrap();

        patch.assert_async().await;
        delete.assert_async().await;
    }
}
