// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP remote adapter
//!
//! One endpoint per entity type: `POST {base}/{entity}` creates,
//! `PUT {base}/{entity}/{id}` updates and `DELETE {base}/{entity}/{id}`
//! deletes. The record's `id` field names the target of updates and deletes.

use super::{RemoteApi, RemoteId};
use async_trait::async_trait;
use ms_core::{EntityType, OperationType, RemoteError};
use std::time::Duration;

/// Blocking ureq client driven from the tokio blocking pool
///
/// Dropping a `save` future stops the wait but not the request: the blocking
/// call runs until it completes or hits the configured timeout. A write the
/// caller abandoned may still reach the backend, and it is sent again on the
/// next drain.
#[derive(Clone)]
pub struct HttpRemoteApi {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

impl HttpRemoteApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration, token: Option<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn target_url(
        &self,
        entity: &EntityType,
        op: OperationType,
        record: &serde_json::Value,
    ) -> Result<String, RemoteError> {
        let collection = format!("{}/{}", self.base_url, entity);
        if op == OperationType::Create {
            return Ok(collection);
        }
        match record_id(record) {
            Some(id) => Ok(format!("{}/{}", collection, id)),
            None => Err(RemoteError::http(400, format!("{} without record id", op))),
        }
    }

    fn send_blocking(
        &self,
        url: &str,
        op: OperationType,
        body: String,
    ) -> Result<(u16, String), RemoteError> {
        let auth = self.token.as_ref().map(|t| format!("Bearer {}", t));
        let result = match op {
            OperationType::Create | OperationType::Update => {
                let request = if op == OperationType::Create {
                    self.agent.post(url)
                } else {
                    self.agent.put(url)
                };
                let request = request.header("Content-Type", "application/json");
                match &auth {
                    Some(value) => request.header("Authorization", value).send(body),
                    None => request.send(body),
                }
            }
            OperationType::Delete => {
                let request = self.agent.delete(url);
                match &auth {
                    Some(value) => request.header("Authorization", value).call(),
                    None => request.call(),
                }
            }
        };

        let mut response = result.map_err(map_transport_error)?;
        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(map_transport_error)?;
        Ok((status, text))
    }
}

fn record_id(record: &serde_json::Value) -> Option<String> {
    match record.get("id")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn map_transport_error(error: ureq::Error) -> RemoteError {
    match error {
        ureq::Error::Timeout(_) => RemoteError::Timeout,
        other => RemoteError::Network(other.to_string()),
    }
}

/// Remote id from a success body, falling back to the record's own id
fn parse_remote_id(body: &str, record: &serde_json::Value) -> Option<RemoteId> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| record_id(&json))
        .or_else(|| record_id(record))
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn save(
        &self,
        entity: &EntityType,
        op: OperationType,
        record: &serde_json::Value,
    ) -> Result<RemoteId, RemoteError> {
        let url = self.target_url(entity, op, record)?;
        let body = serde_json::to_string(record)
            .map_err(|e| RemoteError::http(400, format!("unserializable record: {}", e)))?;

        let client = self.clone();
        let (status, text) =
            tokio::task::spawn_blocking(move || client.send_blocking(&url, op, body))
                .await
                .map_err(|e| RemoteError::Network(format!("request task failed: {}", e)))??;

        if !(200..300).contains(&status) {
            return Err(RemoteError::http(status, text));
        }
        Ok(parse_remote_id(&text, record).unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
