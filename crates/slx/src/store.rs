//! # 📡 THE DOCUMENT STORE CLIENT
//!
//! 🎬 COLD OPEN — INT. SERVER ROOM — 3:47 AM
//!
//! The monitoring dashboard glows amber in the dark. One engineer, alone,
//! stares into the abyss of a yellow cluster. The abyss stares back and
//! offers a 429. "I'll just ingest the catalog," they whispered. "It'll be
//! fast," they said. "Bulk requests scale," someone lied, once, at a conference.
//!
//! 🚀 This module sends your precious documents into the elastic void.
//! It is equal parts HTTP client, bulk API whisperer, and coping mechanism.
//! It does not classify. It does not retry. It sends, it parses, it reports.
//! The dispatch queue decides what the response MEANS. Separation of church
//! and HTTP.
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::app_config::AppConfig;
use crate::common::{Task, TaskKind};

/// 📡 The store's answer, in all the shapes it comes in.
///
/// One struct covers everything the wire can say:
/// - top-level `error` present → the whole request was rejected
/// - `errors: true` + `items` → a mixed bulk verdict, read the items
/// - neither → unqualified success, take the win and go
///
/// Single-document responses deserialize here too — their fields
/// (`_id`, `result`, friends) simply aren't ones we read, and serde shrugs
/// past unknown fields like a bouncer past a regular.
#[derive(Debug, Deserialize)]
pub(crate) struct StoreResponse {
    /// 💀 Top-level rejection. The store didn't even look at the items.
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    /// ⚠️ True when at least one bulk item failed. The store's way of saying
    /// "we need to talk about some of these."
    #[serde(default)]
    pub errors: Option<bool>,
    /// 📋 Per-item verdicts, in request order.
    #[serde(default)]
    pub items: Vec<BulkItem>,
}

/// 📋 One bulk item verdict — `{"index": {...}}` on the wire.
#[derive(Debug, Deserialize)]
pub(crate) struct BulkItem {
    /// "index" is the action name, not the index name. The store chose
    /// this. We just comply. (`create` accepted too, for stores that
    /// answer in that dialect.)
    #[serde(alias = "create")]
    pub index: BulkItemStatus,
}

/// 📋 The status of one document inside a bulk response.
#[derive(Debug, Deserialize)]
pub(crate) struct BulkItemStatus {
    #[serde(rename = "_id")]
    pub id: String,
    /// 💀 Present = this one document was rejected. Absent = it landed.
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// 📡 The HTTP muscle. One reqwest client, reused across every request,
/// because spinning up a new client per request is the networking equivalent
/// of buying a new car every time you need to go to the grocery store.
///
/// Auth priority: API key beats basic auth. This is not a democracy.
#[derive(Debug, Clone)]
pub(crate) struct StoreClient {
    client: reqwest::Client,
    cluster: String,
    index: String,
    username: Option<String>,
    password: Option<String>,
    api_key: Option<String>,
}

impl StoreClient {
    /// 🚀 Build the client with sane timeouts (10s connect, 30s response).
    /// Like a polite person — we will wait, but not forever.
    pub(crate) fn new(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .context("💀 The HTTP client refused to be born. The TLS stack wept. Probably a missing cert or a cursed system OpenSSL. Either way: tragic.")?;

        Ok(Self {
            client,
            cluster: config.cluster.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// 🔒 Same auth dance everywhere — api_key beats basic auth in this club.
    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(api_key) = &self.api_key {
            request.header("Authorization", format!("ApiKey {api_key}"))
        } else if let Some(username) = &self.username {
            request.basic_auth(username, self.password.as_ref())
        } else {
            request
        }
    }

    /// 📡 Connectivity ping — "Hello? Is this thing on?" A GET to the cluster
    /// root before the first document moves. If the URL is wrong or auth is
    /// broken, we fail loudly here, not quietly 50,000 documents later.
    pub(crate) async fn ping(&self) -> Result<()> {
        let response = self
            .apply_auth(self.client.get(&self.cluster))
            .send()
            .await
            .with_context(|| {
                format!(
                    "💀 Reached out to '{}' to say hello. Got ghosted. The cluster is down, the URL is wrong, or the network is giving us the silent treatment. We refuse to start an ingest we can't finish. Dignity intact.",
                    self.cluster
                )
            })?;
        debug!(status = %response.status(), "✅ cluster answered the doorbell");
        Ok(())
    }

    /// 🚀 Dispatch one task and parse whatever comes back.
    ///
    /// Single task → `POST {cluster}/{index}/_doc/{id}`, JSON body.
    /// Bulk task   → `POST {cluster}/{index}/_bulk`, NDJSON body.
    ///
    /// ⚠️ Deliberately does NOT bail on non-2xx statuses: the store puts its
    /// complaints in the JSON body (`error` and friends), and the queue's
    /// classifier wants to read them. A response body that isn't JSON at all
    /// IS an error here — transport-grade, whole-task-retry material.
    pub(crate) async fn dispatch(&self, task: &Task) -> Result<StoreResponse> {
        let request = match &task.kind {
            TaskKind::Single { doc } => {
                let url = format!("{}/{}/_doc/{}", self.cluster, self.index, doc.id);
                trace!(%url, "📮 single-document write");
                self.client
                    .post(&url)
                    .header("Content-Type", "application/json")
                    .body(doc.body.to_string())
            }
            TaskKind::Bulk { payload, ids, .. } => {
                let url = format!("{}/{}/_bulk", self.cluster, self.index);
                trace!(%url, docs = ids.len(), "🚚 bulk write");
                self.client
                    .post(&url)
                    // ⚠️ application/x-ndjson, not application/json. VERY important.
                    // The store will 406 or silently misbehave without it.
                    .header("Content-Type", "application/x-ndjson")
                    .body(payload.clone())
            }
        };

        let response = self
            .apply_auth(request)
            .send()
            .await
            .context("💀 The request never made it to the store. We launched the payload into the network and the network responded with what can only be described as 'not vibing with it.'")?;

        response
            .json::<StoreResponse>()
            .await
            .context("💀 The store answered, but not in JSON. A proxy error page, a load balancer's sympathy card, or half a response cut off mid-byte. Whatever it was, we can't classify it, so the whole task goes around again.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_a_clean_bulk_response_parses_as_total_victory() {
        let raw = r#"{"took":30,"errors":false,"items":[
            {"index":{"_index":"i","_id":"a","result":"created","status":201}},
            {"index":{"_index":"i","_id":"b","result":"created","status":201}}
        ]}"#;
        let resp: StoreResponse = serde_json::from_str(raw).unwrap();
        assert!(resp.error.is_none());
        assert_eq!(resp.errors, Some(false));
        assert_eq!(resp.items.len(), 2);
        assert!(resp.items.iter().all(|i| i.index.error.is_none()));
    }

    #[test]
    fn the_one_where_a_mixed_bulk_response_names_the_casualty() {
        let raw = r#"{"took":30,"errors":true,"items":[
            {"index":{"_id":"a","status":201}},
            {"index":{"_id":"b","status":400,"error":{"type":"mapper_parsing_exception"}}}
        ]}"#;
        let resp: StoreResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.errors, Some(true));
        assert!(resp.items[0].index.error.is_none());
        assert!(resp.items[1].index.error.is_some());
        assert_eq!(resp.items[1].index.id, "b");
    }

    #[test]
    fn the_one_where_a_top_level_error_overshadows_everything() {
        let raw = r#"{"error":{"type":"index_not_found_exception","reason":"no such index"},"status":404}"#;
        let resp: StoreResponse = serde_json::from_str(raw).unwrap();
        assert!(resp.error.is_some(), "top-level error → whole-task retry territory");
        assert!(resp.items.is_empty());
    }

    #[test]
    fn the_one_where_a_single_doc_response_parses_as_quiet_success() {
        // 📮 Single-document responses have none of our fields. That IS the success shape.
        let raw = r#"{"_index":"i","_id":"a1","result":"created","_version":1}"#;
        let resp: StoreResponse = serde_json::from_str(raw).unwrap();
        assert!(resp.error.is_none());
        assert!(resp.errors.is_none());
        assert!(resp.items.is_empty());
    }

    #[test]
    fn the_one_where_create_flavored_items_are_understood_too() {
        let raw = r#"{"errors":false,"items":[{"create":{"_id":"x","status":201}}]}"#;
        let resp: StoreResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.items[0].index.id, "x");
    }
}
