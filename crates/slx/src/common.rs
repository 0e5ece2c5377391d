//! 📦 Common data structures — the building blocks of sluicex
//!
//! ---
//!
//! 🎬 COLD OPEN — INT. DATA CENTER — 3:47 AM
//!
//! 🌩️  A forty-gigabyte NDJSON file sits on disk, unbothered, doing nothing,
//! the way only a file can. An ingest run has been going for three hours.
//! The memory graph is flat. FLAT. Someone frames a screenshot of it.
//!
//! ✅ And then — a `Document` is born. It has an id. It has a body. It will
//! travel further tonight than most of us did all week: out of a file, through
//! a splitter, into a batch, across a network, into an index. Godspeed.
//!
//! 🦆
//!
//! This module defines the humble yet load-bearing structs that ferry records
//! from the input file to the document store. They don't ask questions.
//! They carry the data. They are the postal workers of this codebase.
//! Please tip your postal workers.

use std::collections::HashMap;

use serde_json::Value;

/// 📄 One parsed input line — a self-describing field→value mapping.
///
/// This is the raw material. It lives exactly as long as it takes the
/// [`DocumentBuilder`](crate::builder::DocumentBuilder) to consume it,
/// and is then discarded like a shipping box on December 26th.
pub(crate) type Record = serde_json::Map<String, Value>;

/// 🎯 A singular `Document` — one unit of payload, one identity, zero regrets.
///
/// Derived from a [`Record`] plus at most one text chunk. The `id` is stable
/// for the life of the run: either the record's own id, or `{recordId}_{i}`
/// when chunking fanned one record out into many documents.
///
/// Unlike records, documents always know who they are. We made sure of it.
/// Identity crises are resolved at the builder, not in the dispatch queue.
#[derive(Debug, Clone)]
pub(crate) struct Document {
    /// 🪪 The document's identity. NOT an `Option`. The builder guarantees it.
    pub id: String,
    /// 📦 The JSON body as sent to the store. Serialized lazily at batch time.
    pub body: Value,
}

/// 📬 A unit of dispatch work — one HTTP request's worth of documents.
///
/// Either a bulk write (many documents, one `_bulk` call) or a lone
/// single-document write. Carries an attempt counter so the retry policy
/// can tell "first date" from "we have been here eleven times."
#[derive(Debug, Clone)]
pub(crate) struct Task {
    pub kind: TaskKind,
    /// 🔄 How many times this exact task has already been dispatched.
    /// Starts at 0. We hope it stays at 0. Hope is not a retry policy,
    /// which is why we also have an actual retry policy.
    pub attempts: u32,
}

/// 🎭 The two shapes a task can take. There is no third shape.
#[derive(Debug, Clone)]
pub(crate) enum TaskKind {
    /// 📮 One document, one `POST {index}/_doc/{id}`. Artisanal. Small-batch.
    /// (Batch of one. The smallest batch. A batchlet.)
    Single { doc: Document },
    /// 🚚 Many documents, one `POST {index}/_bulk`.
    ///
    /// `payload` is the pre-rendered NDJSON body (action line, doc line,
    /// repeat, trailing newline). `docs` maps id → document so that when the
    /// store rejects SOME items, we can resurrect exactly those documents as
    /// new single tasks instead of re-sending everyone's luggage.
    Bulk {
        payload: String,
        docs: HashMap<String, Document>,
        /// 📋 Ids in original batch order — the full passenger manifest,
        /// used when the response says "all fine" without per-item detail.
        ids: Vec<String>,
    },
}

impl Task {
    /// 📮 Wrap one document as a fresh single-document task, attempts = 0.
    ///
    /// Also the rebirth path: when a bulk response rejects one item, that
    /// document comes back through here as a brand-new task. Not a mutation.
    /// A reincarnation. The old bulk task is already compost.
    pub(crate) fn single(doc: Document) -> Self {
        Self {
            kind: TaskKind::Single { doc },
            attempts: 0,
        }
    }

    /// 🚚 Wrap a rendered bulk payload as a fresh bulk task, attempts = 0.
    pub(crate) fn bulk(payload: String, docs: HashMap<String, Document>, ids: Vec<String>) -> Self {
        Self {
            kind: TaskKind::Bulk { payload, docs, ids },
            attempts: 0,
        }
    }

    /// 🔢 How many documents ride in this task.
    pub(crate) fn doc_count(&self) -> usize {
        match &self.kind {
            TaskKind::Single { .. } => 1,
            TaskKind::Bulk { ids, .. } => ids.len(),
        }
    }

    /// 📋 Every identity aboard this task, in order.
    ///
    /// Used when an outcome applies to the whole task at once — total
    /// success with no per-item detail, or total surrender after the retry
    /// budget runs out. Group outcomes. Like a tour bus.
    pub(crate) fn all_ids(&self) -> Vec<String> {
        match &self.kind {
            TaskKind::Single { doc } => vec![doc.id.clone()],
            TaskKind::Bulk { ids, .. } => ids.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn the_one_where_a_single_task_knows_its_only_passenger() {
        let task = Task::single(Document {
            id: "a1".into(),
            body: json!({"id": "a1", "text": "hello"}),
        });
        assert_eq!(task.doc_count(), 1);
        assert_eq!(task.all_ids(), vec!["a1".to_string()]);
        assert_eq!(task.attempts, 0, "fresh tasks have a clean record");
    }

    #[test]
    fn the_one_where_a_bulk_task_keeps_the_manifest_in_order() {
        let docs: HashMap<String, Document> = [
            ("b", json!({"id": "b"})),
            ("a", json!({"id": "a"})),
        ]
        .into_iter()
        .map(|(id, body)| (id.to_string(), Document { id: id.into(), body }))
        .collect();
        let task = Task::bulk("payload\n".into(), docs, vec!["b".into(), "a".into()]);
        assert_eq!(task.doc_count(), 2);
        // 📋 manifest order is batch order, not HashMap order. HashMap order is chaos.
        assert_eq!(task.all_ids(), vec!["b".to_string(), "a".to_string()]);
    }
}
