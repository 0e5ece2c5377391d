//! 🏗️ Document Builder — one record in, zero or more documents out.
//!
//! This is the fan-out point of the pipeline. A record walks in with (maybe)
//! an id and (hopefully) some text. The builder resolves the identity,
//! consults the splitter, and mints one document per chunk — each one knowing
//! exactly who it is and which slice of the text it carries.
//!
//! 🦆 The duck is here because every file must have one. This is law.
//! Do not question the duck.

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::app_config::AppConfig;
use crate::common::{Document, Record};
use crate::splitter::{SplitterBackend, TextSplitter};

/// 📤 What came of one record. Either documents, or a documented absence.
///
/// The skip case is NOT an error — records without text have always been
/// dropped by this pipeline. What's new is that the drop is visible: it
/// carries the record's id so the tracker can count it and the logs can name
/// it. Silent data loss is a horror genre, not a feature.
#[derive(Debug)]
pub(crate) enum Built {
    /// ✅ One document per chunk, in chunk order.
    Documents(Vec<Document>),
    /// 🫥 The text field was absent, null, empty, or something with no
    /// sensible string form (an array, an object). Zero documents.
    SkippedNoText { id: String },
}

/// 🏗️ Turns records into documents: identity resolution, chunk fan-out,
/// optional field-stripping. Pure construction — no I/O, no side effects,
/// no opinions about where the documents are going afterward.
#[derive(Debug)]
pub(crate) struct DocumentBuilder {
    text_field: String,
    only_text: bool,
    splitter: SplitterBackend,
}

impl DocumentBuilder {
    pub(crate) fn new(config: &AppConfig) -> Self {
        Self {
            text_field: config.text_field.clone(),
            only_text: config.only_text,
            splitter: SplitterBackend::from_config(config),
        }
    }

    /// 🪪 Resolve the record's identity. An existing non-empty `id` wins;
    /// numeric ids are welcomed and stringified; everything else gets a
    /// freshly minted UUIDv4 and a new lease on life.
    fn resolve_id(record: &Record) -> String {
        match record.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            // 🎲 No id, null id, empty id, or something weird pretending to
            // be an id. The record arrived without papers. We issue papers.
            _ => Uuid::new_v4().to_string(),
        }
    }

    /// 🔄 Consume one record, emit its documents.
    ///
    /// Chunk-index ordering within a record is preserved — chunk 0's document
    /// comes before chunk 1's, always. Across records, the dispatch queue
    /// makes no such promise, and neither do we.
    ///
    /// Identity law: one chunk → `{id}` unmodified. Many chunks → `{id}_{i}`,
    /// 0-based, applied to both the document id and the body's `id` field.
    pub(crate) fn build(&self, record: Record) -> Built {
        let id = Self::resolve_id(&record);

        let text = match record.get(&self.text_field) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            // 🔢 Numbers and booleans are welcomed and stringified, same as
            // ids. A price of 123 in the text field becomes the text "123".
            // Odd input, but it has always produced a document, and it still does.
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => {
                // 🫥 No text, no document. Preserved behavior — but counted
                // and logged now, instead of vanishing like socks in a dryer.
                warn!(
                    record_id = %id,
                    text_field = %self.text_field,
                    "🫥 record has no usable text — skipping, zero documents produced"
                );
                return Built::SkippedNoText { id };
            }
        };

        let chunks = self.splitter.split(&text);
        let multi = chunks.len() > 1;

        let docs = chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let doc_id = if multi { format!("{id}_{i}") } else { id.clone() };
                let body = if self.only_text {
                    // ✂️ Marie Kondo mode: only the text and the id survive.
                    // The other nineteen fields did not spark joy.
                    let mut slim = serde_json::Map::with_capacity(2);
                    slim.insert("id".to_string(), Value::String(doc_id.clone()));
                    slim.insert(self.text_field.clone(), Value::String(chunk));
                    Value::Object(slim)
                } else {
                    // 📦 The full record rides along, with the chunk written
                    // back into the text field and the resolved id installed.
                    let mut full = record.clone();
                    full.insert("id".to_string(), Value::String(doc_id.clone()));
                    full.insert(self.text_field.clone(), Value::String(chunk));
                    Value::Object(full)
                };
                Document { id: doc_id, body }
            })
            .collect();

        Built::Documents(docs)
    }
}
