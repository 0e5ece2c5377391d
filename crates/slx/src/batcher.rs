//! 🚚 Batcher — the loading dock between the builder and the dispatch queue.
//!
//! Documents arrive one at a time. Bulk requests leave `batch_size` at a time.
//! In between: this accumulator, which is bounded, predictable, and never
//! holds more than one batch worth of documents. Bounded memory is not a
//! stretch goal around here. It is the whole point.
//!
//! With `batch_size == 1` the accumulator steps aside entirely and every
//! document ships as its own single-document task. A batch of one is just a
//! document with extra steps, and we skip the steps.

use std::collections::HashMap;

use crate::common::{Document, Task};

/// 🚚 Accumulates documents up to `batch_size`, then emits one bulk task.
///
/// # Contract 📜
/// - `add` flushes FIRST when the accumulator is already full, then appends.
///   So `batch_size` adds fill the batch silently, and the `batch_size + 1`-th
///   add is the one that pushes the full batch out the door.
/// - `flush` must be called once, unconditionally, after input ends —
///   otherwise the final partial batch dies in the warehouse. Call it.
///   The documents in there have families.
#[derive(Debug)]
pub(crate) struct Batcher {
    batch_size: usize,
    acc: Vec<Document>,
}

impl Batcher {
    pub(crate) fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            acc: Vec::with_capacity(batch_size.min(1024)),
        }
    }

    /// 📥 Accept one document. Returns a task when this add caused a flush
    /// (full accumulator) or when batching is disabled (`batch_size == 1`,
    /// the document ships solo, immediately, no waiting room).
    pub(crate) fn add(&mut self, doc: Document) -> Option<Task> {
        if self.batch_size <= 1 {
            // 📮 Express lane. One document, one task, zero accumulation.
            return Some(Task::single(doc));
        }

        let flushed = if self.acc.len() >= self.batch_size {
            self.flush()
        } else {
            None
        };
        self.acc.push(doc);
        flushed
    }

    /// 📤 Serialize whatever is accumulated into one bulk task and reset.
    ///
    /// The wire payload alternates action lines and document lines in
    /// document order, newline-terminated — the only format the bulk
    /// endpoint respects. Alongside it rides the id → document map, so a
    /// partially failed response can resurrect exactly the rejected documents.
    ///
    /// Empty accumulator → `None`. No empty bulk requests. The store doesn't
    /// want them and frankly neither do we. Boundaries are healthy.
    pub(crate) fn flush(&mut self) -> Option<Task> {
        if self.acc.is_empty() {
            return None;
        }

        // 🧮 Pre-allocate a floor: one action line's worth per document.
        // The bodies will grow it further — this just skips the early reallocs.
        let estimated: usize = self
            .acc
            .iter()
            .map(|d| d.id.len() + 64)
            .sum();
        let mut payload = String::with_capacity(estimated);
        let mut docs: HashMap<String, Document> = HashMap::with_capacity(self.acc.len());
        let mut ids: Vec<String> = Vec::with_capacity(self.acc.len());

        for doc in self.acc.drain(..) {
            // 📡 Action line, then source line. Each gets its newline.
            // "index" here is the action type, not the index name.
            // Naming things: still hard. The store chose this. We just comply.
            let action = serde_json::json!({"index": {"_id": doc.id}});
            payload.push_str(&action.to_string());
            payload.push('\n');
            payload.push_str(&doc.body.to_string());
            payload.push('\n');

            ids.push(doc.id.clone());
            docs.insert(doc.id.clone(), doc);
        }

        Some(Task::bulk(payload, docs, ids))
    }

    /// 🔢 Documents currently waiting on the dock.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.acc.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TaskKind;
    use serde_json::json;

    fn doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            body: json!({"id": id, "text": format!("text for {id}")}),
        }
    }

    #[test]
    fn the_one_where_batch_size_one_skips_the_warehouse_entirely() {
        let mut batcher = Batcher::new(1);
        let task = batcher.add(doc("a1")).expect("💀 batch_size 1 must emit immediately");
        assert!(matches!(task.kind, TaskKind::Single { .. }));
        assert_eq!(batcher.pending(), 0, "nothing accumulates in the express lane");
        assert!(batcher.flush().is_none(), "and there is nothing to flush, ever");
    }

    #[test]
    fn the_one_where_the_auto_flush_fires_on_the_batch_size_plus_oneth_add() {
        let mut batcher = Batcher::new(3);
        assert!(batcher.add(doc("a")).is_none());
        assert!(batcher.add(doc("b")).is_none());
        assert!(batcher.add(doc("c")).is_none(), "exactly batch_size adds: still quiet");
        assert_eq!(batcher.pending(), 3);

        // 🚚 The fourth add pushes the full batch out BEFORE appending itself.
        let task = batcher.add(doc("d")).expect("💀 add #4 must trigger exactly one flush");
        assert_eq!(task.doc_count(), 3, "the flushed task holds exactly batch_size docs");
        assert_eq!(task.all_ids(), vec!["a".to_string(), "b".into(), "c".into()]);
        assert_eq!(batcher.pending(), 1, "the newcomer waits in the fresh batch");
    }

    #[test]
    fn the_one_where_the_final_flush_saves_the_partial_batch() {
        let mut batcher = Batcher::new(10);
        batcher.add(doc("x"));
        batcher.add(doc("y"));
        let task = batcher.flush().expect("💀 a partial batch must still ship at end of input");
        assert_eq!(task.doc_count(), 2);
        assert!(batcher.flush().is_none(), "flush resets the accumulator");
    }

    #[test]
    fn the_one_where_the_payload_alternates_action_and_document_lines() {
        let mut batcher = Batcher::new(2);
        batcher.add(doc("a"));
        batcher.add(doc("b"));
        let task = batcher.flush().unwrap();
        let TaskKind::Bulk { payload, docs, ids } = task.kind else {
            panic!("💀 expected a bulk task")
        };

        let lines: Vec<&str> = payload.trim_end_matches('\n').split('\n').collect();
        assert_eq!(lines.len(), 4, "two docs = four lines (action, doc, action, doc)");
        assert!(payload.ends_with('\n'), "bulk payloads are newline-terminated. Always.");

        let action: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action["index"]["_id"], "a");
        let body: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(body["id"], "a");

        // 🗺️ The retry map covers everyone aboard, in case the store gets picky.
        assert_eq!(ids, vec!["a".to_string(), "b".into()]);
        assert!(docs.contains_key("a") && docs.contains_key("b"));
    }
}
