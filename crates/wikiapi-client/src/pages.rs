//! Reassembly of page objects from paged query results.

use serde_json::Value;
use std::collections::{HashSet, VecDeque};

use crate::continuation::Continuation;
use crate::error::{Result, WikiError};

/// Yields complete page objects from a `query` stream.
///
/// A page can arrive split over several responses. It is held back until a
/// response no longer mentions it. Pages whose `lastrevid` changes between
/// fragments are dropped and reported as
/// [`WikiError::PagesModified`] after every other page has been yielded.
/// Missing pages are yielded once per title.
pub struct PageStream<'a> {
    results: Continuation<'a>,
    incomplete: Vec<(u64, Value)>,
    ready: VecDeque<Value>,
    modified: Vec<u64>,
    missing: HashSet<String>,
    pending_error: Option<WikiError>,
    done: bool,
}

impl<'a> PageStream<'a> {
    pub(crate) fn new(results: Continuation<'a>) -> Self {
        Self {
            results,
            incomplete: Vec::new(),
            ready: VecDeque::new(),
            modified: Vec::new(),
            missing: HashSet::new(),
            pending_error: None,
            done: false,
        }
    }

    /// Override parameters for the next underlying request.
    pub fn inject(&mut self, adjustments: crate::Params) {
        self.results.inject(adjustments);
    }

    /// Next complete page.
    pub async fn next(&mut self) -> Option<Result<Value>> {
        loop {
            if let Some(page) = self.ready.pop_front() {
                return Some(Ok(page));
            }
            if self.done {
                return self.pending_error.take().map(Err);
            }

            match self.results.next().await {
                Some(Ok(result)) => {
                    if let Err(e) = self.absorb(result) {
                        self.abort();
                        return Some(Err(e));
                    }
                }
                Some(Err(e)) => {
                    self.abort();
                    return Some(Err(e));
                }
                None => self.finish(),
            }
        }
    }

    fn absorb(&mut self, mut result: Value) -> Result<()> {
        let pages = match result.get_mut("pages") {
            Some(Value::Array(pages)) => std::mem::take(pages),
            _ => {
                return Err(WikiError::protocol(
                    "Missing pages element in query result",
                    result,
                ))
            }
        };

        let mut previous = std::mem::take(&mut self.incomplete);
        let mut current: Vec<(u64, Value)> = Vec::new();

        for page in pages {
            if page.get("missing").is_some() {
                let title = page
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if self.missing.insert(title) {
                    self.ready.push_back(page);
                }
                continue;
            }

            let id = match page.get("pageid").and_then(Value::as_u64) {
                Some(id) => id,
                None => {
                    return Err(WikiError::protocol(
                        "Page without pageid in query result",
                        page,
                    ))
                }
            };
            if self.modified.contains(&id) {
                continue;
            }

            if let Some(pos) = previous.iter().position(|(pid, _)| *pid == id) {
                let (_, mut existing) = previous.remove(pos);
                if revision_changed(&existing, &page) {
                    self.mark_modified(id);
                    continue;
                }
                merge_page(&mut existing, page);
                current.push((id, existing));
            } else if let Some(pos) = current.iter().position(|(pid, _)| *pid == id) {
                if revision_changed(&current[pos].1, &page) {
                    current.remove(pos);
                    self.mark_modified(id);
                    continue;
                }
                merge_page(&mut current[pos].1, page);
            } else {
                current.push((id, page));
            }
        }

        // Pages not mentioned again are complete
        self.ready.extend(previous.into_iter().map(|(_, page)| page));
        self.incomplete = current;
        Ok(())
    }

    fn mark_modified(&mut self, id: u64) {
        tracing::debug!(code = "page-modified", pageid = id, "Page changed during iteration");
        if !self.modified.contains(&id) {
            self.modified.push(id);
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.ready
            .extend(self.incomplete.drain(..).map(|(_, page)| page));
        if !self.modified.is_empty() {
            self.pending_error = Some(WikiError::PagesModified {
                ids: std::mem::take(&mut self.modified),
            });
        }
    }

    fn abort(&mut self) {
        self.done = true;
        self.incomplete.clear();
        self.ready.clear();
        self.modified.clear();
    }
}

fn revision_changed(existing: &Value, fragment: &Value) -> bool {
    match fragment.get("lastrevid") {
        Some(revision) => existing.get("lastrevid") != Some(revision),
        None => false,
    }
}

/// Merge a page fragment into a page.
///
/// Objects merge key by key, arrays are concatenated and any other value
/// replaces the existing one.
pub fn merge_page(target: &mut Value, fragment: Value) {
    match (target, fragment) {
        (Value::Object(target), Value::Object(fragment)) => {
            for (key, value) in fragment {
                match target.get_mut(&key) {
                    Some(existing) => merge_page(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(items)) => target.extend(items),
        (target, fragment) => *target = fragment,
    }
}
