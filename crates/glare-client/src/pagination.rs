//! Cursor pagination over artifact listings.

use crate::http::Transport;
use crate::types::Artifact;
use crate::GlareError;
use serde_json::Value;
use std::collections::VecDeque;
use tracing::debug;

/// Lazy sequence of artifacts spread over server pages.
///
/// One GET is issued per page, only once the previous page has been drained.
/// The `next` link of each page drives the walk; a page without one ends it.
/// With an overall limit the iterator stops the moment the last wanted item
/// is handed out, and the `limit` query parameter is lowered on the final
/// request so the server does not send items that would be thrown away.
///
/// After an error the iterator is exhausted.
pub struct ArtifactPages<T: Transport> {
    transport: T,
    type_name: String,
    next_url: Option<String>,
    buffer: VecDeque<Artifact>,
    remaining: Option<usize>,
    page_size: usize,
    done: bool,
}

impl<T: Transport> ArtifactPages<T> {
    pub(crate) fn new(
        transport: T,
        type_name: &str,
        first_url: String,
        page_size: usize,
        limit: Option<usize>,
    ) -> Self {
        Self {
            transport,
            type_name: type_name.to_owned(),
            next_url: Some(first_url),
            buffer: VecDeque::new(),
            remaining: limit,
            page_size,
            done: limit == Some(0),
        }
    }

    fn fetch_page(&mut self, url: &str) -> Result<(), GlareError> {
        let url = match self.remaining {
            Some(remaining) if remaining < self.page_size => {
                rewrite_limit(url, self.page_size, remaining)
            }
            _ => url.to_owned(),
        };
        debug!("fetching artifact page {url}");
        let page = self.transport.get(&url)?;
        let items = page_items(&page, &self.type_name)?;
        self.buffer.extend(items);
        self.next_url = page
            .get("next")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Ok(())
    }
}

impl<T: Transport> Iterator for ArtifactPages<T> {
    type Item = Result<Artifact, GlareError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        while self.buffer.is_empty() {
            let Some(url) = self.next_url.take() else {
                self.done = true;
                return None;
            };
            if let Err(e) = self.fetch_page(&url) {
                self.done = true;
                return Some(Err(e));
            }
        }
        let item = self.buffer.pop_front()?;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                self.done = true;
                self.buffer.clear();
                self.next_url = None;
            }
        }
        Some(Ok(item))
    }
}

impl<T: Transport> std::iter::FusedIterator for ArtifactPages<T> {}

/// Items of one listing page. Newer services key them under `artifacts`,
/// older ones under the type name.
pub(crate) fn page_items(page: &Value, type_name: &str) -> Result<Vec<Artifact>, GlareError> {
    let list = page
        .get("artifacts")
        .or_else(|| page.get(type_name))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            GlareError::Serialization(format!(
                "listing response carries neither 'artifacts' nor '{type_name}'"
            ))
        })?;
    list.iter()
        .map(|item| {
            item.as_object().cloned().ok_or_else(|| {
                GlareError::Serialization("listing item is not an object".to_owned())
            })
        })
        .collect()
}

/// Replace the `limit={page_size}` query segment with `limit={wanted}`.
fn rewrite_limit(url: &str, page_size: usize, wanted: usize) -> String {
    let Some((path, query)) = url.split_once('?') else {
        return url.to_owned();
    };
    let from = format!("limit={page_size}");
    let segments: Vec<String> = query
        .split('&')
        .map(|seg| {
            if seg == from {
                format!("limit={wanted}")
            } else {
                seg.to_owned()
            }
        })
        .collect();
    format!("{path}?{}", segments.join("&"))
}
