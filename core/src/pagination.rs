//! Cursor pagination for list endpoints.
//!
//! # Design
//! A `Page` remembers the request that produced it (path, query, options),
//! so asking for the next page only swaps in the `cursor` parameter. An
//! `AutoPager` walks those pages lazily as an iterator of items; every call
//! to a `list_auto_paging` method starts a fresh walk from the first page.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::client::{Call, Client};
use crate::codec::Extras;
use crate::error::Result;
use crate::options::RequestOptions;

const CURSOR_PARAM: &str = "cursor";

/// One page of a list response.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Absent or empty on the last page.
    pub next_cursor: Option<String>,
    pub extra: Extras,
    request: PageRequest,
}

#[derive(Deserialize)]
struct PageBody<T> {
    data: Vec<T>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(flatten)]
    extra: Extras,
}

/// Everything needed to (re)issue a list request.
#[derive(Debug, Clone)]
pub(crate) struct PageRequest {
    client: Client,
    path: String,
    query: Vec<(String, String)>,
    options: RequestOptions,
}

impl PageRequest {
    pub fn new(client: Client, path: String, query: Vec<(String, String)>, options: RequestOptions) -> Self {
        Self {
            client,
            path,
            query,
            options,
        }
    }

    pub fn fetch<T: DeserializeOwned>(&self) -> Result<Page<T>> {
        let call = Call::get(self.path.as_str()).with_query(self.query.clone());
        let body: PageBody<T> = self.client.execute(&call, &self.options)?;
        Ok(Page {
            data: body.data,
            next_cursor: body.next_cursor,
            extra: body.extra,
            request: self.clone(),
        })
    }

    fn with_cursor(&self, cursor: &str) -> PageRequest {
        let mut query: Vec<(String, String)> = self
            .query
            .iter()
            .filter(|(key, _)| key != CURSOR_PARAM)
            .cloned()
            .collect();
        query.push((CURSOR_PARAM.to_string(), cursor.to_string()));
        query.sort_by(|a, b| a.0.cmp(&b.0));
        PageRequest {
            query,
            ..self.clone()
        }
    }
}

impl<T> Page<T> {
    pub fn has_next_page(&self) -> bool {
        self.next_cursor.as_deref().is_some_and(|c| !c.is_empty())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn next_request(&self) -> Option<PageRequest> {
        self.next_cursor
            .as_deref()
            .filter(|cursor| !cursor.is_empty())
            .map(|cursor| self.request.with_cursor(cursor))
    }
}

impl<T: DeserializeOwned> Page<T> {
    /// Fetch the following page; `Ok(None)` without a request on the last page.
    pub fn next_page(&self) -> Result<Option<Page<T>>> {
        match self.next_request() {
            Some(request) => request.fetch().map(Some),
            None => Ok(None),
        }
    }

    /// Iterate this page's items and then every later page's.
    pub fn into_auto_pager(self) -> AutoPager<T> {
        let next = self.next_request();
        AutoPager {
            state: PagerState::Draining {
                items: self.data.into_iter(),
                next,
            },
        }
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

/// Lazy iterator over the items of every page.
///
/// The first failed page fetch is yielded as `Err` and ends the iteration.
#[derive(Debug)]
pub struct AutoPager<T> {
    state: PagerState<T>,
}

#[derive(Debug)]
enum PagerState<T> {
    Pending(PageRequest),
    Draining {
        items: std::vec::IntoIter<T>,
        next: Option<PageRequest>,
    },
    Done,
}

impl<T> AutoPager<T> {
    pub(crate) fn new(request: PageRequest) -> Self {
        Self {
            state: PagerState::Pending(request),
        }
    }
}

impl<T: DeserializeOwned> Iterator for AutoPager<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, PagerState::Done) {
                PagerState::Done => return None,
                PagerState::Pending(request) => match request.fetch::<T>() {
                    Ok(page) => {
                        let next = page.next_request();
                        self.state = PagerState::Draining {
                            items: page.data.into_iter(),
                            next,
                        };
                    }
                    Err(err) => return Some(Err(err)),
                },
                PagerState::Draining { mut items, next } => {
                    if let Some(item) = items.next() {
                        self.state = PagerState::Draining { items, next };
                        return Some(Ok(item));
                    }
                    match next {
                        Some(request) => self.state = PagerState::Pending(request),
                        None => return None,
                    }
                }
            }
        }
    }
}
