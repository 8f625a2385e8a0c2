//! Cursor-paginated listing
//!
//! Children of a thread (messages, runs) or a run (steps) are ordered by
//! `created_at`, ties broken by id. Ids may be chosen by the caller, so key
//! order is not creation order and `paginate` sorts before cutting a page.
//!
//! Cursors are exclusive: `after = X` starts with the first item past `X`
//! in the requested order, `before = Y` stops at the last item ahead of `Y`.
//! A cursor naming no listed item falls back to comparing ids.

use runkeeper_core::{Error, Message, Result, Run, Step, Timestamp};
use serde::{Deserialize, Serialize};

/// Page size used when the caller does not pass one
pub const DEFAULT_LIMIT: usize = 20;

/// Largest accepted page size
pub const MAX_LIMIT: usize = 100;

/// Sort direction by creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    /// Oldest first
    Asc,
    /// Newest first
    #[default]
    Desc,
}

/// Paging parameters accepted by the list operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    /// Page size, `1..=MAX_LIMIT`
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Sort direction
    #[serde(default)]
    pub order: Order,
    /// Exclusive start cursor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// Exclusive end cursor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            order: Order::default(),
            after: None,
            before: None,
        }
    }
}

impl ListParams {
    /// Default parameters: 20 items, newest first
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page size
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the sort direction
    pub fn with_order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Start after the item with this id
    pub fn after(mut self, id: impl Into<String>) -> Self {
        self.after = Some(id.into());
        self
    }

    /// Stop before the item with this id
    pub fn before(mut self, id: impl Into<String>) -> Self {
        self.before = Some(id.into());
        self
    }

    /// Reject a page size outside `1..=MAX_LIMIT`.
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(Error::invalid_input(format!(
                "limit must be between 1 and {}, got {}",
                MAX_LIMIT, self.limit
            )));
        }
        Ok(())
    }

    /// Whether `id` lies strictly past `cursor` in this order.
    fn is_past(&self, id: &str, cursor: &str) -> bool {
        match self.order {
            Order::Asc => id > cursor,
            Order::Desc => id < cursor,
        }
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct List<T> {
    /// Items in the requested order
    pub data: Vec<T>,
    /// Id of the first item on the page
    pub first_id: Option<String>,
    /// Id of the last item on the page
    pub last_id: Option<String>,
    /// Whether more items follow the last one
    pub has_more: bool,
}

/// Records that can be paged by id
pub trait Listable {
    /// Public id used as a cursor
    fn list_id(&self) -> &str;

    /// Creation time, the primary sort key
    fn list_created_at(&self) -> Timestamp;
}

/// Creation order: `created_at`, then id
pub fn sort_by_creation<T: Listable>(items: &mut [T]) {
    items.sort_by(|a, b| {
        (a.list_created_at(), a.list_id()).cmp(&(b.list_created_at(), b.list_id()))
    });
}

impl Listable for Message {
    fn list_id(&self) -> &str {
        self.id.as_str()
    }

    fn list_created_at(&self) -> Timestamp {
        self.created_at
    }
}

impl Listable for Run {
    fn list_id(&self) -> &str {
        self.id.as_str()
    }

    fn list_created_at(&self) -> Timestamp {
        self.created_at
    }
}

impl Listable for Step {
    fn list_id(&self) -> &str {
        self.id.as_str()
    }

    fn list_created_at(&self) -> Timestamp {
        self.created_at
    }
}

/// Cut one page out of `items`, in any order.
pub fn paginate<T: Listable>(mut items: Vec<T>, params: &ListParams) -> Result<List<T>> {
    params.validate()?;

    sort_by_creation(&mut items);
    if params.order == Order::Desc {
        items.reverse();
    }

    let position = |cursor: &str| items.iter().position(|item| item.list_id() == cursor);
    let start = match params.after.as_deref() {
        Some(cursor) => match position(cursor) {
            Some(i) => i + 1,
            None => items
                .iter()
                .take_while(|item| !params.is_past(item.list_id(), cursor))
                .count(),
        },
        None => 0,
    };
    let end = match params.before.as_deref() {
        Some(cursor) => match position(cursor) {
            Some(i) => i,
            None => items
                .iter()
                .take_while(|item| params.is_past(cursor, item.list_id()))
                .count(),
        },
        None => items.len(),
    };

    let window = end.saturating_sub(start);
    let has_more = window > params.limit;
    let data: Vec<T> = items
        .into_iter()
        .skip(start)
        .take(window.min(params.limit))
        .collect();

    Ok(List {
        first_id: data.first().map(|item| item.list_id().to_string()),
        last_id: data.last().map(|item| item.list_id().to_string()),
        has_more,
        data,
    })
}
