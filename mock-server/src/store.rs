use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use axum::{body::Bytes, http::StatusCode};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ApiError;

pub type Db = Arc<RwLock<Store>>;
pub type Record = Map<String, Value>;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Accounts,
    AccountTransfers,
    AchTransfers,
    Cards,
    Entities,
    Transactions,
}

impl Collection {
    fn prefix(self) -> &'static str {
        match self {
            Collection::Accounts => "account",
            Collection::AccountTransfers => "account_transfer",
            Collection::AchTransfers => "ach_transfer",
            Collection::Cards => "card",
            Collection::Entities => "entity",
            Collection::Transactions => "transaction",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Collection::Accounts => "Account",
            Collection::AccountTransfers => "Account Transfer",
            Collection::AchTransfers => "ACH Transfer",
            Collection::Cards => "Card",
            Collection::Entities => "Entity",
            Collection::Transactions => "Transaction",
        }
    }
}

/// The request an idempotency key was first used for, and its response.
#[derive(Debug, Clone)]
pub struct Replay {
    pub method: String,
    pub path: String,
    pub request_body: Bytes,
    /// `None` while that first request is still running.
    pub response: Option<(StatusCode, Bytes)>,
}

impl Replay {
    pub fn same_request(&self, method: &str, path: &str, body: &Bytes) -> bool {
        self.method == method && self.path == path && self.request_body == *body
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub status: StatusCode,
    pub retry_after: Option<u64>,
}

/// Everything the mock remembers between requests.
#[derive(Debug, Default)]
pub struct Store {
    records: HashMap<Collection, Vec<Record>>,
    pub replays: HashMap<String, Replay>,
    faults: VecDeque<Fault>,
}

pub fn new_id(collection: Collection) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}_{}", collection.prefix(), &random[..20])
}

pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Store {
    pub fn insert(&mut self, collection: Collection, record: Record) -> Value {
        self.records.entry(collection).or_default().push(record.clone());
        Value::Object(record)
    }

    pub fn get(&self, collection: Collection, id: &str) -> Result<&Record, ApiError> {
        self.records
            .get(&collection)
            .and_then(|records| records.iter().find(|r| r["id"] == id))
            .ok_or_else(|| ApiError::not_found(collection.label(), id))
    }

    pub fn get_mut(&mut self, collection: Collection, id: &str) -> Result<&mut Record, ApiError> {
        self.records
            .get_mut(&collection)
            .and_then(|records| records.iter_mut().find(|r| r["id"] == id))
            .ok_or_else(|| ApiError::not_found(collection.label(), id))
    }

    pub fn all(&self, collection: Collection) -> impl DoubleEndedIterator<Item = &Record> {
        self.records.get(&collection).into_iter().flatten()
    }

    /// One page of `collection`, newest first, filtered by `query`.
    pub fn list(&self, collection: Collection, query: &HashMap<String, String>) -> Result<Value, ApiError> {
        let limit = parse_limit(query)?;
        let filter = Filter::parse(query)?;

        let mut matching = self.all(collection).rev().filter(|record| filter.matches(record));
        if let Some(cursor) = query.get("cursor") {
            if !matching.any(|record| record["id"] == cursor.as_str()) {
                return Err(ApiError::malformed(format!("Unknown cursor {cursor}.")));
            }
        }

        let data: Vec<Value> = matching.by_ref().take(limit).cloned().map(Value::Object).collect();
        let has_more = matching.next().is_some();
        let next_cursor = match (has_more, data.last()) {
            (true, Some(last)) => last["id"].clone(),
            _ => Value::Null,
        };
        Ok(serde_json::json!({ "data": data, "next_cursor": next_cursor }))
    }

    pub fn push_faults(&mut self, count: usize, fault: Fault) {
        self.faults.extend(std::iter::repeat(fault).take(count));
    }

    pub fn take_fault(&mut self) -> Option<Fault> {
        self.faults.pop_front()
    }
}

fn parse_limit(query: &HashMap<String, String>) -> Result<usize, ApiError> {
    let Some(raw) = query.get("limit") else {
        return Ok(DEFAULT_LIMIT);
    };
    match raw.parse::<usize>() {
        Ok(limit) if (1..=MAX_LIMIT).contains(&limit) => Ok(limit),
        _ => Err(ApiError::invalid_field(
            "limit",
            &format!("must be an integer between 1 and {MAX_LIMIT}"),
        )),
    }
}

/// List filters understood by every collection.
struct Filter {
    equals: Vec<(String, String)>,
    status: Option<Vec<String>>,
    category: Option<Vec<String>>,
    created_at: Vec<(Bound, DateTime<Utc>)>,
}

#[derive(Clone, Copy)]
enum Bound {
    After,
    Before,
    OnOrAfter,
    OnOrBefore,
}

impl Filter {
    fn parse(query: &HashMap<String, String>) -> Result<Self, ApiError> {
        let mut filter = Filter {
            equals: Vec::new(),
            status: None,
            category: None,
            created_at: Vec::new(),
        };
        for (key, value) in query {
            let list = || value.split(',').map(str::to_string).collect::<Vec<_>>();
            match key.as_str() {
                "cursor" | "limit" => {}
                "status.in" => filter.status = Some(list()),
                "category.in" => filter.category = Some(list()),
                "created_at.after" => filter.created_at.push((Bound::After, parse_time(key, value)?)),
                "created_at.before" => filter.created_at.push((Bound::Before, parse_time(key, value)?)),
                "created_at.on_or_after" => filter.created_at.push((Bound::OnOrAfter, parse_time(key, value)?)),
                "created_at.on_or_before" => filter.created_at.push((Bound::OnOrBefore, parse_time(key, value)?)),
                _ => filter.equals.push((key.clone(), value.clone())),
            }
        }
        Ok(filter)
    }

    fn matches(&self, record: &Record) -> bool {
        let equals = self.equals.iter().all(|(key, value)| match record.get(key) {
            Some(Value::String(actual)) => actual == value,
            Some(Value::Null) => false,
            Some(other) => other.to_string() == *value,
            None => false,
        });
        let status = self.status.as_ref().map_or(true, |allowed| {
            record
                .get("status")
                .and_then(Value::as_str)
                .is_some_and(|s| allowed.iter().any(|a| a == s))
        });
        let category = self.category.as_ref().map_or(true, |allowed| {
            record
                .get("source")
                .and_then(|source| source["category"].as_str())
                .is_some_and(|c| allowed.iter().any(|a| a == c))
        });
        let created_at = record
            .get("created_at")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|at| at.with_timezone(&Utc));
        let in_range = self.created_at.iter().all(|(bound, limit)| match created_at {
            Some(at) => match bound {
                Bound::After => at > *limit,
                Bound::Before => at < *limit,
                Bound::OnOrAfter => at >= *limit,
                Bound::OnOrBefore => at <= *limit,
            },
            None => false,
        });
        equals && status && category && in_range
    }
}

fn parse_time(key: &str, value: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|_| ApiError::invalid_field(key, "must be an RFC 3339 timestamp"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(id: &str, status: &str) -> Record {
        json!({ "id": id, "status": status, "account_id": "account_1", "created_at": "2024-01-01T00:00:00Z" })
            .as_object()
            .cloned()
            .unwrap()
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn lists_newest_first_with_cursor() {
        let mut store = Store::default();
        for id in ["a", "b", "c"] {
            store.insert(Collection::Accounts, record(id, "open"));
        }

        let first = store.list(Collection::Accounts, &query(&[("limit", "2")])).unwrap();
        assert_eq!(first["data"][0]["id"], "c");
        assert_eq!(first["data"][1]["id"], "b");
        assert_eq!(first["next_cursor"], "b");

        let second = store
            .list(Collection::Accounts, &query(&[("limit", "2"), ("cursor", "b")]))
            .unwrap();
        assert_eq!(second["data"].as_array().unwrap().len(), 1);
        assert_eq!(second["data"][0]["id"], "a");
        assert!(second["next_cursor"].is_null());
    }

    #[test]
    fn filters_by_status_and_field() {
        let mut store = Store::default();
        store.insert(Collection::Accounts, record("a", "open"));
        store.insert(Collection::Accounts, record("b", "closed"));

        let page = store
            .list(Collection::Accounts, &query(&[("status.in", "closed"), ("account_id", "account_1")]))
            .unwrap();
        assert_eq!(page["data"].as_array().unwrap().len(), 1);
        assert_eq!(page["data"][0]["id"], "b");
    }

    #[test]
    fn filter_on_a_missing_key_matches_nothing() {
        let mut store = Store::default();
        store.insert(Collection::Accounts, record("a", "open"));

        let page = store
            .list(Collection::Accounts, &query(&[("entity_id", "entity_1")]))
            .unwrap();
        assert!(page["data"].as_array().unwrap().is_empty());
        assert!(page["next_cursor"].is_null());
    }

    #[test]
    fn rejects_out_of_range_limit() {
        let store = Store::default();
        let err = store.list(Collection::Accounts, &query(&[("limit", "0")])).unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.errors[0].0, "limit");
    }

    #[test]
    fn unknown_cursor_is_malformed() {
        let store = Store::default();
        let err = store.list(Collection::Accounts, &query(&[("cursor", "nope")])).unwrap_err();
        assert_eq!(err.kind, "malformed_request_error");
    }

    #[test]
    fn faults_are_consumed_in_order() {
        let mut store = Store::default();
        let fault = Fault {
            status: StatusCode::SERVICE_UNAVAILABLE,
            retry_after: None,
        };
        store.push_faults(2, fault);
        assert_eq!(store.take_fault(), Some(fault));
        assert_eq!(store.take_fault(), Some(fault));
        assert_eq!(store.take_fault(), None);
    }
}
