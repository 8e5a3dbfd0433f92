use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::ApiError,
    store::{new_id, now, Collection, Db, Fault, Record, Store},
    validate::Fields,
};

type ApiResult = Result<Json<Value>, ApiError>;
type Body = Result<Json<Map<String, Value>>, JsonRejection>;
type ListQuery = Query<HashMap<String, String>>;

const STRUCTURES: [&str; 5] = [
    "corporation",
    "natural_person",
    "joint",
    "trust",
    "government_authority",
];

const RETURN_CODES: [(&str, &str); 8] = [
    ("insufficient_fund", "R01"),
    ("account_closed", "R02"),
    ("no_account", "R03"),
    ("invalid_account_number_structure", "R04"),
    ("authorization_revoked_by_customer", "R07"),
    ("payment_stopped", "R08"),
    ("uncollected_funds", "R09"),
    ("unauthorized", "R10"),
];

fn object(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn text(record: &Record, field: &str) -> String {
    record.get(field).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn idempotency_key(headers: &HeaderMap) -> Value {
    headers
        .get("idempotency-key")
        .and_then(|value| value.to_str().ok())
        .map_or(Value::Null, |key| Value::String(key.to_string()))
}

fn created_at(record: &Record) -> Option<DateTime<Utc>> {
    record
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|at| at.with_timezone(&Utc))
}

fn new_transaction(id: String, account_id: &str, amount: i64, description: &str, category: &str, details: Value) -> Record {
    let mut source = Map::new();
    source.insert("category".into(), Value::from(category));
    source.insert(category.into(), details);
    object(json!({
        "id": id,
        "account_id": account_id,
        "amount": amount,
        "created_at": now(),
        "currency": "USD",
        "description": description,
        "route_id": null,
        "route_type": null,
        "source": source,
        "type": "transaction",
    }))
}

/// The account must exist and be open; reported as a field error.
fn check_open_account(store: &Store, field: &str, account_id: &str) -> Result<(), ApiError> {
    let account = store
        .get(Collection::Accounts, account_id)
        .map_err(|_| ApiError::invalid_field(field, "does not exist"))?;
    if account["status"] != "open" {
        return Err(ApiError::invalid_operation(format!("Account {account_id} is closed.")));
    }
    Ok(())
}

fn require_status(record: &Record, allowed: &[&str], what: &str) -> Result<(), ApiError> {
    let status = text(record, "status");
    if allowed.contains(&status.as_str()) {
        Ok(())
    } else {
        Err(ApiError::invalid_operation(format!(
            "{what} {} has status {status}.",
            text(record, "id")
        )))
    }
}

// --- accounts ---

pub async fn create_account(State(db): State<Db>, headers: HeaderMap, body: Body) -> ApiResult {
    let mut fields = Fields::from_body(body)?;
    let name = fields.required_str("name");
    let entity_id = fields.optional_str("entity_id");
    let informational_entity_id = fields.optional_str("informational_entity_id");
    let program_id = fields.optional_str("program_id");
    fields.finish()?;

    let mut store = db.write().await;
    for (field, id) in [("entity_id", &entity_id), ("informational_entity_id", &informational_entity_id)] {
        if let Some(id) = id {
            if store.get(Collection::Entities, id).is_err() {
                return Err(ApiError::invalid_field(field, "does not exist"));
            }
        }
    }
    let account = object(json!({
        "id": new_id(Collection::Accounts),
        "bank": "first_internet_bank",
        "closed_at": null,
        "created_at": now(),
        "currency": "USD",
        "entity_id": entity_id,
        "idempotency_key": idempotency_key(&headers),
        "informational_entity_id": informational_entity_id,
        "interest_accrued": "0.00",
        "interest_accrued_at": null,
        "interest_rate": "0.00",
        "name": name,
        "program_id": program_id.unwrap_or_else(|| "program_i2v2os4mwza1oetokh9i".to_string()),
        "status": "open",
        "type": "account",
    }));
    let account = store.insert(Collection::Accounts, account);
    info!(id = %account["id"], "account created");
    Ok(Json(account))
}

pub async fn get_account(State(db): State<Db>, Path(account_id): Path<String>) -> ApiResult {
    let store = db.read().await;
    Ok(Json(Value::Object(store.get(Collection::Accounts, &account_id)?.clone())))
}

pub async fn update_account(State(db): State<Db>, Path(account_id): Path<String>, body: Body) -> ApiResult {
    let mut fields = Fields::from_body(body)?;
    let name = fields.has("name").then(|| fields.required_str("name"));
    fields.finish()?;

    let mut store = db.write().await;
    let account = store.get_mut(Collection::Accounts, &account_id)?;
    require_status(account, &["open"], "Account")?;
    if let Some(name) = name {
        account.insert("name".into(), Value::String(name));
    }
    Ok(Json(Value::Object(account.clone())))
}

pub async fn list_accounts(State(db): State<Db>, Query(query): ListQuery) -> ApiResult {
    db.read().await.list(Collection::Accounts, &query).map(Json)
}

pub async fn close_account(State(db): State<Db>, Path(account_id): Path<String>) -> ApiResult {
    let mut store = db.write().await;
    store.get(Collection::Accounts, &account_id)?;
    let balance = current_balance(&store, &account_id, None);
    let account = store.get_mut(Collection::Accounts, &account_id)?;
    require_status(account, &["open"], "Account")?;
    if balance != 0 {
        return Err(ApiError::invalid_operation(format!(
            "Account {account_id} has a balance of {balance} and cannot be closed."
        )));
    }
    account.insert("status".into(), Value::from("closed"));
    account.insert("closed_at".into(), Value::from(now()));
    Ok(Json(Value::Object(account.clone())))
}

pub async fn account_balance(
    State(db): State<Db>,
    Path(account_id): Path<String>,
    Query(query): ListQuery,
) -> ApiResult {
    let at_time = match query.get("at_time") {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|_| ApiError::invalid_field("at_time", "must be an RFC 3339 timestamp"))?,
        ),
        None => None,
    };
    let store = db.read().await;
    store.get(Collection::Accounts, &account_id)?;
    let current = current_balance(&store, &account_id, at_time);
    Ok(Json(json!({
        "account_id": account_id,
        "available_balance": current - pending_holds(&store, &account_id),
        "current_balance": current,
        "type": "balance_lookup",
    })))
}

fn current_balance(store: &Store, account_id: &str, at: Option<DateTime<Utc>>) -> i64 {
    store
        .all(Collection::Transactions)
        .filter(|t| t["account_id"] == account_id)
        .filter(|t| at.map_or(true, |at| created_at(t).is_some_and(|created| created <= at)))
        .filter_map(|t| t["amount"].as_i64())
        .sum()
}

/// Outgoing money that is committed but not yet settled.
fn pending_holds(store: &Store, account_id: &str) -> i64 {
    let book = store
        .all(Collection::AccountTransfers)
        .filter(|t| t["account_id"] == account_id && t["status"] == "pending_approval")
        .filter_map(|t| t["amount"].as_i64());
    let ach = store
        .all(Collection::AchTransfers)
        .filter(|t| {
            t["account_id"] == account_id
                && (t["status"] == "pending_approval" || t["status"] == "pending_submission")
        })
        .filter_map(|t| t["amount"].as_i64())
        .filter(|amount| *amount > 0);
    book.chain(ach).sum()
}

// --- account transfers ---

pub async fn create_account_transfer(State(db): State<Db>, headers: HeaderMap, body: Body) -> ApiResult {
    let mut fields = Fields::from_body(body)?;
    let account_id = fields.required_str("account_id");
    let amount = fields.required_i64("amount");
    let description = fields.required_str("description");
    let destination_account_id = fields.required_str("destination_account_id");
    let require_approval = fields.optional_bool("require_approval").unwrap_or(false);
    if fields.has("amount") && amount <= 0 {
        fields.fail("amount", "must be positive");
    }
    if !account_id.is_empty() && account_id == destination_account_id {
        fields.fail("destination_account_id", "must differ from account_id");
    }
    fields.finish()?;

    let mut store = db.write().await;
    check_open_account(&store, "account_id", &account_id)?;
    check_open_account(&store, "destination_account_id", &destination_account_id)?;

    let mut transfer = object(json!({
        "id": new_id(Collection::AccountTransfers),
        "account_id": account_id,
        "amount": amount,
        "approval": null,
        "cancellation": null,
        "created_at": now(),
        "currency": "USD",
        "description": description,
        "destination_account_id": destination_account_id,
        "destination_transaction_id": null,
        "idempotency_key": idempotency_key(&headers),
        "network": "account",
        "pending_transaction_id": null,
        "status": "pending_approval",
        "transaction_id": null,
        "type": "account_transfer",
    }));
    if !require_approval {
        settle_account_transfer(&mut store, &mut transfer);
    }
    Ok(Json(store.insert(Collection::AccountTransfers, transfer)))
}

/// Mark the transfer complete and book both sides of it.
fn settle_account_transfer(store: &mut Store, transfer: &mut Record) {
    let id = text(transfer, "id");
    let amount = transfer["amount"].as_i64().unwrap_or_default();
    let source = text(transfer, "account_id");
    let destination = text(transfer, "destination_account_id");
    let description = text(transfer, "description");
    let intention = json!({
        "amount": amount,
        "currency": "USD",
        "description": description,
        "destination_account_id": destination,
        "source_account_id": source,
        "transfer_id": id,
    });

    let debit_id = new_id(Collection::Transactions);
    let credit_id = new_id(Collection::Transactions);
    store.insert(
        Collection::Transactions,
        new_transaction(debit_id.clone(), &source, -amount, &description, "account_transfer_intention", intention.clone()),
    );
    store.insert(
        Collection::Transactions,
        new_transaction(credit_id.clone(), &destination, amount, &description, "account_transfer_intention", intention),
    );
    transfer.insert("status".into(), Value::from("complete"));
    transfer.insert("transaction_id".into(), Value::from(debit_id));
    transfer.insert("destination_transaction_id".into(), Value::from(credit_id));
}

pub async fn get_account_transfer(State(db): State<Db>, Path(id): Path<String>) -> ApiResult {
    let store = db.read().await;
    Ok(Json(Value::Object(store.get(Collection::AccountTransfers, &id)?.clone())))
}

pub async fn list_account_transfers(State(db): State<Db>, Query(query): ListQuery) -> ApiResult {
    db.read().await.list(Collection::AccountTransfers, &query).map(Json)
}

pub async fn approve_account_transfer(State(db): State<Db>, Path(id): Path<String>) -> ApiResult {
    let mut store = db.write().await;
    let mut transfer = store.get(Collection::AccountTransfers, &id)?.clone();
    require_status(&transfer, &["pending_approval"], "Account Transfer")?;
    transfer.insert("approval".into(), json!({ "approved_at": now(), "approved_by": null }));
    settle_account_transfer(&mut store, &mut transfer);
    *store.get_mut(Collection::AccountTransfers, &id)? = transfer.clone();
    Ok(Json(Value::Object(transfer)))
}

pub async fn cancel_account_transfer(State(db): State<Db>, Path(id): Path<String>) -> ApiResult {
    let mut store = db.write().await;
    let transfer = store.get_mut(Collection::AccountTransfers, &id)?;
    require_status(transfer, &["pending_approval"], "Account Transfer")?;
    transfer.insert("status".into(), Value::from("canceled"));
    transfer.insert("cancellation".into(), json!({ "canceled_at": now(), "canceled_by": null }));
    Ok(Json(Value::Object(transfer.clone())))
}

pub async fn simulate_account_transfer_complete(State(db): State<Db>, Path(id): Path<String>) -> ApiResult {
    let mut store = db.write().await;
    let mut transfer = store.get(Collection::AccountTransfers, &id)?.clone();
    require_status(&transfer, &["pending_approval"], "Account Transfer")?;
    settle_account_transfer(&mut store, &mut transfer);
    *store.get_mut(Collection::AccountTransfers, &id)? = transfer.clone();
    Ok(Json(Value::Object(transfer)))
}

// --- ACH transfers ---

pub async fn create_ach_transfer(State(db): State<Db>, headers: HeaderMap, body: Body) -> ApiResult {
    let mut fields = Fields::from_body(body)?;
    let account_id = fields.required_str("account_id");
    let amount = fields.required_i64("amount");
    let statement_descriptor = fields.required_str("statement_descriptor");
    let external_account_id = fields.optional_str("external_account_id");
    let (account_number, routing_number) = if external_account_id.is_some() {
        (
            fields.optional_str("account_number").unwrap_or_default(),
            fields.optional_str("routing_number").unwrap_or_default(),
        )
    } else {
        (fields.required_str("account_number"), fields.required_str("routing_number"))
    };
    if !routing_number.is_empty() && !(routing_number.len() == 9 && routing_number.bytes().all(|b| b.is_ascii_digit())) {
        fields.fail("routing_number", "must be 9 digits");
    }
    if fields.has("amount") && amount == 0 {
        fields.fail("amount", "must not be zero");
    }
    let mut optional = Map::new();
    for field in [
        "company_descriptive_date",
        "company_discretionary_data",
        "company_entry_description",
        "company_name",
        "individual_id",
        "individual_name",
    ] {
        optional.insert(field.into(), fields.optional_str(field).map_or(Value::Null, Value::from));
    }
    let require_approval = fields.optional_bool("require_approval").unwrap_or(false);
    let sec_code = fields.one_of(
        "standard_entry_class_code",
        &["corporate_credit_or_debit", "prearranged_payments_and_deposit", "internet_initiated"],
        Some("corporate_credit_or_debit"),
    );
    fields.finish()?;

    let mut store = db.write().await;
    check_open_account(&store, "account_id", &account_id)?;

    let status = if require_approval { "pending_approval" } else { "pending_submission" };
    let transfer = object(json!({
        "id": new_id(Collection::AchTransfers),
        "account_id": account_id,
        "account_number": account_number,
        "amount": amount,
        "approval": null,
        "cancellation": null,
        "company_descriptive_date": optional["company_descriptive_date"],
        "company_discretionary_data": optional["company_discretionary_data"],
        "company_entry_description": optional["company_entry_description"],
        "company_name": optional["company_name"],
        "created_at": now(),
        "currency": "USD",
        "external_account_id": external_account_id,
        "idempotency_key": idempotency_key(&headers),
        "individual_id": optional["individual_id"],
        "individual_name": optional["individual_name"],
        "network": "ach",
        "pending_transaction_id": null,
        "return": null,
        "routing_number": routing_number,
        "standard_entry_class_code": sec_code,
        "statement_descriptor": statement_descriptor,
        "status": status,
        "submission": null,
        "transaction_id": null,
        "type": "ach_transfer",
    }));
    Ok(Json(store.insert(Collection::AchTransfers, transfer)))
}

pub async fn get_ach_transfer(State(db): State<Db>, Path(id): Path<String>) -> ApiResult {
    let store = db.read().await;
    Ok(Json(Value::Object(store.get(Collection::AchTransfers, &id)?.clone())))
}

pub async fn list_ach_transfers(State(db): State<Db>, Query(query): ListQuery) -> ApiResult {
    db.read().await.list(Collection::AchTransfers, &query).map(Json)
}

pub async fn approve_ach_transfer(State(db): State<Db>, Path(id): Path<String>) -> ApiResult {
    let mut store = db.write().await;
    let transfer = store.get_mut(Collection::AchTransfers, &id)?;
    require_status(transfer, &["pending_approval"], "ACH Transfer")?;
    transfer.insert("status".into(), Value::from("pending_submission"));
    transfer.insert("approval".into(), json!({ "approved_at": now(), "approved_by": null }));
    Ok(Json(Value::Object(transfer.clone())))
}

pub async fn cancel_ach_transfer(State(db): State<Db>, Path(id): Path<String>) -> ApiResult {
    let mut store = db.write().await;
    let transfer = store.get_mut(Collection::AchTransfers, &id)?;
    require_status(transfer, &["pending_approval"], "ACH Transfer")?;
    transfer.insert("status".into(), Value::from("canceled"));
    transfer.insert("cancellation".into(), json!({ "canceled_at": now(), "canceled_by": null }));
    Ok(Json(Value::Object(transfer.clone())))
}

pub async fn simulate_ach_submit(State(db): State<Db>, Path(id): Path<String>) -> ApiResult {
    let mut store = db.write().await;
    let mut transfer = store.get(Collection::AchTransfers, &id)?.clone();
    require_status(&transfer, &["pending_submission"], "ACH Transfer")?;

    let amount = transfer["amount"].as_i64().unwrap_or_default();
    let transaction_id = new_id(Collection::Transactions);
    let intention = json!({
        "account_number": text(&transfer, "account_number"),
        "amount": amount,
        "routing_number": text(&transfer, "routing_number"),
        "statement_descriptor": text(&transfer, "statement_descriptor"),
        "transfer_id": id,
    });
    store.insert(
        Collection::Transactions,
        new_transaction(
            transaction_id.clone(),
            &text(&transfer, "account_id"),
            -amount,
            &text(&transfer, "statement_descriptor"),
            "ach_transfer_intention",
            intention,
        ),
    );

    let trace_number = format!("{:015}", Uuid::new_v4().as_u128() % 1_000_000_000_000_000);
    transfer.insert("status".into(), Value::from("submitted"));
    transfer.insert(
        "submission".into(),
        json!({ "submitted_at": now(), "trace_number": trace_number }),
    );
    transfer.insert("transaction_id".into(), Value::from(transaction_id));
    *store.get_mut(Collection::AchTransfers, &id)? = transfer.clone();
    Ok(Json(Value::Object(transfer)))
}

pub async fn simulate_ach_return(State(db): State<Db>, Path(id): Path<String>, body: Body) -> ApiResult {
    let mut fields = Fields::from_body(body)?;
    let codes: Vec<&str> = RETURN_CODES.iter().map(|(name, _)| *name).collect();
    let reason = fields.one_of("reason", &codes, Some("no_account"));
    fields.finish()?;

    let mut store = db.write().await;
    let mut transfer = store.get(Collection::AchTransfers, &id)?.clone();
    require_status(&transfer, &["submitted"], "ACH Transfer")?;

    let raw_code = RETURN_CODES
        .iter()
        .find(|(name, _)| *name == reason)
        .map_or("R03", |(_, code)| *code);
    let transaction_id = new_id(Collection::Transactions);
    let returned = json!({
        "created_at": now(),
        "raw_return_reason_code": raw_code,
        "return_reason_code": reason,
        "transaction_id": transaction_id,
        "transfer_id": id,
    });
    store.insert(
        Collection::Transactions,
        new_transaction(
            transaction_id,
            &text(&transfer, "account_id"),
            transfer["amount"].as_i64().unwrap_or_default(),
            "ACH return",
            "ach_transfer_return",
            returned.clone(),
        ),
    );
    transfer.insert("status".into(), Value::from("returned"));
    transfer.insert("return".into(), returned);
    *store.get_mut(Collection::AchTransfers, &id)? = transfer.clone();
    Ok(Json(Value::Object(transfer)))
}

// --- cards ---

fn check_billing_address(address: &mut Fields) {
    address.required_str("line1");
    address.optional_str("line2");
    address.required_str("city");
    address.required_str("state");
    address.required_str("postal_code");
}

fn check_digital_wallet(wallet: &mut Fields) {
    wallet.optional_str("email");
    wallet.optional_str("phone");
    wallet.optional_str("digital_card_profile_id");
}

pub async fn create_card(State(db): State<Db>, headers: HeaderMap, body: Body) -> ApiResult {
    let mut fields = Fields::from_body(body)?;
    let account_id = fields.required_str("account_id");
    let billing_address = fields.object("billing_address", false, check_billing_address);
    let digital_wallet = fields.object("digital_wallet", false, check_digital_wallet);
    let description = fields.optional_str("description");
    let entity_id = fields.optional_str("entity_id");
    fields.finish()?;

    let mut store = db.write().await;
    check_open_account(&store, "account_id", &account_id)?;

    let today = Utc::now();
    let last4 = format!("{:04}", Uuid::new_v4().as_u128() % 10_000);
    let card = object(json!({
        "id": new_id(Collection::Cards),
        "account_id": account_id,
        "billing_address": billing_address.unwrap_or_else(|| json!({
            "line1": "", "line2": null, "city": "", "state": "", "postal_code": ""
        })),
        "created_at": now(),
        "description": description,
        "digital_wallet": digital_wallet,
        "entity_id": entity_id,
        "expiration_month": today.month(),
        "expiration_year": today.year() + 3,
        "idempotency_key": idempotency_key(&headers),
        "last4": last4,
        "status": "active",
        "type": "card",
    }));
    Ok(Json(store.insert(Collection::Cards, card)))
}

pub async fn get_card(State(db): State<Db>, Path(card_id): Path<String>) -> ApiResult {
    let store = db.read().await;
    Ok(Json(Value::Object(store.get(Collection::Cards, &card_id)?.clone())))
}

pub async fn update_card(State(db): State<Db>, Path(card_id): Path<String>, body: Body) -> ApiResult {
    let mut fields = Fields::from_body(body)?;
    let mut changes = Map::new();
    if fields.has("description") {
        let description = fields.optional_str("description");
        changes.insert("description".into(), description.map_or(Value::Null, Value::from));
    }
    if fields.has("status") {
        let status = fields.one_of("status", &["active", "disabled", "canceled"], None);
        changes.insert("status".into(), Value::from(status));
    }
    if fields.has("entity_id") {
        let entity_id = fields.optional_str("entity_id");
        changes.insert("entity_id".into(), entity_id.map_or(Value::Null, Value::from));
    }
    if let Some(address) = fields.object("billing_address", false, check_billing_address) {
        changes.insert("billing_address".into(), address);
    }
    if let Some(wallet) = fields.object("digital_wallet", false, check_digital_wallet) {
        changes.insert("digital_wallet".into(), wallet);
    }
    fields.finish()?;

    let mut store = db.write().await;
    let card = store.get_mut(Collection::Cards, &card_id)?;
    require_status(card, &["active", "disabled"], "Card")?;
    card.extend(changes);
    Ok(Json(Value::Object(card.clone())))
}

pub async fn list_cards(State(db): State<Db>, Query(query): ListQuery) -> ApiResult {
    db.read().await.list(Collection::Cards, &query).map(Json)
}

pub async fn card_details(State(db): State<Db>, Path(card_id): Path<String>) -> ApiResult {
    let store = db.read().await;
    let card = store.get(Collection::Cards, &card_id)?;
    Ok(Json(json!({
        "card_id": card_id,
        "expiration_month": card["expiration_month"],
        "expiration_year": card["expiration_year"],
        "primary_account_number": format!("424242424242{}", text(card, "last4")),
        "verification_code": "123",
        "type": "card_details",
    })))
}

// --- entities ---

fn check_address(address: &mut Fields) {
    address.required_str("line1");
    address.optional_str("line2");
    address.required_str("city");
    address.required_str("state");
    address.required_str("zip");
}

fn check_individual(person: &mut Fields) {
    person.required_str("name");
    let birthday = person.required_str("date_of_birth");
    if !birthday.is_empty() && NaiveDate::parse_from_str(&birthday, "%Y-%m-%d").is_err() {
        person.fail("date_of_birth", "must be a YYYY-MM-DD date");
    }
    person.object("address", true, check_address);
}

fn check_structure(structure: &str, details: &mut Fields) {
    match structure {
        "corporation" => {
            details.required_str("name");
            details.object("address", true, check_address);
            if !details.has("beneficial_owners") {
                details.fail("beneficial_owners", "is required");
            }
        }
        "natural_person" => check_individual(details),
        "joint" => {
            let count = details.raw("individuals").and_then(Value::as_array).map_or(0, Vec::len);
            if count < 2 {
                details.fail("individuals", "must list at least two individuals");
            }
        }
        "trust" => {
            details.required_str("name");
            details.one_of("category", &["revocable", "irrevocable"], None);
            details.object("address", true, check_address);
        }
        _ => {
            details.required_str("name");
            details.object("address", true, check_address);
        }
    }
}

pub async fn create_entity(State(db): State<Db>, headers: HeaderMap, body: Body) -> ApiResult {
    let mut fields = Fields::from_body(body)?;
    let structure = fields.one_of("structure", &STRUCTURES, None);
    let description = fields.optional_str("description");
    let mut entity = object(json!({
        "id": new_id(Collection::Entities),
        "created_at": now(),
        "description": description,
        "idempotency_key": idempotency_key(&headers),
        "status": "active",
        "structure": structure,
    }));
    for name in STRUCTURES {
        let details = if name == structure {
            fields.object(name, true, |details| check_structure(name, details))
        } else {
            if fields.raw(name).is_some() {
                fields.fail(name, &format!("must be absent when structure is {structure}"));
            }
            None
        };
        entity.insert(name.into(), details.unwrap_or(Value::Null));
    }
    entity.insert("type".into(), Value::from("entity"));
    fields.finish()?;

    let mut store = db.write().await;
    Ok(Json(store.insert(Collection::Entities, entity)))
}

pub async fn get_entity(State(db): State<Db>, Path(entity_id): Path<String>) -> ApiResult {
    let store = db.read().await;
    Ok(Json(Value::Object(store.get(Collection::Entities, &entity_id)?.clone())))
}

pub async fn list_entities(State(db): State<Db>, Query(query): ListQuery) -> ApiResult {
    db.read().await.list(Collection::Entities, &query).map(Json)
}

pub async fn archive_entity(State(db): State<Db>, Path(entity_id): Path<String>) -> ApiResult {
    let mut store = db.write().await;
    store.get(Collection::Entities, &entity_id)?;
    let open_accounts = store
        .all(Collection::Accounts)
        .filter(|a| a["entity_id"] == entity_id.as_str() && a["status"] == "open")
        .count();
    let entity = store.get_mut(Collection::Entities, &entity_id)?;
    require_status(entity, &["active", "disabled"], "Entity")?;
    if open_accounts > 0 {
        return Err(ApiError::invalid_operation(format!(
            "Entity {entity_id} still has {open_accounts} open account(s)."
        )));
    }
    entity.insert("status".into(), Value::from("archived"));
    Ok(Json(Value::Object(entity.clone())))
}

// --- transactions ---

pub async fn get_transaction(State(db): State<Db>, Path(transaction_id): Path<String>) -> ApiResult {
    let store = db.read().await;
    Ok(Json(Value::Object(store.get(Collection::Transactions, &transaction_id)?.clone())))
}

pub async fn list_transactions(State(db): State<Db>, Query(query): ListQuery) -> ApiResult {
    db.read().await.list(Collection::Transactions, &query).map(Json)
}

// --- mock controls ---

#[derive(Debug, Deserialize)]
pub struct FaultRequest {
    #[serde(default = "one")]
    pub count: usize,
    pub status: u16,
    #[serde(default)]
    pub retry_after: Option<u64>,
}

fn one() -> usize {
    1
}

/// Queue failures for the next `count` API requests.
pub async fn inject_faults(State(db): State<Db>, Json(input): Json<FaultRequest>) -> ApiResult {
    let status = StatusCode::from_u16(input.status)
        .ok()
        .filter(|status| status.is_client_error() || status.is_server_error())
        .ok_or_else(|| ApiError::invalid_field("status", "must be an HTTP error status"))?;
    db.write().await.push_faults(
        input.count,
        Fault {
            status,
            retry_after: input.retry_after,
        },
    );
    info!(count = input.count, %status, "faults queued");
    Ok(Json(json!({ "queued": input.count })))
}

pub async fn route_not_found() -> ApiError {
    ApiError::route_not_found()
}
