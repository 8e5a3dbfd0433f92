//! Accounts: where money is held.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::client::{require_id, Call, Client};
use crate::codec::{encode_body, Extras};
use crate::error::Result;
use crate::field::Field;
use crate::macros::{impl_params, impl_service, string_enum};
use crate::options::RequestOptions;
use crate::pagination::{AutoPager, Page, PageRequest};
use crate::resources::shared::{CreatedAtFilter, Currency, InFilter, ObjectType};

string_enum! {
    pub enum AccountStatus {
        Closed => "closed",
        Open => "open",
    }
}

string_enum! {
    /// The partner bank holding the account.
    pub enum AccountBank {
        CoreBank => "core_bank",
        FirstInternetBank => "first_internet_bank",
        GrasshopperBank => "grasshopper_bank",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub bank: AccountBank,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub currency: Currency,
    pub entity_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub informational_entity_id: Option<String>,
    /// Accrued but unpaid interest, as a decimal string in the account currency.
    pub interest_accrued: String,
    pub interest_accrued_at: Option<NaiveDate>,
    pub interest_rate: String,
    pub name: String,
    pub program_id: Option<String>,
    pub status: AccountStatus,
    #[serde(rename = "type")]
    pub kind: ObjectType,
    #[serde(flatten)]
    pub extra: Extras,
}

/// Current and available balances, in minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceLookup {
    pub account_id: String,
    pub available_balance: i64,
    pub current_balance: i64,
    #[serde(rename = "type")]
    pub kind: ObjectType,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountCreateParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub entity_id: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub informational_entity_id: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub program_id: Field<String>,
    #[serde(skip)]
    pub extra_fields: Extras,
}

impl AccountCreateParams {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdateParams {
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub name: Field<String>,
    #[serde(skip)]
    pub extra_fields: Extras,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountListParams {
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub cursor: Field<String>,
    /// Page size, 1 to 100.
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub limit: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub entity_id: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub informational_entity_id: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub program_id: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub idempotency_key: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub status: Field<InFilter<AccountStatus>>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub created_at: Field<CreatedAtFilter>,
    #[serde(skip)]
    pub extra_fields: Extras,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountBalanceParams {
    /// Balance as of this moment instead of now.
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub at_time: Field<DateTime<Utc>>,
    #[serde(skip)]
    pub extra_fields: Extras,
}

impl_params!(
    AccountCreateParams,
    AccountUpdateParams,
    AccountListParams,
    AccountBalanceParams,
);

/// `/accounts` endpoints.
#[derive(Debug, Clone)]
pub struct AccountService {
    client: Client,
    options: RequestOptions,
}

impl_service!(AccountService);

impl AccountService {
    pub fn create(&self, params: &AccountCreateParams) -> Result<Account> {
        let call = Call::post("/accounts").with_body(encode_body(params)?);
        self.client.execute(&call, &self.options)
    }

    pub fn get(&self, account_id: &str) -> Result<Account> {
        let id = require_id("account_id", account_id)?;
        self.client.execute(&Call::get(format!("/accounts/{id}")), &self.options)
    }

    pub fn update(&self, account_id: &str, params: &AccountUpdateParams) -> Result<Account> {
        let id = require_id("account_id", account_id)?;
        let call = Call::patch(format!("/accounts/{id}")).with_body(encode_body(params)?);
        self.client.execute(&call, &self.options)
    }

    pub fn list(&self, params: &AccountListParams) -> Result<Page<Account>> {
        let query = self.client.resolve(&self.options).query_encoder.encode(params)?;
        self.client.execute_page("/accounts", query, &self.options)
    }

    /// Every account matching `params`, fetched page by page as iterated.
    pub fn list_auto_paging(&self, params: &AccountListParams) -> Result<AutoPager<Account>> {
        let query = self.client.resolve(&self.options).query_encoder.encode(params)?;
        let request = PageRequest::new(self.client.clone(), "/accounts".into(), query, self.options.clone());
        Ok(AutoPager::new(request))
    }

    pub fn close(&self, account_id: &str) -> Result<Account> {
        let id = require_id("account_id", account_id)?;
        self.client
            .execute(&Call::post(format!("/accounts/{id}/close")), &self.options)
    }

    pub fn balance(&self, account_id: &str, params: &AccountBalanceParams) -> Result<BalanceLookup> {
        let id = require_id("account_id", account_id)?;
        let query = self.client.resolve(&self.options).query_encoder.encode(params)?;
        let call = Call::get(format!("/accounts/{id}/balance")).with_query(query);
        self.client.execute(&call, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::client::testing::{client, json, Scripted};
    use crate::error::Error;
    use crate::http::HttpMethod;

    const ACCOUNT_JSON: &str = r#"{
        "id": "account_in71c4amph0vgo2qllky",
        "bank": "first_internet_bank",
        "closed_at": null,
        "created_at": "2020-01-31T23:59:59Z",
        "currency": "USD",
        "entity_id": "entity_n8y8tnk2p9339ti393yi",
        "idempotency_key": null,
        "informational_entity_id": null,
        "interest_accrued": "0.01",
        "interest_accrued_at": "2020-01-31",
        "interest_rate": "0.055",
        "name": "My first account!",
        "program_id": "program_i2v2os4mwza1oetokh9i",
        "status": "open",
        "type": "account",
        "loyalty_tier": "gold"
    }"#;

    #[test]
    fn account_decodes_and_keeps_extras() {
        let account: Account = serde_json::from_str(ACCOUNT_JSON).unwrap();
        assert_eq!(account.bank, AccountBank::FirstInternetBank);
        assert_eq!(account.status, AccountStatus::Open);
        assert_eq!(account.kind, ObjectType::Account);
        assert_eq!(account.extra["loyalty_tier"], json!("gold"));

        let back = serde_json::to_value(&account).unwrap();
        let original: serde_json::Value = serde_json::from_str(ACCOUNT_JSON).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn create_sends_only_set_fields() {
        let transport = Scripted::new(vec![json(200, ACCOUNT_JSON)]);
        let accounts = client(transport.clone()).accounts();

        let params = AccountCreateParams {
            entity_id: "entity_n8y8tnk2p9339ti393yi".into(),
            ..AccountCreateParams::new("My first account!")
        };
        let account = accounts.create(&params).unwrap();
        assert_eq!(account.name, "My first account!");

        let request = &transport.requests()[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "http://mock.test/accounts");
        let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({"name": "My first account!", "entity_id": "entity_n8y8tnk2p9339ti393yi"})
        );
    }

    #[test]
    fn update_can_send_explicit_empty_name() {
        let transport = Scripted::new(vec![json(200, ACCOUNT_JSON)]);
        let accounts = client(transport.clone()).accounts();
        let params = AccountUpdateParams {
            name: Field::value(String::new()),
            ..Default::default()
        };
        accounts.update("account_in71c4amph0vgo2qllky", &params).unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.method, HttpMethod::Patch);
        assert_eq!(request.body.as_deref(), Some(r#"{"name":""}"#));
    }

    #[test]
    fn get_with_empty_id_fails_locally() {
        let transport = Scripted::new(Vec::new());
        let accounts = client(transport.clone()).accounts();
        assert!(matches!(accounts.get(""), Err(Error::MissingParameter("account_id"))));
        assert!(matches!(accounts.close(""), Err(Error::MissingParameter("account_id"))));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn ids_are_escaped_into_one_segment() {
        let transport = Scripted::new(vec![json(200, ACCOUNT_JSON), json(200, ACCOUNT_JSON)]);
        let accounts = client(transport.clone()).accounts();
        accounts.get("a/b").unwrap();
        accounts.close("x#y").unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].url, "http://mock.test/accounts/a%2Fb");
        assert_eq!(requests[1].url, "http://mock.test/accounts/x%23y/close");
        assert_eq!(
            requests[1].full_url().unwrap().as_str(),
            "http://mock.test/accounts/x%23y/close"
        );
    }

    #[test]
    fn list_encodes_filters() {
        let transport = Scripted::new(vec![json(
            200,
            &format!(r#"{{"data":[{ACCOUNT_JSON}],"next_cursor":"v57w5d"}}"#),
        )]);
        let accounts = client(transport.clone()).accounts();
        let params = AccountListParams {
            limit: Field::value(1),
            entity_id: "entity_n8y8tnk2p9339ti393yi".into(),
            status: vec![AccountStatus::Open].into(),
            ..Default::default()
        };
        let page = accounts.list(&params).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page.next_cursor.as_deref(), Some("v57w5d"));

        let request = &transport.requests()[0];
        assert_eq!(
            request.query,
            vec![
                ("entity_id".to_string(), "entity_n8y8tnk2p9339ti393yi".to_string()),
                ("limit".to_string(), "1".to_string()),
                ("status.in".to_string(), "open".to_string()),
            ]
        );
    }

    #[test]
    fn balance_passes_at_time() {
        let transport = Scripted::new(vec![json(
            200,
            r#"{"account_id":"account_1","available_balance":100,"current_balance":150,"type":"balance_lookup"}"#,
        )]);
        let accounts = client(transport.clone()).accounts();
        let params = AccountBalanceParams {
            at_time: "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap().into(),
            ..Default::default()
        };
        let balance = accounts.balance("account_1", &params).unwrap();
        assert_eq!(balance.current_balance, 150);

        let request = &transport.requests()[0];
        assert_eq!(request.url, "http://mock.test/accounts/account_1/balance");
        assert_eq!(request.query_param("at_time"), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn service_options_layer_over_client_options() {
        let transport = Scripted::new(vec![json(200, ACCOUNT_JSON)]);
        let accounts = client(transport.clone())
            .accounts()
            .with_options(RequestOptions::new().api_key("service-key").idempotency_key("abc"));
        accounts.close("account_1").unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.header("Authorization"), Some("Bearer service-key"));
        assert_eq!(request.header("Idempotency-Key"), Some("abc"));
    }
}
