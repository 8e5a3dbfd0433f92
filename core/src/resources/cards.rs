//! Debit cards attached to accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::{require_id, Call, Client};
use crate::codec::{encode_body, Extras};
use crate::error::Result;
use crate::field::Field;
use crate::macros::{impl_params, impl_service, string_enum};
use crate::options::RequestOptions;
use crate::pagination::{AutoPager, Page, PageRequest};
use crate::resources::shared::{CreatedAtFilter, InFilter, ObjectType};

string_enum! {
    pub enum CardStatus {
        Active => "active",
        Disabled => "disabled",
        Canceled => "canceled",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillingAddress {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub line2: Field<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigitalWallet {
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub email: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub phone: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub digital_card_profile_id: Field<String>,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub account_id: String,
    pub billing_address: BillingAddress,
    pub created_at: DateTime<Utc>,
    pub description: Option<String>,
    pub digital_wallet: Option<DigitalWallet>,
    pub entity_id: Option<String>,
    pub expiration_month: u32,
    pub expiration_year: u32,
    pub idempotency_key: Option<String>,
    pub last4: String,
    pub status: CardStatus,
    #[serde(rename = "type")]
    pub kind: ObjectType,
    #[serde(flatten)]
    pub extra: Extras,
}

/// Sensitive card data. Only fetch this when it will be shown to the cardholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDetails {
    pub card_id: String,
    pub expiration_month: u32,
    pub expiration_year: u32,
    pub primary_account_number: String,
    pub verification_code: String,
    #[serde(rename = "type")]
    pub kind: ObjectType,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardCreateParams {
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub billing_address: Field<BillingAddress>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub description: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub digital_wallet: Field<DigitalWallet>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub entity_id: Field<String>,
    #[serde(skip)]
    pub extra_fields: Extras,
}

impl CardCreateParams {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardUpdateParams {
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub billing_address: Field<BillingAddress>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub description: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub digital_wallet: Field<DigitalWallet>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub entity_id: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub status: Field<CardStatus>,
    #[serde(skip)]
    pub extra_fields: Extras,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardListParams {
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub cursor: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub limit: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub account_id: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub idempotency_key: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub status: Field<InFilter<CardStatus>>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub created_at: Field<CreatedAtFilter>,
    #[serde(skip)]
    pub extra_fields: Extras,
}

impl_params!(CardCreateParams, CardUpdateParams, CardListParams);

#[derive(Debug, Clone)]
pub struct CardService {
    client: Client,
    options: RequestOptions,
}

impl_service!(CardService);

impl CardService {
    pub fn create(&self, params: &CardCreateParams) -> Result<Card> {
        let call = Call::post("/cards").with_body(encode_body(params)?);
        self.client.execute(&call, &self.options)
    }

    pub fn get(&self, card_id: &str) -> Result<Card> {
        let id = require_id("card_id", card_id)?;
        self.client.execute(&Call::get(format!("/cards/{id}")), &self.options)
    }

    pub fn update(&self, card_id: &str, params: &CardUpdateParams) -> Result<Card> {
        let id = require_id("card_id", card_id)?;
        let call = Call::patch(format!("/cards/{id}")).with_body(encode_body(params)?);
        self.client.execute(&call, &self.options)
    }

    pub fn list(&self, params: &CardListParams) -> Result<Page<Card>> {
        let query = self.client.resolve(&self.options).query_encoder.encode(params)?;
        self.client.execute_page("/cards", query, &self.options)
    }

    pub fn list_auto_paging(&self, params: &CardListParams) -> Result<AutoPager<Card>> {
        let query = self.client.resolve(&self.options).query_encoder.encode(params)?;
        let request = PageRequest::new(self.client.clone(), "/cards".into(), query, self.options.clone());
        Ok(AutoPager::new(request))
    }

    pub fn details(&self, card_id: &str) -> Result<CardDetails> {
        let id = require_id("card_id", card_id)?;
        self.client
            .execute(&Call::get(format!("/cards/{id}/details")), &self.options)
    }
}
