//! Book transfers between two Increase accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::{require_id, Call, Client};
use crate::codec::{encode_body, Extras};
use crate::error::Result;
use crate::field::Field;
use crate::macros::{impl_params, impl_service, string_enum};
use crate::options::RequestOptions;
use crate::pagination::{AutoPager, Page, PageRequest};
use crate::resources::shared::{
    CreatedAtFilter, Currency, InFilter, ObjectType, TransferApproval, TransferCancellation,
};

string_enum! {
    pub enum AccountTransferStatus {
        PendingApproval => "pending_approval",
        Canceled => "canceled",
        Complete => "complete",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountTransfer {
    pub id: String,
    pub account_id: String,
    /// Minor units of `currency`.
    pub amount: i64,
    pub approval: Option<TransferApproval>,
    pub cancellation: Option<TransferCancellation>,
    pub created_at: DateTime<Utc>,
    pub currency: Currency,
    pub description: String,
    pub destination_account_id: String,
    pub destination_transaction_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub network: String,
    pub pending_transaction_id: Option<String>,
    pub status: AccountTransferStatus,
    pub transaction_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: ObjectType,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountTransferCreateParams {
    pub account_id: String,
    pub amount: i64,
    pub description: String,
    pub destination_account_id: String,
    /// Hold the transfer in `pending_approval` until approved.
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub require_approval: Field<bool>,
    #[serde(skip)]
    pub extra_fields: Extras,
}

impl AccountTransferCreateParams {
    pub fn new(
        account_id: impl Into<String>,
        destination_account_id: impl Into<String>,
        amount: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            amount,
            description: description.into(),
            destination_account_id: destination_account_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountTransferListParams {
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub cursor: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub limit: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub account_id: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub idempotency_key: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub status: Field<InFilter<AccountTransferStatus>>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub created_at: Field<CreatedAtFilter>,
    #[serde(skip)]
    pub extra_fields: Extras,
}

impl_params!(AccountTransferCreateParams, AccountTransferListParams);

#[derive(Debug, Clone)]
pub struct AccountTransferService {
    client: Client,
    options: RequestOptions,
}

impl_service!(AccountTransferService);

impl AccountTransferService {
    pub fn create(&self, params: &AccountTransferCreateParams) -> Result<AccountTransfer> {
        let call = Call::post("/account_transfers").with_body(encode_body(params)?);
        self.client.execute(&call, &self.options)
    }

    pub fn get(&self, account_transfer_id: &str) -> Result<AccountTransfer> {
        let id = require_id("account_transfer_id", account_transfer_id)?;
        self.client
            .execute(&Call::get(format!("/account_transfers/{id}")), &self.options)
    }

    pub fn list(&self, params: &AccountTransferListParams) -> Result<Page<AccountTransfer>> {
        let query = self.client.resolve(&self.options).query_encoder.encode(params)?;
        self.client.execute_page("/account_transfers", query, &self.options)
    }

    pub fn list_auto_paging(&self, params: &AccountTransferListParams) -> Result<AutoPager<AccountTransfer>> {
        let query = self.client.resolve(&self.options).query_encoder.encode(params)?;
        let request = PageRequest::new(
            self.client.clone(),
            "/account_transfers".into(),
            query,
            self.options.clone(),
        );
        Ok(AutoPager::new(request))
    }

    /// Approve a transfer created with `require_approval`.
    pub fn approve(&self, account_transfer_id: &str) -> Result<AccountTransfer> {
        let id = require_id("account_transfer_id", account_transfer_id)?;
        self.client
            .execute(&Call::post(format!("/account_transfers/{id}/approve")), &self.options)
    }

    pub fn cancel(&self, account_transfer_id: &str) -> Result<AccountTransfer> {
        let id = require_id("account_transfer_id", account_transfer_id)?;
        self.client
            .execute(&Call::post(format!("/account_transfers/{id}/cancel")), &self.options)
    }
}
