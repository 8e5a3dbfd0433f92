//! ACH transfers out of an Increase account.

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
    pub enum AchTransferStatus {
        PendingApproval => "pending_approval",
        PendingSubmission => "pending_submission",
        Canceled => "canceled",
        Submitted => "submitted",
        Returned => "returned",
        Rejected => "rejected",
    }
}

string_enum! {
    pub enum StandardEntryClassCode {
        CorporateCreditOrDebit => "corporate_credit_or_debit",
        PrearrangedPaymentsAndDeposit => "prearranged_payments_and_deposit",
        InternetInitiated => "internet_initiated",
    }
}

string_enum! {
    /// Why the receiving bank sent the transfer back.
    pub enum AchReturnReasonCode {
        InsufficientFund => "insufficient_fund",
        NoAccount => "no_account",
        AccountClosed => "account_closed",
        InvalidAccountNumberStructure => "invalid_account_number_structure",
        AuthorizationRevokedByCustomer => "authorization_revoked_by_customer",
        PaymentStopped => "payment_stopped",
        UncollectedFunds => "uncollected_funds",
        Unauthorized => "unauthorized",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchTransfer {
    pub id: String,
    pub account_id: String,
    pub account_number: String,
    /// Positive for credits to the counterparty, negative for debits.
    pub amount: i64,
    pub approval: Option<TransferApproval>,
    pub cancellation: Option<TransferCancellation>,
    pub company_descriptive_date: Option<String>,
    pub company_discretionary_data: Option<String>,
    pub company_entry_description: Option<String>,
    pub company_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub currency: Currency,
    pub external_account_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub individual_id: Option<String>,
    pub individual_name: Option<String>,
    pub network: String,
    pub pending_transaction_id: Option<String>,
    #[serde(rename = "return")]
    pub return_: Option<AchTransferReturn>,
    pub routing_number: String,
    pub standard_entry_class_code: StandardEntryClassCode,
    pub statement_descriptor: String,
    pub status: AchTransferStatus,
    pub submission: Option<AchTransferSubmission>,
    pub transaction_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: ObjectType,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchTransferSubmission {
    pub submitted_at: DateTime<Utc>,
    pub trace_number: String,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchTransferReturn {
    pub created_at: DateTime<Utc>,
    pub raw_return_reason_code: String,
    pub return_reason_code: AchReturnReasonCode,
    pub transaction_id: String,
    pub transfer_id: String,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AchTransferCreateParams {
    pub account_id: String,
    pub amount: i64,
    /// Shows up on the recipient's bank statement.
    pub statement_descriptor: String,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub account_number: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub routing_number: Field<String>,
    /// Use a saved external account instead of account and routing numbers.
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub external_account_id: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub company_descriptive_date: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub company_discretionary_data: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub company_entry_description: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub company_name: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub individual_id: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub individual_name: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub require_approval: Field<bool>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub standard_entry_class_code: Field<StandardEntryClassCode>,
    #[serde(skip)]
    pub extra_fields: Extras,
}

impl AchTransferCreateParams {
    pub fn new(account_id: impl Into<String>, amount: i64, statement_descriptor: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            amount,
            statement_descriptor: statement_descriptor.into(),
            ..Default::default()
        }
    }

    /// Send to a counterparty by account and routing number.
    pub fn to_account(mut self, account_number: impl Into<String>, routing_number: impl Into<String>) -> Self {
        self.account_number = Field::value(account_number.into());
        self.routing_number = Field::value(routing_number.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AchTransferListParams {
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub cursor: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub limit: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub account_id: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub external_account_id: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub idempotency_key: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub status: Field<InFilter<AchTransferStatus>>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub created_at: Field<CreatedAtFilter>,
    #[serde(skip)]
    pub extra_fields: Extras,
}

impl_params!(AchTransferCreateParams, AchTransferListParams);

#[derive(Debug, Clone)]
pub struct AchTransferService {
    client: Client,
    options: RequestOptions,
}

impl_service!(AchTransferService);

impl AchTransferService {
    pub fn create(&self, params: &AchTransferCreateParams) -> Result<AchTransfer> {
        let call = Call::post("/ach_transfers").with_body(encode_body(params)?);
        self.client.execute(&call, &self.options)
    }

    pub fn get(&self, ach_transfer_id: &str) -> Result<AchTransfer> {
        let id = require_id("ach_transfer_id", ach_transfer_id)?;
        self.client
            .execute(&Call::get(format!("/ach_transfers/{id}")), &self.options)
    }

    pub fn list(&self, params: &AchTransferListParams) -> Result<Page<AchTransfer>> {
        let query = self.client.resolve(&self.options).query_encoder.encode(params)?;
        self.client.execute_page("/ach_transfers", query, &self.options)
    }

    pub fn list_auto_paging(&self, params: &AchTransferListParams) -> Result<AutoPager<AchTransfer>> {
        let query = self.client.resolve(&self.options).query_encoder.encode(params)?;
        let request = PageRequest::new(self.client.clone(), "/ach_transfers".into(), query, self.options.clone());
        Ok(AutoPager::new(request))
    }

    pub fn approve(&self, ach_transfer_id: &str) -> Result<AchTransfer> {
        let id = require_id("ach_transfer_id", ach_transfer_id)?;
        self.client
            .execute(&Call::post(format!("/ach_transfers/{id}/approve")), &self.options)
    }

    /// Cancel a transfer that has not been submitted yet.
    pub fn cancel(&self, ach_transfer_id: &str) -> Result<AchTransfer> {
        let id = require_id("ach_transfer_id", ach_transfer_id)?;
        self.client
            .execute(&Call::post(format!("/ach_transfers/{id}/cancel")), &self.options)
    }
}
