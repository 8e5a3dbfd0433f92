//! Settled movements of money on an account.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{require_id, Call, Client};
use crate::codec::Extras;
use crate::error::Result;
use crate::field::Field;
use crate::macros::{impl_params, impl_service, string_enum};
use crate::options::RequestOptions;
use crate::pagination::{AutoPager, Page, PageRequest};
use crate::resources::ach_transfers::AchTransferReturn;
use crate::resources::shared::{CreatedAtFilter, Currency, InFilter, ObjectType};

string_enum! {
    pub enum TransactionCategory {
        AccountTransferIntention => "account_transfer_intention",
        AchTransferIntention => "ach_transfer_intention",
        AchTransferReturn => "ach_transfer_return",
        CardRefund => "card_refund",
        CardSettlement => "card_settlement",
        FeePayment => "fee_payment",
        InterestPayment => "interest_payment",
        /// The API's own catch-all category.
        OtherCategory => "other",
    }
}

string_enum! {
    pub enum RouteType {
        AccountNumber => "account_number",
        Card => "card",
        Lockbox => "lockbox",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub account_id: String,
    /// Minor units; negative for money leaving the account.
    pub amount: i64,
    pub created_at: DateTime<Utc>,
    pub currency: Currency,
    pub description: String,
    pub route_id: Option<String>,
    pub route_type: Option<RouteType>,
    pub source: TransactionSource,
    #[serde(rename = "type")]
    pub kind: ObjectType,
    #[serde(flatten)]
    pub extra: Extras,
}

/// What caused a transaction.
///
/// `category` names which detail object is populated. The others arrive as
/// explicit nulls. Details for categories this client does not model stay
/// in `extra` under their category key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSource {
    pub category: TransactionCategory,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub account_transfer_intention: Field<AccountTransferIntention>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub ach_transfer_intention: Field<AchTransferIntention>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub ach_transfer_return: Field<AchTransferReturn>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub card_refund: Field<CardRefund>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub card_settlement: Field<CardSettlement>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub fee_payment: Field<FeePayment>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub interest_payment: Field<InterestPayment>,
    #[serde(flatten)]
    pub extra: Extras,
}

/// The detail object selected by a source's `category`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceDetails<'a> {
    AccountTransferIntention(&'a AccountTransferIntention),
    AchTransferIntention(&'a AchTransferIntention),
    AchTransferReturn(&'a AchTransferReturn),
    CardRefund(&'a CardRefund),
    CardSettlement(&'a CardSettlement),
    FeePayment(&'a FeePayment),
    InterestPayment(&'a InterestPayment),
    /// Raw details of a category without a typed model.
    Other(&'a Value),
}

impl TransactionSource {
    /// `None` when the object named by `category` is missing or null.
    pub fn details(&self) -> Option<SourceDetails<'_>> {
        match &self.category {
            TransactionCategory::AccountTransferIntention => self
                .account_transfer_intention
                .as_value()
                .map(SourceDetails::AccountTransferIntention),
            TransactionCategory::AchTransferIntention => {
                self.ach_transfer_intention.as_value().map(SourceDetails::AchTransferIntention)
            }
            TransactionCategory::AchTransferReturn => {
                self.ach_transfer_return.as_value().map(SourceDetails::AchTransferReturn)
            }
            TransactionCategory::CardRefund => self.card_refund.as_value().map(SourceDetails::CardRefund),
            TransactionCategory::CardSettlement => self.card_settlement.as_value().map(SourceDetails::CardSettlement),
            TransactionCategory::FeePayment => self.fee_payment.as_value().map(SourceDetails::FeePayment),
            TransactionCategory::InterestPayment => {
                self.interest_payment.as_value().map(SourceDetails::InterestPayment)
            }
            other => self
                .extra
                .get(other.as_str())
                .filter(|value| !value.is_null())
                .map(SourceDetails::Other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountTransferIntention {
    pub amount: i64,
    pub currency: Currency,
    pub description: String,
    pub destination_account_id: String,
    pub source_account_id: String,
    pub transfer_id: String,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchTransferIntention {
    pub account_number: String,
    pub amount: i64,
    pub routing_number: String,
    pub statement_descriptor: String,
    pub transfer_id: String,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRefund {
    pub id: String,
    pub amount: i64,
    pub card_payment_id: Option<String>,
    pub currency: Currency,
    pub merchant_name: Option<String>,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSettlement {
    pub id: String,
    pub amount: i64,
    pub card_authorization: Option<String>,
    pub currency: Currency,
    pub merchant_name: Option<String>,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeePayment {
    pub amount: i64,
    pub currency: Currency,
    pub fee_period_start: NaiveDate,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestPayment {
    pub accrued_on_account_id: String,
    pub amount: i64,
    pub currency: Currency,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionListParams {
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub cursor: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub limit: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub account_id: Field<String>,
    /// Only transactions on this account number or card.
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub route_id: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub category: Field<InFilter<TransactionCategory>>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub created_at: Field<CreatedAtFilter>,
    #[serde(skip)]
    pub extra_fields: Extras,
}

impl_params!(TransactionListParams);

#[derive(Debug, Clone)]
pub struct TransactionService {
    client: Client,
    options: RequestOptions,
}

impl_service!(TransactionService);

impl TransactionService {
    pub fn get(&self, transaction_id: &str) -> Result<Transaction> {
        let id = require_id("transaction_id", transaction_id)?;
        self.client
            .execute(&Call::get(format!("/transactions/{id}")), &self.options)
    }

    pub fn list(&self, params: &TransactionListParams) -> Result<Page<Transaction>> {
        let query = self.client.resolve(&self.options).query_encoder.encode(params)?;
        self.client.execute_page("/transactions", query, &self.options)
    }

    pub fn list_auto_paging(&self, params: &TransactionListParams) -> Result<AutoPager<Transaction>> {
        let query = self.client.resolve(&self.options).query_encoder.encode(params)?;
        let request = PageRequest::new(self.client.clone(), "/transactions".into(), query, self.options.clone());
        Ok(AutoPager::new(request))
    }
}
