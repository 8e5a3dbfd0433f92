//! Types used by more than one resource.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::Extras;
use crate::field::Field;
use crate::macros::string_enum;

string_enum! {
    /// ISO 4217 code of an amount's currency.
    pub enum Currency {
        Cad => "CAD",
        Chf => "CHF",
        Eur => "EUR",
        Gbp => "GBP",
        Jpy => "JPY",
        Usd => "USD",
    }
}

string_enum! {
    /// The `type` constant every API object carries.
    pub enum ObjectType {
        Account => "account",
        AccountTransfer => "account_transfer",
        AchTransfer => "ach_transfer",
        BalanceLookup => "balance_lookup",
        Card => "card",
        CardDetails => "card_details",
        Entity => "entity",
        Transaction => "transaction",
    }
}

/// Bounds on `created_at` for list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatedAtFilter {
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub after: Field<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub before: Field<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub on_or_after: Field<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub on_or_before: Field<DateTime<Utc>>,
}

/// Matches any of the listed values (`<name>.in=a,b`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InFilter<T> {
    #[serde(rename = "in")]
    pub values: Vec<T>,
}

impl<T> InFilter<T> {
    pub fn new(values: impl IntoIterator<Item = T>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }
}

impl<T> From<Vec<T>> for Field<InFilter<T>> {
    fn from(values: Vec<T>) -> Self {
        Field::Value(InFilter { values })
    }
}

/// Approval details on transfers created with `require_approval`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferApproval {
    pub approved_at: DateTime<Utc>,
    pub approved_by: Option<String>,
    #[serde(flatten)]
    pub extra: Extras,
}

/// Cancellation details on transfers canceled before submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferCancellation {
    pub canceled_at: DateTime<Utc>,
    pub canceled_by: Option<String>,
    #[serde(flatten)]
    pub extra: Extras,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::query::QueryEncoder;

    #[test]
    fn created_at_filter_encodes_with_dots() {
        let filter = CreatedAtFilter {
            on_or_after: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap().into(),
            ..Default::default()
        };
        let object = serde_json::json!({ "created_at": filter });
        let pairs = QueryEncoder::default().encode_object(object.as_object().unwrap());
        assert_eq!(
            pairs,
            vec![("created_at.on_or_after".to_string(), "2024-03-01T00:00:00Z".to_string())]
        );
    }

    #[test]
    fn in_filter_encodes_as_comma_list() {
        let filter: Field<InFilter<Currency>> = vec![Currency::Usd, Currency::Eur].into();
        let object = serde_json::json!({ "currency": filter });
        let pairs = QueryEncoder::default().encode_object(object.as_object().unwrap());
        assert_eq!(pairs, vec![("currency.in".to_string(), "USD,EUR".to_string())]);
    }

    #[test]
    fn approval_keeps_unknown_keys() {
        let body = r#"{"approved_at":"2020-01-31T23:59:59Z","approved_by":null,"approver_ip":"1.2.3.4"}"#;
        let approval: TransferApproval = serde_json::from_str(body).unwrap();
        assert_eq!(approval.approved_by, None);
        assert_eq!(approval.extra["approver_ip"], serde_json::json!("1.2.3.4"));
        assert_eq!(serde_json::to_string(&approval).unwrap(), body);
    }
}
