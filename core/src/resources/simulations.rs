//! Sandbox-only endpoints that push objects through states the real
//! networks would otherwise drive.

use serde::{Deserialize, Serialize};

use crate::client::{require_id, Call, Client};
use crate::codec::{encode_body, Extras};
use crate::error::Result;
use crate::field::Field;
use crate::macros::{impl_params, impl_service};
use crate::options::RequestOptions;
use crate::resources::account_transfers::AccountTransfer;
use crate::resources::ach_transfers::{AchReturnReasonCode, AchTransfer};

#[derive(Debug, Clone)]
pub struct SimulationService {
    client: Client,
    options: RequestOptions,
}

impl SimulationService {
    /// Sub-services inherit this service's options.
    pub fn account_transfers(&self) -> SimulationAccountTransferService {
        SimulationAccountTransferService::new(self.client.clone()).with_options(self.options.clone())
    }

    pub fn ach_transfers(&self) -> SimulationAchTransferService {
        SimulationAchTransferService::new(self.client.clone()).with_options(self.options.clone())
    }
}

#[derive(Debug, Clone)]
pub struct SimulationAccountTransferService {
    client: Client,
    options: RequestOptions,
}

impl SimulationAccountTransferService {
    /// Complete a pending account transfer, creating its transactions.
    pub fn complete(&self, account_transfer_id: &str) -> Result<AccountTransfer> {
        let id = require_id("account_transfer_id", account_transfer_id)?;
        let call = Call::post(format!("/simulations/account_transfers/{id}/complete"));
        self.client.execute(&call, &self.options)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AchTransferReturnParams {
    /// Defaults to `no_account` server-side.
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub reason: Field<AchReturnReasonCode>,
    #[serde(skip)]
    pub extra_fields: Extras,
}

impl_params!(AchTransferReturnParams);

#[derive(Debug, Clone)]
pub struct SimulationAchTransferService {
    client: Client,
    options: RequestOptions,
}

impl SimulationAchTransferService {
    /// Submit a pending ACH transfer to the (simulated) Federal Reserve.
    pub fn submit(&self, ach_transfer_id: &str) -> Result<AchTransfer> {
        let id = require_id("ach_transfer_id", ach_transfer_id)?;
        let call = Call::post(format!("/simulations/ach_transfers/{id}/submit"));
        self.client.execute(&call, &self.options)
    }

    /// Have the receiving bank return a submitted transfer.
    pub fn return_(&self, ach_transfer_id: &str, params: &AchTransferReturnParams) -> Result<AchTransfer> {
        let id = require_id("ach_transfer_id", ach_transfer_id)?;
        let call = Call::post(format!("/simulations/ach_transfers/{id}/return")).with_body(encode_body(params)?);
        self.client.execute(&call, &self.options)
    }
}

impl_service!(
    SimulationService,
    SimulationAccountTransferService,
    SimulationAchTransferService,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{client, json, Scripted};
    use crate::error::Error;
    use crate::resources::ach_transfers::tests::ACH_TRANSFER_JSON;

    #[test]
    fn return_posts_reason() {
        let transport = Scripted::new(vec![json(200, ACH_TRANSFER_JSON)]);
        let simulations = client(transport.clone()).simulations();
        let params = AchTransferReturnParams {
            reason: Field::value(AchReturnReasonCode::InsufficientFund),
            ..Default::default()
        };
        let transfer = simulations.ach_transfers().return_("ach_transfer_1", &params).unwrap();
        assert!(transfer.return_.is_some());

        let request = &transport.requests()[0];
        assert_eq!(
            request.url,
            "http://mock.test/simulations/ach_transfers/ach_transfer_1/return"
        );
        assert_eq!(request.body.as_deref(), Some(r#"{"reason":"insufficient_fund"}"#));
    }

    #[test]
    fn submit_sends_no_body() {
        let transport = Scripted::new(vec![json(200, ACH_TRANSFER_JSON)]);
        let simulations = client(transport.clone()).simulations();
        simulations.ach_transfers().submit("ach_transfer_1").unwrap();

        let request = &transport.requests()[0];
        assert!(request.body.is_none());
        assert!(request.header("Content-Type").is_none());
        assert!(request.header("Idempotency-Key").is_some());
    }

    #[test]
    fn sub_services_inherit_options() {
        let transport = Scripted::new(vec![json(200, ACH_TRANSFER_JSON)]);
        let simulations = client(transport.clone())
            .simulations()
            .with_options(RequestOptions::new().header("X-Trace", "sim"));
        simulations.ach_transfers().submit("ach_transfer_1").unwrap();
        assert_eq!(transport.requests()[0].header("X-Trace"), Some("sim"));
    }

    #[test]
    fn complete_requires_an_id() {
        let transport = Scripted::new(Vec::new());
        let simulations = client(transport.clone()).simulations();
        assert!(matches!(
            simulations.account_transfers().complete(""),
            Err(Error::MissingParameter("account_transfer_id"))
        ));
        assert!(transport.requests().is_empty());
    }
}
