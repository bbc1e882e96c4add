//! Balance lookup against the bch-js REST API.
//!
//! Reading the balance of the account linked to the token's user is a cheap
//! authenticated call; a rejected token fails it with 401/429.

use super::{ProbeError, ProbeReport, ValidationProbe};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

pub struct BalanceProbe {
    client: Client,
    base_url: String,
}

impl BalanceProbe {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    balance: String,
    #[serde(default)]
    unconfirmed_balance: Option<String>,
}

fn parse_satoshis(field: &str, raw: &str) -> Result<i64, ProbeError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ProbeError::MalformedResponse(format!("{field} '{raw}' is not an integer")))
}

#[async_trait]
impl ValidationProbe for BalanceProbe {
    fn name(&self) -> &str {
        "balance"
    }

    async fn check_account(&self, address: &str, token: &str) -> Result<ProbeReport, ProbeError> {
        let resp = self
            .client
            .get(format!("{}/blockbook/balance/{address}", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ProbeError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let body: BalanceResponse = resp
            .json()
            .await
            .map_err(|e| ProbeError::MalformedResponse(e.to_string()))?;
        let confirmed = parse_satoshis("balance", &body.balance)?;
        let unconfirmed = match body.unconfirmed_balance.as_deref() {
            Some(raw) => parse_satoshis("unconfirmedBalance", raw)?,
            None => 0,
        };
        let total = confirmed.checked_add(unconfirmed).ok_or_else(|| {
            ProbeError::MalformedResponse(format!(
                "balance {confirmed} plus unconfirmed {unconfirmed} overflows"
            ))
        })?;

        info!("Balance for account {address} is {total} satoshis");
        Ok(ProbeReport {
            ok: true,
            detail: format!("balance {total} satoshis at {address}"),
        })
    }
}
