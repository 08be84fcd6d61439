//! Remote gateways.
//!
//! Thin request/response wrappers over the payment provider and the billing
//! recalculation function. JSON over HTTPS, keyed by student and month.
//! A failed call is returned to the caller as-is and surfaced to the user;
//! nothing here retries on its own.

use anyhow::{Error, bail};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::model::StudentKey;
use crate::month::Month;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Approved,
    Pending,
    Rejected,
    Cancelled,
    InProcess,
}

impl PaymentStatus {
    /// The month is paid for; everything else still needs user action.
    pub fn is_settled(self) -> bool {
        self == PaymentStatus::Approved
    }
}

#[derive(Serialize)]
struct ChargeRequest<'a> {
    student: &'a str,
    month: Month,
}

/// PIX charge: the copy-paste code plus an optional pre-rendered QR image.
#[derive(Debug, Serialize, Deserialize)]
pub struct PixCharge {
    pub qr_code: String,
    #[serde(default)]
    pub qr_code_base64: Option<String>,
}

/// Card checkout: the provider-hosted link the frontend opens.
#[derive(Debug, Serialize, Deserialize)]
pub struct CardCheckout {
    pub checkout_url: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: PaymentStatus,
}

#[derive(Clone)]
pub struct PaymentsClient {
    http: Client,
    base: String,
    token: String,
}

impl PaymentsClient {
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base: base.into(),
            token: token.into(),
        }
    }

    pub async fn create_pix(&self, student: &StudentKey, month: Month) -> Result<PixCharge, Error> {
        let res = self
            .http
            .post(format!("{}/payments/pix", self.base))
            .bearer_auth(&self.token)
            .json(&ChargeRequest {
                student: student.as_str(),
                month,
            })
            .send()
            .await?;
        if !res.status().is_success() {
            bail!("pix charge for {student} {month} failed: {}", res.status());
        }
        Ok(res.json().await?)
    }

    pub async fn create_card(
        &self,
        student: &StudentKey,
        month: Month,
    ) -> Result<CardCheckout, Error> {
        let res = self
            .http
            .post(format!("{}/payments/card", self.base))
            .bearer_auth(&self.token)
            .json(&ChargeRequest {
                student: student.as_str(),
                month,
            })
            .send()
            .await?;
        if !res.status().is_success() {
            bail!("card checkout for {student} {month} failed: {}", res.status());
        }
        Ok(res.json().await?)
    }

    pub async fn status(&self, student: &StudentKey, month: Month) -> Result<PaymentStatus, Error> {
        let res = self
            .http
            .get(format!("{}/payments/status", self.base))
            .bearer_auth(&self.token)
            .query(&[("student", student.as_str()), ("month", &month.to_string())])
            .send()
            .await?;
        if !res.status().is_success() {
            bail!("status check for {student} {month} failed: {}", res.status());
        }
        let body: StatusResponse = res.json().await?;
        Ok(body.status)
    }
}

#[derive(Serialize)]
struct RecalculateRequest {
    from: Month,
}

#[derive(Deserialize)]
struct RecalculateResponse {
    updated: u64,
}

#[derive(Clone)]
pub struct BillingClient {
    http: Client,
    base: String,
}

impl BillingClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base: base.into(),
        }
    }

    /// Recalculates every student's dues from `from` onwards; returns how
    /// many records the function touched.
    pub async fn recalculate_from(&self, from: Month) -> Result<u64, Error> {
        let res = self
            .http
            .post(format!("{}/billing/recalculate", self.base))
            .json(&RecalculateRequest { from })
            .send()
            .await?;
        if !res.status().is_success() {
            bail!("billing recalculation from {from} failed: {}", res.status());
        }
        let body: RecalculateResponse = res.json().await?;
        Ok(body.updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        let status: PaymentStatus = serde_json::from_str("\"in_process\"").unwrap();
        assert_eq!(status, PaymentStatus::InProcess);
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Approved).unwrap(),
            "\"approved\""
        );
        assert!(serde_json::from_str::<PaymentStatus>("\"paid\"").is_err());
    }

    #[test]
    fn test_only_approved_is_settled() {
        assert!(PaymentStatus::Approved.is_settled());
        assert!(!PaymentStatus::Pending.is_settled());
        assert!(!PaymentStatus::InProcess.is_settled());
    }

    #[test]
    fn test_charge_request_shape() {
        let body = serde_json::to_value(ChargeRequest {
            student: "stu-000001",
            month: Month::new(2026, 2).unwrap(),
        })
        .unwrap();
        assert_eq!(body["student"], "stu-000001");
        assert_eq!(body["month"], "2026-02");
    }
}
