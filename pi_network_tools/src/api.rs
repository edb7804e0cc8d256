use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    config::PiNetworkConfig,
    data_objects::{A2uPaymentArgs, IncompletePayments, PaymentDirection, PiPayment, PiUser},
    PiApiError,
};

/// How many times a transient failure is retried before it is surfaced, and the starting delay for
/// the exponential backoff between attempts.
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct PiNetworkApi {
    config: PiNetworkConfig,
    client: Arc<Client>,
}

impl PiNetworkApi {
    pub fn new(config: PiNetworkConfig) -> Result<Self, PiApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let key = format!("Key {}", config.api_key.reveal());
        let val = HeaderValue::from_str(&key).map_err(|e| PiApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client =
            Client::builder().default_headers(headers).build().map_err(|e| PiApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &PiNetworkConfig {
        &self.config
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, PiApiError> {
        if self.config.is_mock() {
            return Err(PiApiError::MockMode);
        }
        let url = self.url(path);
        trace!("🌐️ Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| PiApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("🌐️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| PiApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PiApiError::RestResponseError(e.to_string()))?;
            Err(classify_query_error(status, message))
        }
    }

    /// As [`rest_query`], but transient failures (transport errors, 5xx) are retried with
    /// exponential backoff before being surfaced.
    pub async fn rest_query_with_retry<T: DeserializeOwned, B: Serialize + Clone>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, PiApiError> {
        let mut delay = RETRY_BASE_DELAY;
        let mut attempt = 1;
        loop {
            match self.rest_query(method.clone(), path, params, body.clone()).await {
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    warn!("🌐️ Attempt {attempt}/{MAX_ATTEMPTS} for {path} failed. {e}. Retrying in {delay:?}.");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                },
                other => return other,
            }
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v2{path}", self.config.base_url)
    }

    pub async fn get_payment(&self, payment_id: &str) -> Result<PiPayment, PiApiError> {
        let path = format!("/payments/{payment_id}");
        debug!("🌐️ Fetching payment {payment_id}");
        match self.rest_query_with_retry::<PiPayment, ()>(Method::GET, &path, &[], None).await {
            Err(PiApiError::QueryError { status: 404, .. }) => Err(PiApiError::PaymentNotFound(payment_id.to_string())),
            other => other,
        }
    }

    pub async fn approve_payment(&self, payment_id: &str) -> Result<PiPayment, PiApiError> {
        let path = format!("/payments/{payment_id}/approve");
        debug!("🌐️ Approving payment {payment_id}");
        self.rest_query_with_retry::<PiPayment, ()>(Method::POST, &path, &[], None).await
    }

    pub async fn complete_payment(&self, payment_id: &str, txid: &str) -> Result<PiPayment, PiApiError> {
        let path = format!("/payments/{payment_id}/complete");
        let body = serde_json::json!({ "txid": txid });
        debug!("🌐️ Completing payment {payment_id} with txid {txid}");
        self.rest_query_with_retry::<PiPayment, Value>(Method::POST, &path, &[], Some(body)).await
    }

    pub async fn cancel_payment(&self, payment_id: &str) -> Result<PiPayment, PiApiError> {
        let path = format!("/payments/{payment_id}/cancel");
        debug!("🌐️ Cancelling payment {payment_id}");
        self.rest_query_with_retry::<PiPayment, ()>(Method::POST, &path, &[], None).await
    }

    /// Lists server payments that have been created but not yet completed or cancelled, optionally
    /// narrowed to a single destination user.
    pub async fn incomplete_server_payments(
        &self,
        direction: PaymentDirection,
        to_uid: Option<&str>,
    ) -> Result<Vec<PiPayment>, PiApiError> {
        let mut params = vec![("direction", direction.as_str())];
        if let Some(uid) = to_uid {
            params.push(("uid", uid));
        }
        let result = self
            .rest_query_with_retry::<IncompletePayments, ()>(
                Method::GET,
                "/payments/incomplete_server_payments",
                &params,
                None,
            )
            .await?;
        Ok(result.incomplete_server_payments)
    }

    pub async fn create_a2u_payment(&self, args: A2uPaymentArgs) -> Result<PiPayment, PiApiError> {
        debug!("🌐️ Creating A2U payment of {}π to {}", args.amount, args.uid);
        let body = serde_json::json!({ "payment": args });
        self.rest_query::<PiPayment, Value>(Method::POST, "/payments", &[], Some(body)).await
    }

    /// Resolves a user access token to the network's user record. Uses the bearer token instead of
    /// the server key, per the platform's auth scheme.
    pub async fn me(&self, access_token: &str) -> Result<PiUser, PiApiError> {
        if self.config.is_mock() {
            return Err(PiApiError::MockMode);
        }
        let url = self.url("/me");
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {access_token}"))
            .send()
            .await
            .map_err(|e| PiApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            response.json::<PiUser>().await.map_err(|e| PiApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PiApiError::RestResponseError(e.to_string()))?;
            Err(PiApiError::QueryError { status, message })
        }
    }
}

/// The platform reports an open concurrent A2U payment as a 400 with a machine-readable error
/// code. That case gets its own variant since the payout executor branches on it.
fn classify_query_error(status: u16, message: String) -> PiApiError {
    if status == 400 {
        let code = serde_json::from_str::<Value>(&message)
            .ok()
            .and_then(|v| v["error"].as_str().map(|s| s.to_string()))
            .unwrap_or_default();
        if code == "ongoing_payment_exists" {
            return PiApiError::OngoingPayment(message);
        }
    }
    PiApiError::QueryError { status, message }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ongoing_payment_is_classified() {
        let body = r#"{"error":"ongoing_payment_exists","error_message":"A payment is already open"}"#;
        assert!(matches!(classify_query_error(400, body.to_string()), PiApiError::OngoingPayment(_)));
        let other = r#"{"error":"invalid_request"}"#;
        assert!(matches!(classify_query_error(400, other.to_string()), PiApiError::QueryError { status: 400, .. }));
        assert!(matches!(classify_query_error(500, "boom".to_string()), PiApiError::QueryError { status: 500, .. }));
    }

    #[test]
    fn transient_classification() {
        assert!(PiApiError::RestResponseError("timeout".into()).is_transient());
        assert!(PiApiError::QueryError { status: 503, message: String::new() }.is_transient());
        assert!(!PiApiError::QueryError { status: 404, message: String::new() }.is_transient());
        assert!(!PiApiError::OngoingPayment(String::new()).is_transient());
    }
}
