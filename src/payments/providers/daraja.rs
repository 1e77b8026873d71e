//! Daraja STK push gateway client
//!
//! Integration with Safaricom's Daraja API for push payments in Kenya:
//! OAuth token exchange, the STK push request itself, and persistence of
//! the accepted attempt. The pending transaction row is written before
//! `initiate` returns, so status watchers started immediately afterwards
//! always find it.

use crate::config::MpesaConfig;
use crate::database::payment_store::{PaymentTransaction, TransactionStore};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::phone;
use crate::payments::traits::PaymentGateway;
use crate::payments::types::{InitiateOutcome, InitiateRequest};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{error, info, warn};

const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";

/// Tokens are refreshed this long before their advertised expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        self.expires_at > Instant::now() + TOKEN_EXPIRY_MARGIN
    }
}

/// Daraja push-payment gateway
pub struct DarajaGateway {
    config: MpesaConfig,
    client: Client,
    store: Arc<dyn TransactionStore>,
    token: RwLock<Option<AccessToken>>,
}

impl DarajaGateway {
    /// Create a new gateway instance backed by the given transaction store
    pub fn new(config: MpesaConfig, store: Arc<dyn TransactionStore>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            client,
            store,
            token: RwLock::new(None),
        }
    }

    /// Check every credential this gateway needs, naming the first missing
    /// setting. Runs before any network call so misconfiguration never
    /// produces a half-submitted push.
    pub fn ensure_configured(&self) -> PaymentResult<()> {
        let required = [
            ("MPESA_BASE_URL", &self.config.base_url),
            ("MPESA_CONSUMER_KEY", &self.config.consumer_key),
            ("MPESA_CONSUMER_SECRET", &self.config.consumer_secret),
            ("MPESA_SHORTCODE", &self.config.shortcode),
            ("MPESA_PASSKEY", &self.config.passkey),
            ("MPESA_CALLBACK_URL", &self.config.callback_url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(PaymentError::configuration(name));
            }
        }
        Ok(())
    }

    /// Current bearer token, fetched or refreshed when the cached one is
    /// within its expiry margin.
    async fn access_token(&self) -> PaymentResult<String> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.is_fresh() {
                    return Ok(token.token.clone());
                }
            }
        }

        let fresh = self.request_token().await?;
        let token = fresh.token.clone();
        *self.token.write().await = Some(fresh);
        Ok(token)
    }

    async fn request_token(&self) -> PaymentResult<AccessToken> {
        let credentials = BASE64.encode(format!(
            "{}:{}",
            self.config.consumer_key, self.config.consumer_secret
        ));
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.base_url
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Basic {credentials}"))
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let response_text = response.text().await.unwrap_or_default();
            error!("Token request rejected: HTTP {}: {}", status, response_text);
            return Err(PaymentError::upstream_auth(format!(
                "HTTP {status}: {response_text}"
            )));
        }
        if !status.is_success() {
            return Err(PaymentError::upstream_unavailable(format!(
                "token endpoint returned HTTP {status}"
            )));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            PaymentError::upstream_unavailable(format!("Invalid token response: {e}"))
        })?;
        let ttl_secs = body.expires_in.parse::<u64>().unwrap_or(3600);

        Ok(AccessToken {
            token: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(ttl_secs),
        })
    }
}

#[async_trait]
impl PaymentGateway for DarajaGateway {
    async fn initiate(&self, request: InitiateRequest) -> PaymentResult<InitiateOutcome> {
        // The rounding cast saturates infinities to i64::MAX.
        let amount = whole_units(request.amount);
        if !request.amount.is_finite() || amount <= 0 {
            return Err(PaymentError::initiation_rejected(
                "amount must be a positive number",
            ));
        }
        if request.phone_number.trim().is_empty() {
            return Err(PaymentError::initiation_rejected("phone number is required"));
        }
        self.ensure_configured()?;

        let token = self.access_token().await?;

        let msisdn = phone::normalize_msisdn(&request.phone_number, &self.config.country_prefix);
        if !phone::is_plausible(&msisdn, &self.config.country_prefix) {
            warn!(
                %msisdn,
                prefix = %self.config.country_prefix,
                "Normalized phone number looks implausible, submitting anyway"
            );
        }

        let timestamp = push_timestamp(Utc::now());
        let password = stk_password(&self.config.shortcode, &self.config.passkey, &timestamp);

        let body = StkPushRequest {
            business_short_code: &self.config.shortcode,
            password,
            timestamp,
            transaction_type: TRANSACTION_TYPE,
            amount,
            party_a: &msisdn,
            party_b: &self.config.shortcode,
            phone_number: &msisdn,
            call_back_url: &self.config.callback_url,
            account_reference: &request.account_reference,
            transaction_desc: &request.description,
        };

        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await.unwrap_or_default();

        if status.is_server_error() {
            error!("Push endpoint unavailable: HTTP {}: {}", status, response_text);
            return Err(PaymentError::upstream_unavailable(format!(
                "HTTP {status}: {response_text}"
            )));
        }
        if !status.is_success() {
            // Rejections arrive as 4xx with an errorMessage body.
            let message = serde_json::from_str::<StkErrorResponse>(&response_text)
                .ok()
                .and_then(|e| e.error_message)
                .unwrap_or(response_text);
            warn!(
                reference = %request.account_reference,
                "Push request rejected: {}", message
            );
            return Err(PaymentError::initiation_rejected(message));
        }

        let parsed: StkPushResponse = serde_json::from_str(&response_text).map_err(|e| {
            error!("Failed to parse push response: {}", e);
            PaymentError::upstream_unavailable(format!("Invalid response format: {e}"))
        })?;

        if parsed.response_code != "0" {
            warn!(
                reference = %request.account_reference,
                code = %parsed.response_code,
                "Push request not accepted: {}",
                parsed.response_description
            );
            return Err(PaymentError::initiation_rejected(parsed.response_description));
        }

        // Persist before returning so a watch started by the caller finds
        // the row on its first check.
        let transaction = PaymentTransaction::pending(
            &parsed.checkout_request_id,
            &parsed.merchant_request_id,
            &msisdn,
            amount,
            &request.account_reference,
            &request.description,
        );
        self.store.create(transaction).await?;

        info!(
            transaction_id = %parsed.checkout_request_id,
            merchant_request_id = %parsed.merchant_request_id,
            amount,
            "Push request accepted"
        );

        Ok(InitiateOutcome {
            transaction_id: parsed.checkout_request_id,
            provider_request_id: parsed.merchant_request_id,
            customer_message: parsed.customer_message,
        })
    }
}

/// Request timestamp in the gateway's `%Y%m%d%H%M%S` format, UTC.
fn push_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// Whole-unit amount for the push request. The provider rejects
/// fractional amounts, so cart totals are rounded to the nearest unit.
fn whole_units(amount: f64) -> i64 {
    amount.round() as i64
}

/// Push request password: base64 of shortcode, passkey and timestamp
/// concatenated in that order.
fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    BASE64.encode(format!("{shortcode}{passkey}{timestamp}"))
}

// Daraja API request/response wrappers

#[derive(Debug, Serialize)]
struct StkPushRequest<'a> {
    #[serde(rename = "BusinessShortCode")]
    business_short_code: &'a str,
    #[serde(rename = "Password")]
    password: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "TransactionType")]
    transaction_type: &'static str,
    #[serde(rename = "Amount")]
    amount: i64,
    #[serde(rename = "PartyA")]
    party_a: &'a str,
    #[serde(rename = "PartyB")]
    party_b: &'a str,
    #[serde(rename = "PhoneNumber")]
    phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    call_back_url: &'a str,
    #[serde(rename = "AccountReference")]
    account_reference: &'a str,
    #[serde(rename = "TransactionDesc")]
    transaction_desc: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    // Daraja sends the TTL as a string of seconds
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    response_code: String,
    #[serde(rename = "ResponseDescription")]
    response_description: String,
    #[serde(rename = "CustomerMessage")]
    customer_message: String,
}

#[derive(Debug, Deserialize)]
struct StkErrorResponse {
    #[serde(rename = "errorCode")]
    #[allow(dead_code)]
    error_code: Option<String>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}
