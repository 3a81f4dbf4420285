//! HTTP implementation of the backend collaborators.
//!
//! One `reqwest::Client` serves every trait. The client-level timeout is the
//! only timeout in the system; the workflow controller never imposes its own.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::Instrument;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::types::{
    AuthResponse, AuthenticatedSession, ClientProfile, Coordinates, NewTrip, PaymentAck,
    PaymentRequest, RegistrationRequest, RiderProfile, Trip, TripListing, Wallet,
};
use super::{
    ClientService, IdentityService, PaymentService, RiderService, WalletService, redact_phone,
};
use crate::config::ClientConfig;
use crate::error::{ApiError, ConfigError};

/// Header carrying a per-request correlation id.
const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Longest error body echoed back into an [`ApiError::Http`] message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// reqwest-backed client for the RiderGo REST API.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str, credential: Option<&SecretString>) -> RequestBuilder {
        let builder = self
            .client
            .request(method, self.url(path))
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string());
        match credential {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Send a request, honouring `cancel`, and return the successful response.
    async fn send(
        &self,
        endpoint: &str,
        builder: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Response, ApiError> {
        let request = builder.build().map_err(|e| ApiError::Network {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let authenticated = request.headers().contains_key(reqwest::header::AUTHORIZATION);

        let span = tracing::debug_span!("backend_request", request_id = %request_id, endpoint);
        tracing::debug!(parent: &span, method = %request.method(), "Calling backend");

        let response = cancellable(endpoint, cancel, self.client.execute(request).instrument(span))
            .await?
            .map_err(|e| self.transport_error(endpoint, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        tracing::warn!(request_id = %request_id, endpoint, status = status.as_u16(), "Backend rejected request");

        // A 401 on an unauthenticated call (a rejected code) is an ordinary
        // failure whose body carries the message to show.
        if status == reqwest::StatusCode::UNAUTHORIZED && authenticated {
            return Err(ApiError::Unauthorized);
        }

        let body = cancellable(endpoint, cancel, response.text())
            .await?
            .unwrap_or_default();
        Err(ApiError::Http {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        builder: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        let response = self.send(endpoint, builder, cancel).await?;
        cancellable(endpoint, cancel, response.json::<T>())
            .await?
            .map_err(|e| ApiError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
    }

    fn transport_error(&self, endpoint: &str, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout {
                endpoint: endpoint.to_string(),
                timeout: self.timeout,
            }
        } else {
            ApiError::Network {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// Race `fut` against `cancel`.
async fn cancellable<F: Future>(
    endpoint: &str,
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, ApiError> {
    if cancel.is_cancelled() {
        return Err(ApiError::Cancelled {
            endpoint: endpoint.to_string(),
        });
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!(endpoint, "Request cancelled");
            Err(ApiError::Cancelled { endpoint: endpoint.to_string() })
        }
        out = fut => Ok(out),
    }
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[async_trait]
impl IdentityService for HttpApi {
    async fn issue_code(&self, phone: &str, cancel: &CancellationToken) -> Result<(), ApiError> {
        tracing::info!(phone = %redact_phone(phone), "Requesting verification code");
        let builder = self
            .request(Method::POST, "/otp/send", None)
            .json(&serde_json::json!({ "phone": phone }));
        self.send("/otp/send", builder, cancel).await?;
        Ok(())
    }

    async fn verify_and_authenticate(
        &self,
        phone: &str,
        code: &str,
        cancel: &CancellationToken,
    ) -> Result<AuthenticatedSession, ApiError> {
        let builder = self
            .request(Method::POST, "/auth/login", None)
            .json(&serde_json::json!({ "phone": phone, "otp": code }));
        let resp: AuthResponse = self.send_json("/auth/login", builder, cancel).await?;
        Ok(resp.into())
    }

    async fn verify_and_register(
        &self,
        request: &RegistrationRequest,
        cancel: &CancellationToken,
    ) -> Result<AuthenticatedSession, ApiError> {
        let builder = self.request(Method::POST, "/auth/register", None).json(request);
        let resp: AuthResponse = self.send_json("/auth/register", builder, cancel).await?;
        Ok(resp.into())
    }

    async fn logout(
        &self,
        credential: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let builder = self.request(Method::POST, "/auth/logout", Some(credential));
        self.send("/auth/logout", builder, cancel).await?;
        Ok(())
    }
}

#[async_trait]
impl RiderService for HttpApi {
    async fn profile(
        &self,
        credential: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<RiderProfile, ApiError> {
        let builder = self.request(Method::GET, "/riders/profile", Some(credential));
        self.send_json("/riders/profile", builder, cancel).await
    }

    async fn trips(
        &self,
        credential: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<Vec<Trip>, ApiError> {
        let builder = self.request(Method::GET, "/riders/trips", Some(credential));
        let listing: TripListing = self.send_json("/riders/trips", builder, cancel).await?;
        Ok(listing.into())
    }

    async fn update_location(
        &self,
        credential: &SecretString,
        coords: Coordinates,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let builder = self
            .request(Method::PUT, "/riders/location", Some(credential))
            .json(&coords);
        self.send("/riders/location", builder, cancel).await?;
        Ok(())
    }

    async fn accept_trip(
        &self,
        credential: &SecretString,
        trip_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Trip, ApiError> {
        let path = format!("/riders/trips/{trip_id}/accept");
        let builder = self.request(Method::POST, &path, Some(credential));
        self.send_json(&path, builder, cancel).await
    }

    async fn complete_trip(
        &self,
        credential: &SecretString,
        trip_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Trip, ApiError> {
        let path = format!("/riders/trips/{trip_id}/complete");
        let builder = self.request(Method::POST, &path, Some(credential));
        self.send_json(&path, builder, cancel).await
    }
}

#[async_trait]
impl ClientService for HttpApi {
    async fn profile(
        &self,
        credential: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<ClientProfile, ApiError> {
        let builder = self.request(Method::GET, "/clients/profile", Some(credential));
        self.send_json("/clients/profile", builder, cancel).await
    }

    async fn trips(
        &self,
        credential: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<Vec<Trip>, ApiError> {
        let builder = self.request(Method::GET, "/clients/trips", Some(credential));
        let listing: TripListing = self.send_json("/clients/trips", builder, cancel).await?;
        Ok(listing.into())
    }

    async fn create_trip(
        &self,
        credential: &SecretString,
        trip: &NewTrip,
        cancel: &CancellationToken,
    ) -> Result<Trip, ApiError> {
        let builder = self
            .request(Method::POST, "/clients/trips", Some(credential))
            .json(trip);
        self.send_json("/clients/trips", builder, cancel).await
    }
}

#[async_trait]
impl WalletService for HttpApi {
    async fn wallet(
        &self,
        credential: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<Wallet, ApiError> {
        let builder = self.request(Method::GET, "/wallet", Some(credential));
        self.send_json("/wallet", builder, cancel).await
    }
}

#[async_trait]
impl PaymentService for HttpApi {
    async fn initiate_payment(
        &self,
        credential: &SecretString,
        request: &PaymentRequest,
        cancel: &CancellationToken,
    ) -> Result<PaymentAck, ApiError> {
        tracing::info!(
            phone = %redact_phone(&request.phone),
            amount = %request.amount,
            purpose = ?request.purpose,
            "Initiating M-Pesa payment"
        );
        let builder = self
            .request(Method::POST, "/mpesa/initiate", Some(credential))
            .json(request);
        self.send_json("/mpesa/initiate", builder, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_json_fields() {
        assert_eq!(error_message(r#"{"message":"Invalid OTP"}"#), "Invalid OTP");
        assert_eq!(error_message(r#"{"error":"Phone taken"}"#), "Phone taken");
        assert_eq!(error_message("  plain failure \n"), "plain failure");
    }

    #[test]
    fn error_message_truncates_long_bodies() {
        let body = "x".repeat(1000);
        assert_eq!(error_message(&body).len(), MAX_ERROR_BODY_CHARS);
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let config = ClientConfig {
            api_url: "http://localhost:5000/api/".into(),
            ..Default::default()
        };
        let api = HttpApi::new(&config).unwrap();
        assert_eq!(api.url("/wallet"), "http://localhost:5000/api/wallet");
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = cancellable("/otp/send", &cancel, async { 1 }).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
