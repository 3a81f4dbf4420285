//! Backend collaborators.
//!
//! Every backend the client talks to sits behind an async trait so the
//! workflow and dashboards can be driven by stubs in tests and by
//! [`HttpApi`] in production. Each call takes a [`CancellationToken`]; a
//! cancelled call resolves to [`ApiError::Cancelled`] and its result is
//! discarded by the caller.

pub mod http;
pub mod types;

pub use http::HttpApi;
pub use types::*;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;

/// Issues and checks one-time codes, and establishes sessions.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Send a one-time code to `phone` out of band.
    async fn issue_code(&self, phone: &str, cancel: &CancellationToken) -> Result<(), ApiError>;

    /// Check `code` for an existing account and sign it in.
    async fn verify_and_authenticate(
        &self,
        phone: &str,
        code: &str,
        cancel: &CancellationToken,
    ) -> Result<AuthenticatedSession, ApiError>;

    /// Check the code carried by `request` and create the rider account.
    async fn verify_and_register(
        &self,
        request: &RegistrationRequest,
        cancel: &CancellationToken,
    ) -> Result<AuthenticatedSession, ApiError>;

    /// Invalidate the session on the server.
    async fn logout(
        &self,
        credential: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError>;
}

/// Rider-scoped resources.
#[async_trait]
pub trait RiderService: Send + Sync {
    async fn profile(
        &self,
        credential: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<RiderProfile, ApiError>;

    async fn trips(
        &self,
        credential: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<Vec<Trip>, ApiError>;

    async fn update_location(
        &self,
        credential: &SecretString,
        coords: Coordinates,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError>;

    async fn accept_trip(
        &self,
        credential: &SecretString,
        trip_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Trip, ApiError>;

    async fn complete_trip(
        &self,
        credential: &SecretString,
        trip_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Trip, ApiError>;
}

/// Client-scoped resources.
#[async_trait]
pub trait ClientService: Send + Sync {
    async fn profile(
        &self,
        credential: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<ClientProfile, ApiError>;

    async fn trips(
        &self,
        credential: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<Vec<Trip>, ApiError>;

    async fn create_trip(
        &self,
        credential: &SecretString,
        trip: &NewTrip,
        cancel: &CancellationToken,
    ) -> Result<Trip, ApiError>;
}

/// Wallet balance and history for the signed-in account.
#[async_trait]
pub trait WalletService: Send + Sync {
    async fn wallet(
        &self,
        credential: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<Wallet, ApiError>;
}

/// M-Pesa payment initiation.
#[async_trait]
pub trait PaymentService: Send + Sync {
    async fn initiate_payment(
        &self,
        credential: &SecretString,
        request: &PaymentRequest,
        cancel: &CancellationToken,
    ) -> Result<PaymentAck, ApiError>;
}

/// Phone number safe for logs: everything but the last four digits masked.
pub(crate) fn redact_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    let keep = chars.len().min(4);
    let masked = chars.len() - keep;
    let tail: String = chars[masked..].iter().collect();
    format!("{}{}", "*".repeat(masked), tail)
}
