//! Wire and domain types exchanged with the RiderGo backend.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Role attached to an authenticated account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Rider,
    /// Any role this client does not know about.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Client => "client",
            Self::Rider => "rider",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Vehicles a rider can register with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VehicleType {
    Motorcycle,
    Bicycle,
    TukTuk,
    Car,
}

impl VehicleType {
    pub const ALL: [VehicleType; 4] = [Self::Motorcycle, Self::Bicycle, Self::TukTuk, Self::Car];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Motorcycle => "motorcycle",
            Self::Bicycle => "bicycle",
            Self::TukTuk => "tuk-tuk",
            Self::Car => "car",
        }
    }
}

impl std::fmt::Display for VehicleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VehicleType {
    type Err = String;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown vehicle type: {wanted}"))
    }
}

/// The identity established after a successful verification.
///
/// The credential is opaque and never serialized back out.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub phone: String,
    pub role: Role,
    pub name: Option<String>,
    pub credential: SecretString,
}

/// Body returned by the login and register endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    pub token: String,
    pub user: AuthUser,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthUser {
    pub phone: String,
    pub role: Role,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<AuthResponse> for AuthenticatedSession {
    fn from(resp: AuthResponse) -> Self {
        Self {
            phone: resp.user.phone,
            role: resp.user.role,
            name: resp.user.name,
            credential: SecretString::from(resp.token),
        }
    }
}

/// Everything the sign-up verify call needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub phone: String,
    pub name: String,
    pub vehicle_type: VehicleType,
    pub number_plate: String,
    pub otp: String,
}

/// Lifecycle status of a delivery trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Pending,
    Accepted,
    Completed,
    #[serde(other)]
    Other,
}

/// A pickup or drop-off point.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Place {
    #[serde(default)]
    pub address: String,
}

impl Place {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// A delivery trip as reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub status: TripStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_location: Option<Place>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_location: Option<Place>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_phone: Option<String>,
    #[serde(default)]
    pub delivery_fee: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Trip listings come back either bare or wrapped in `{ "trips": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum TripListing {
    Bare(Vec<Trip>),
    Wrapped { trips: Vec<Trip> },
}

impl From<TripListing> for Vec<Trip> {
    fn from(listing: TripListing) -> Self {
        match listing {
            TripListing::Bare(trips) | TripListing::Wrapped { trips } => trips,
        }
    }
}

/// Payload for posting a new delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTrip {
    pub pickup_location: Place,
    pub delivery_location: Place,
    pub item_type: String,
    pub description: String,
    pub recipient_phone: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub delivery_fee: Decimal,
}

/// Wallet balance plus transaction history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub amount: Decimal,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Rider subscription state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub number_plate: Option<String>,
    #[serde(default)]
    pub subscription: Option<Subscription>,
}

impl RiderProfile {
    /// Subscription state, treating a missing record as inactive.
    pub fn subscription(&self) -> Subscription {
        self.subscription.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// A device position reported by a rider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

/// What an M-Pesa payment is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    Subscription,
    Delivery,
}

/// An STK-push payment request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRequest {
    pub phone: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub purpose: PaymentPurpose,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Acknowledgement that the payment prompt was pushed to the phone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAck {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "CheckoutRequestID")]
    pub checkout_request_id: Option<String>,
}
