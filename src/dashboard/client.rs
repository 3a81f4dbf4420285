//! Client dashboard: posting deliveries and tracking them.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::trips::TripBoard;
use super::{Navigator, Notice, ok_or_warn, require_session};
use crate::api::{
    ClientProfile, ClientService, NewTrip, PaymentPurpose, PaymentRequest, PaymentService, Place,
    Wallet, WalletService,
};
use crate::auth::SessionStore;
use crate::error::ApiError;

/// Fee pre-filled on the delivery form, in KES.
pub const DEFAULT_DELIVERY_FEE: Decimal = dec!(50);

const POST_DELIVERY_OK: &str = "Payment initiated! Check your phone for M-Pesa prompt. \
Your delivery will be posted once payment is confirmed.";
const POST_DELIVERY_FAILED: &str = "Failed to post delivery. Please try again.";
const POST_DELIVERY_UNPOSTED: &str = "Payment was initiated, but your delivery could not be \
posted. Please contact support before paying again.";

/// Where posting a delivery stopped.
#[derive(Debug)]
enum PostError {
    /// Nothing was charged.
    Payment(ApiError),
    /// The M-Pesa prompt went out but the trip was not created.
    Trip {
        checkout_request_id: Option<String>,
        source: ApiError,
    },
}

/// Backends the client dashboard reads from.
#[derive(Clone)]
pub struct ClientServices {
    pub client: Arc<dyn ClientService>,
    pub wallet: Arc<dyn WalletService>,
    pub payments: Arc<dyn PaymentService>,
}

/// The "post delivery" form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryDraft {
    pub pickup_location: String,
    pub delivery_location: String,
    pub item_type: String,
    pub description: String,
    pub recipient_phone: String,
    pub delivery_fee: Decimal,
}

impl Default for DeliveryDraft {
    fn default() -> Self {
        Self {
            pickup_location: String::new(),
            delivery_location: String::new(),
            item_type: String::new(),
            description: String::new(),
            recipient_phone: String::new(),
            delivery_fee: DEFAULT_DELIVERY_FEE,
        }
    }
}

impl DeliveryDraft {
    /// Set the fee from typed input. Anything that is not a positive whole
    /// number falls back to the default fee.
    pub fn set_fee_input(&mut self, raw: &str) {
        self.delivery_fee = raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|fee| *fee > 0)
            .map(Decimal::from)
            .unwrap_or(DEFAULT_DELIVERY_FEE);
    }

    /// Whether the form may be submitted. The description is optional.
    pub fn is_complete(&self) -> bool {
        [
            &self.pickup_location,
            &self.delivery_location,
            &self.item_type,
            &self.recipient_phone,
        ]
        .iter()
        .all(|f| !f.trim().is_empty())
            && self.delivery_fee > Decimal::ZERO
    }

    fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "pickupLocation": self.pickup_location.trim(),
            "deliveryLocation": self.delivery_location.trim(),
            "itemType": self.item_type.trim(),
            "description": self.description.trim(),
            "recipientPhone": self.recipient_phone.trim(),
        })
    }

    fn to_new_trip(&self) -> NewTrip {
        NewTrip {
            pickup_location: Place::new(self.pickup_location.trim()),
            delivery_location: Place::new(self.delivery_location.trim()),
            item_type: self.item_type.trim().to_string(),
            description: self.description.trim().to_string(),
            recipient_phone: self.recipient_phone.trim().to_string(),
            delivery_fee: self.delivery_fee,
        }
    }
}

#[derive(Debug, Default)]
struct ClientView {
    profile: Option<ClientProfile>,
    board: TripBoard,
    wallet: Option<Wallet>,
    posting: bool,
}

/// Numbers shown in the client's stat cards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSummary {
    pub name: Option<String>,
    pub balance: Decimal,
    pub total_trips: usize,
    pub pending_trips: usize,
    pub active_trips: usize,
    pub completed_trips: usize,
}

pub struct ClientDashboard {
    services: ClientServices,
    sessions: SessionStore,
    navigator: Arc<dyn Navigator>,
    view: RwLock<ClientView>,
    cancel: CancellationToken,
}

impl ClientDashboard {
    pub fn new(
        services: ClientServices,
        sessions: SessionStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            services,
            sessions,
            navigator,
            view: RwLock::new(ClientView::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Load profile, trips and wallet; see [`super::RiderDashboard::load`].
    pub async fn load(&self) -> Result<ClientSummary, ApiError> {
        let session = require_session(&self.sessions, self.navigator.as_ref()).await?;
        let credential = &session.credential;

        let (profile, trips, wallet) = tokio::join!(
            self.services.client.profile(credential, &self.cancel),
            self.services.client.trips(credential, &self.cancel),
            self.services.wallet.wallet(credential, &self.cancel),
        );

        {
            let mut view = self.view.write().await;
            view.profile = ok_or_warn("client profile", profile);
            view.board =
                TripBoard::from_trips(ok_or_warn("client trips", trips).unwrap_or_default());
            view.wallet = ok_or_warn("wallet", wallet);
        }

        Ok(self.summary().await)
    }

    pub async fn summary(&self) -> ClientSummary {
        let view = self.view.read().await;
        let counts = view.board.counts();
        ClientSummary {
            name: view.profile.as_ref().and_then(|p| p.name.clone()),
            balance: view.wallet.as_ref().map(|w| w.balance).unwrap_or_default(),
            total_trips: view.board.total(),
            pending_trips: counts.pending,
            active_trips: counts.accepted,
            completed_trips: counts.completed,
        }
    }

    pub async fn board(&self) -> TripBoard {
        self.view.read().await.board.clone()
    }

    pub async fn can_post(&self, draft: &DeliveryDraft) -> bool {
        !self.view.read().await.posting && draft.is_complete()
    }

    /// Pay for and post a delivery: start the M-Pesa payment for the fee,
    /// then create the trip and refetch the list. Returns `None` while the
    /// form is incomplete or another post is running.
    pub async fn post_delivery(&self, draft: &DeliveryDraft) -> Option<Notice> {
        if !draft.is_complete() {
            return None;
        }
        {
            let mut view = self.view.write().await;
            if view.posting {
                return None;
            }
            view.posting = true;
        }

        let result = self.pay_and_create(draft).await;
        self.view.write().await.posting = false;

        match result {
            Ok(()) => {
                if let Err(e) = self.refresh_trips().await {
                    tracing::warn!(error = %e, "Failed to refresh trips");
                }
                Some(Notice::info(POST_DELIVERY_OK))
            }
            Err(PostError::Payment(e)) => {
                tracing::warn!(error = %e, "Failed to post delivery");
                Some(Notice::failure(POST_DELIVERY_FAILED))
            }
            Err(PostError::Trip {
                checkout_request_id,
                source,
            }) => {
                tracing::error!(
                    checkout_request_id = checkout_request_id.as_deref().unwrap_or("-"),
                    fee = %draft.delivery_fee,
                    error = %source,
                    "Delivery paid for but not posted"
                );
                Some(Notice::failure(POST_DELIVERY_UNPOSTED))
            }
        }
    }

    async fn pay_and_create(&self, draft: &DeliveryDraft) -> Result<(), PostError> {
        let session = require_session(&self.sessions, self.navigator.as_ref())
            .await
            .map_err(PostError::Payment)?;
        let payment = PaymentRequest {
            phone: session.phone.clone(),
            amount: draft.delivery_fee,
            purpose: PaymentPurpose::Delivery,
            metadata: Some(draft.metadata()),
        };
        let ack = self
            .services
            .payments
            .initiate_payment(&session.credential, &payment, &self.cancel)
            .await
            .map_err(PostError::Payment)?;

        // TODO: wait for the M-Pesa callback to confirm before creating the trip.
        let trip = self
            .services
            .client
            .create_trip(&session.credential, &draft.to_new_trip(), &self.cancel)
            .await
            .map_err(|source| PostError::Trip {
                checkout_request_id: ack.checkout_request_id.clone(),
                source,
            })?;
        tracing::info!(trip_id = %trip.id, fee = %draft.delivery_fee, "Delivery posted");
        Ok(())
    }

    pub async fn refresh_trips(&self) -> Result<(), ApiError> {
        let session = require_session(&self.sessions, self.navigator.as_ref()).await?;
        let trips = self
            .services
            .client
            .trips(&session.credential, &self.cancel)
            .await?;
        self.view.write().await.board = TripBoard::from_trips(trips);
        Ok(())
    }

    pub fn teardown(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{RecordingNavigator, StubBackend, fetches, session, trip};
    use super::*;
    use crate::api::{Role, TripStatus};

    fn dashboard(backend: Arc<StubBackend>, sessions: SessionStore) -> ClientDashboard {
        let services = ClientServices {
            client: backend.clone(),
            wallet: backend.clone(),
            payments: backend,
        };
        ClientDashboard::new(services, sessions, Arc::new(RecordingNavigator::default()))
    }

    async fn signed_in() -> SessionStore {
        let sessions = SessionStore::new();
        sessions.establish(session(Role::Client)).await;
        sessions
    }

    fn draft() -> DeliveryDraft {
        DeliveryDraft {
            pickup_location: "Westlands".into(),
            delivery_location: "CBD".into(),
            item_type: "documents".into(),
            description: "Signed contract".into(),
            recipient_phone: "0722000000".into(),
            ..Default::default()
        }
    }

    #[test]
    fn fee_input_falls_back_to_default() {
        let mut d = DeliveryDraft::default();
        assert_eq!(d.delivery_fee, dec!(50));
        d.set_fee_input("120");
        assert_eq!(d.delivery_fee, dec!(120));
        d.set_fee_input("abc");
        assert_eq!(d.delivery_fee, DEFAULT_DELIVERY_FEE);
        d.set_fee_input("0");
        assert_eq!(d.delivery_fee, DEFAULT_DELIVERY_FEE);
    }

    #[test]
    fn draft_needs_required_fields() {
        assert!(!DeliveryDraft::default().is_complete());
        assert!(draft().is_complete());
        let no_description = DeliveryDraft {
            description: String::new(),
            ..draft()
        };
        assert!(no_description.is_complete());
        let no_recipient = DeliveryDraft {
            recipient_phone: " ".into(),
            ..draft()
        };
        assert!(!no_recipient.is_complete());
    }

    #[tokio::test]
    async fn load_counts_trips() {
        let backend = Arc::new(StubBackend {
            trips: std::sync::Mutex::new(vec![
                trip("a", TripStatus::Pending),
                trip("b", TripStatus::Accepted),
                trip("c", TripStatus::Completed),
                trip("d", TripStatus::Completed),
            ]),
            balance: dec!(75),
            ..Default::default()
        });
        let dash = dashboard(backend, signed_in().await);
        let summary = dash.load().await.unwrap();
        assert_eq!(summary.name.as_deref(), Some("Jane"));
        assert_eq!(summary.balance, dec!(75));
        assert_eq!(summary.total_trips, 4);
        assert_eq!(summary.pending_trips, 1);
        assert_eq!(summary.active_trips, 1);
        assert_eq!(summary.completed_trips, 2);
    }

    #[tokio::test]
    async fn post_delivery_pays_then_creates() {
        let backend = Arc::new(StubBackend::default());
        let dash = dashboard(backend.clone(), signed_in().await);

        let notice = dash.post_delivery(&draft()).await.unwrap();

        assert_eq!(notice, Notice::info(POST_DELIVERY_OK));
        let payments = backend.payments.lock().unwrap().clone();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount, DEFAULT_DELIVERY_FEE);
        assert_eq!(payments[0].purpose, PaymentPurpose::Delivery);
        let metadata = payments[0].metadata.clone().unwrap();
        assert_eq!(metadata["pickupLocation"], "Westlands");
        assert_eq!(metadata["recipientPhone"], "0722000000");

        let created = backend.created.lock().unwrap().clone();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].delivery_location, Place::new("CBD"));
        assert_eq!(fetches(&backend.trip_fetches), 1, "trips refetched after posting");
        assert_eq!(dash.summary().await.pending_trips, 1);
    }

    #[tokio::test]
    async fn failed_payment_skips_trip_creation() {
        let backend = Arc::new(StubBackend {
            fail_payment: true,
            ..Default::default()
        });
        let dash = dashboard(backend.clone(), signed_in().await);

        let notice = dash.post_delivery(&draft()).await.unwrap();

        assert_eq!(notice, Notice::failure(POST_DELIVERY_FAILED));
        assert!(backend.created.lock().unwrap().is_empty());
        assert!(dash.can_post(&draft()).await, "form is usable again after a failure");
    }

    #[tokio::test]
    async fn failed_trip_after_payment_says_payment_started() {
        let backend = Arc::new(StubBackend {
            fail_actions: true,
            ..Default::default()
        });
        let dash = dashboard(backend.clone(), signed_in().await);

        let notice = dash.post_delivery(&draft()).await.unwrap();

        assert_eq!(notice, Notice::failure(POST_DELIVERY_UNPOSTED));
        assert_eq!(backend.payments.lock().unwrap().len(), 1);
        assert!(backend.created.lock().unwrap().is_empty());
        assert_eq!(fetches(&backend.trip_fetches), 0);
    }

    #[tokio::test]
    async fn incomplete_draft_is_not_submitted() {
        let backend = Arc::new(StubBackend::default());
        let dash = dashboard(backend.clone(), signed_in().await);
        assert!(!dash.can_post(&DeliveryDraft::default()).await);
        assert!(dash.post_delivery(&DeliveryDraft::default()).await.is_none());
        assert!(backend.payments.lock().unwrap().is_empty());
    }
}
