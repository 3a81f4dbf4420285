//! Rider dashboard: trips to pick up, wallet, location, subscription.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::trips::TripBoard;
use super::{Navigator, Notice, ok_or_warn, require_session};
use crate::api::{
    Coordinates, PaymentPurpose, PaymentRequest, PaymentService, RiderProfile, RiderService,
    Wallet, WalletService,
};
use crate::auth::SessionStore;
use crate::error::ApiError;

/// Monthly rider subscription, in KES.
pub const SUBSCRIPTION_FEE: Decimal = dec!(100);

/// How long after a subscription payment the profile is re-read.
pub const DEFAULT_SUBSCRIPTION_RECHECK: Duration = Duration::from_secs(30);

/// Backends the rider dashboard reads from.
#[derive(Clone)]
pub struct RiderServices {
    pub rider: Arc<dyn RiderService>,
    pub wallet: Arc<dyn WalletService>,
    pub payments: Arc<dyn PaymentService>,
}

/// Whether the rider's position is reaching the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationStatus {
    #[default]
    Offline,
    Updating,
    Active,
}

#[derive(Debug, Default)]
struct RiderView {
    profile: Option<RiderProfile>,
    board: TripBoard,
    wallet: Option<Wallet>,
    location: LocationStatus,
    paying: bool,
}

/// Numbers shown in the rider's stat cards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiderSummary {
    pub name: Option<String>,
    pub balance: Decimal,
    pub available_trips: usize,
    pub active_trips: usize,
    pub completed_trips: usize,
    pub location: LocationStatus,
    pub subscription_active: bool,
    pub subscription_expires_at: Option<DateTime<Utc>>,
}

pub struct RiderDashboard {
    services: RiderServices,
    sessions: SessionStore,
    navigator: Arc<dyn Navigator>,
    view: RwLock<RiderView>,
    cancel: CancellationToken,
    subscription_recheck: Duration,
}

impl RiderDashboard {
    pub fn new(
        services: RiderServices,
        sessions: SessionStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            services,
            sessions,
            navigator,
            view: RwLock::new(RiderView::default()),
            cancel: CancellationToken::new(),
            subscription_recheck: DEFAULT_SUBSCRIPTION_RECHECK,
        }
    }

    pub fn with_subscription_recheck(mut self, delay: Duration) -> Self {
        self.subscription_recheck = delay;
        self
    }

    /// Load profile, trips and wallet. Each part may fail on its own and is
    /// then shown as empty. Fails only when there is no session, in which
    /// case the viewer has been sent to the login view.
    pub async fn load(&self) -> Result<RiderSummary, ApiError> {
        let session = require_session(&self.sessions, self.navigator.as_ref()).await?;
        let credential = &session.credential;

        let (profile, trips, wallet) = tokio::join!(
            self.services.rider.profile(credential, &self.cancel),
            self.services.rider.trips(credential, &self.cancel),
            self.services.wallet.wallet(credential, &self.cancel),
        );

        {
            let mut view = self.view.write().await;
            view.profile = ok_or_warn("rider profile", profile);
            view.board = TripBoard::from_trips(ok_or_warn("rider trips", trips).unwrap_or_default());
            view.wallet = ok_or_warn("wallet", wallet);
        }

        Ok(self.summary().await)
    }

    pub async fn summary(&self) -> RiderSummary {
        let view = self.view.read().await;
        let counts = view.board.counts();
        let subscription = view
            .profile
            .as_ref()
            .map(RiderProfile::subscription)
            .unwrap_or_default();
        RiderSummary {
            name: view.profile.as_ref().and_then(|p| p.name.clone()),
            balance: view.wallet.as_ref().map(|w| w.balance).unwrap_or_default(),
            available_trips: counts.pending,
            active_trips: counts.accepted,
            completed_trips: counts.completed,
            location: view.location,
            subscription_active: subscription.active,
            subscription_expires_at: subscription.expires_at,
        }
    }

    pub async fn board(&self) -> TripBoard {
        self.view.read().await.board.clone()
    }

    pub async fn wallet(&self) -> Option<Wallet> {
        self.view.read().await.wallet.clone()
    }

    pub async fn refresh_trips(&self) -> Result<(), ApiError> {
        let session = require_session(&self.sessions, self.navigator.as_ref()).await?;
        let trips = self.services.rider.trips(&session.credential, &self.cancel).await?;
        self.view.write().await.board = TripBoard::from_trips(trips);
        Ok(())
    }

    pub async fn accept_trip(&self, trip_id: &str) -> Notice {
        let result = match require_session(&self.sessions, self.navigator.as_ref()).await {
            Ok(session) => {
                self.services
                    .rider
                    .accept_trip(&session.credential, trip_id, &self.cancel)
                    .await
            }
            Err(e) => Err(e),
        };
        self.trip_action_notice(
            trip_id,
            result,
            "Trip accepted successfully!",
            "Failed to accept trip. Please try again.",
        )
        .await
    }

    pub async fn complete_trip(&self, trip_id: &str) -> Notice {
        let result = match require_session(&self.sessions, self.navigator.as_ref()).await {
            Ok(session) => {
                self.services
                    .rider
                    .complete_trip(&session.credential, trip_id, &self.cancel)
                    .await
            }
            Err(e) => Err(e),
        };
        self.trip_action_notice(
            trip_id,
            result,
            "Trip completed successfully!",
            "Failed to complete trip. Please try again.",
        )
        .await
    }

    async fn trip_action_notice<T>(
        &self,
        trip_id: &str,
        result: Result<T, ApiError>,
        ok: &str,
        failed: &str,
    ) -> Notice {
        match result {
            Ok(_) => {
                tracing::info!(trip_id, "{ok}");
                if let Err(e) = self.refresh_trips().await {
                    tracing::warn!(error = %e, "Failed to refresh trips");
                }
                Notice::info(ok)
            }
            Err(e) => {
                tracing::warn!(trip_id, error = %e, "Trip action failed");
                Notice::failure(failed)
            }
        }
    }

    /// Push the rider's position. Skipped while a previous update is still
    /// running; failures are only logged.
    pub async fn update_location(&self, coords: Coordinates) {
        {
            let mut view = self.view.write().await;
            if view.location == LocationStatus::Updating {
                return;
            }
            view.location = LocationStatus::Updating;
        }

        let result = match self.sessions.credential().await {
            Some(credential) => {
                self.services
                    .rider
                    .update_location(&credential, coords, &self.cancel)
                    .await
            }
            None => Err(ApiError::Unauthorized),
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "Error updating location");
        }

        self.view.write().await.location = LocationStatus::Active;
    }

    /// Start an M-Pesa payment for the subscription and schedule a profile
    /// re-read. Returns `None` if a payment is already being started.
    pub async fn pay_subscription(self: &Arc<Self>) -> Option<Notice> {
        {
            let mut view = self.view.write().await;
            if view.paying {
                return None;
            }
            view.paying = true;
        }

        let result = match require_session(&self.sessions, self.navigator.as_ref()).await {
            Ok(session) => {
                let request = PaymentRequest {
                    phone: session.phone.clone(),
                    amount: SUBSCRIPTION_FEE,
                    purpose: PaymentPurpose::Subscription,
                    metadata: None,
                };
                self.services
                    .payments
                    .initiate_payment(&session.credential, &request, &self.cancel)
                    .await
            }
            Err(e) => Err(e),
        };

        self.view.write().await.paying = false;

        match result {
            Ok(_) => {
                self.schedule_subscription_recheck();
                Some(Notice::info(
                    "Payment initiated! Check your phone for M-Pesa prompt.",
                ))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Subscription payment failed");
                Some(Notice::failure("Payment failed. Please try again."))
            }
        }
    }

    fn schedule_subscription_recheck(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let delay = self.subscription_recheck;
        tokio::spawn(async move {
            tokio::select! {
                _ = this.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            let Some(credential) = this.sessions.credential().await else {
                return;
            };
            match this.services.rider.profile(&credential, &this.cancel).await {
                Ok(profile) => this.view.write().await.profile = Some(profile),
                Err(e) => tracing::warn!(error = %e, "Error loading subscription"),
            }
        });
    }

    /// Stop background work and abort in-flight calls.
    pub fn teardown(&self) {
        self.cancel.cancel();
    }
}
