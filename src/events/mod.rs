use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Wrapper around the domain event channel.
///
/// Commands publish one event per successful transition; the consuming side
/// (notification fan-out, webhooks, reporting) is wired up by the host
/// application.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates an event channel pair with the given buffer size.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Spawns a task that drains the event channel into the tracing log.
///
/// Suitable as a default consumer for deployments that have no downstream
/// notification system attached.
pub fn spawn_event_logger(mut receiver: mpsc::Receiver<Event>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            info!(?event, "domain event");
        }
    })
}

// The events emitted by the workflow engines, one per transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Deal events
    DealCreated(Uuid),
    DealSubmittedForApproval(Uuid),
    DealManagerApproved(Uuid),
    DealManagerRejected(Uuid),
    DealSuperAdminApproved(Uuid),
    DealSuperAdminRejected(Uuid),
    DealAccountCreated(Uuid),
    DealReviewSubmitted {
        deal_id: Uuid,
        review: String,
    },
    DealCredentialsSet(Uuid),
    DealReportSubmitted(Uuid),
    DealCompleted(Uuid),
    DealFailed(Uuid),
    DealLegalReviewed(Uuid),

    // Offer request events
    OfferRequestCreated {
        request_id: Uuid,
        assigned_support_id: Uuid,
    },
    OfferRequestReassigned {
        request_id: Uuid,
        support_id: Uuid,
    },
    OfferRequestStatusChanged {
        request_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Offer events
    OfferCreated(Uuid),
    OfferEquipmentAdded {
        offer_id: Uuid,
        equipment_id: Uuid,
    },
    OfferTermsUpdated(Uuid),
    OfferInstallmentPlanReplaced {
        offer_id: Uuid,
        lines: usize,
    },
    OfferSentToSalesman {
        offer_id: Uuid,
        salesman_id: Uuid,
    },
    OfferAccepted(Uuid),
    OfferRejected(Uuid),

    // Contract events
    ContractDrafted(Uuid),
    ContractSentToCustomer(Uuid),
    ContractSigned(Uuid),
    ContractCancelled(Uuid),
    ContractLegacyLinked {
        contract_id: Uuid,
        legacy_id: String,
    },
    ContractInstallmentUpdated {
        contract_id: Uuid,
        installment_id: Uuid,
        new_status: String,
    },

    // Spare part events
    SparePartRequested(Uuid),
    SparePartAvailabilityChecked {
        request_id: Uuid,
        is_available: bool,
    },
    SparePartPriced(Uuid),
    SparePartCustomerDecision {
        request_id: Uuid,
        approved: bool,
    },
    SparePartWarehouseDecision {
        request_id: Uuid,
        approved: bool,
    },
    SparePartReady(Uuid),
    SparePartDelivered(Uuid),
}
