//! Central transition authorization policy.
//!
//! One table maps (entity kind, transition name) to the role set allowed to
//! perform it, and every engine operation consults it exactly once before
//! touching the entity. Ownership rules that depend on entity data (such as
//! "must be the deal's salesman") are enforced by the individual commands
//! after the role gate passes.

use std::collections::HashMap;

use lazy_static::lazy_static;
use tracing::warn;

use crate::auth::{AuthenticatedUser, Role};
use crate::errors::ServiceError;
use crate::workflow::EntityKind;

// Deal transitions
pub const CREATE_DEAL: &str = "create_deal";
pub const SUBMIT_FOR_APPROVAL: &str = "submit_for_approval";
pub const MANAGER_APPROVAL: &str = "manager_approval";
pub const SUPER_ADMIN_APPROVAL: &str = "super_admin_approval";
pub const MARK_ACCOUNT_CREATED: &str = "mark_account_created";
pub const SUBMIT_FIRST_REVIEW: &str = "submit_first_review";
pub const SUBMIT_SECOND_REVIEW: &str = "submit_second_review";
pub const SET_CLIENT_CREDENTIALS: &str = "set_client_credentials";
pub const SUBMIT_SALESMAN_REPORT: &str = "submit_salesman_report";
pub const MARK_COMPLETED: &str = "mark_completed";
pub const MARK_FAILED: &str = "mark_failed";
pub const MARK_LEGAL_REVIEWED: &str = "mark_legal_reviewed";

// Offer request / offer transitions
pub const CREATE_OFFER_REQUEST: &str = "create_offer_request";
pub const ASSIGN_TO_SUPPORT: &str = "assign_to_support";
pub const UPDATE_REQUEST_STATUS: &str = "update_request_status";
pub const CREATE_OFFER: &str = "create_offer";
pub const ADD_EQUIPMENT: &str = "add_equipment";
pub const UPDATE_TERMS: &str = "update_terms";
pub const CREATE_INSTALLMENT_PLAN: &str = "create_installment_plan";
pub const SEND_TO_SALESMAN: &str = "send_to_salesman";
pub const RECORD_SALESMAN_DECISION: &str = "record_salesman_decision";

// Contract transitions
pub const DRAFT_CONTRACT: &str = "draft_contract";
pub const SEND_TO_CUSTOMER: &str = "send_to_customer";
pub const SIGN_CONTRACT: &str = "sign_contract";
pub const CANCEL_CONTRACT: &str = "cancel_contract";
pub const LINK_LEGACY_CONTRACT: &str = "link_legacy_contract";
pub const UPDATE_INSTALLMENT_STATUS: &str = "update_installment_status";

// Spare part transitions
pub const CREATE_SPARE_PART_REQUEST: &str = "create_spare_part_request";
pub const CHECK_AVAILABILITY: &str = "check_availability";
pub const SET_PRICE: &str = "set_price";
pub const CUSTOMER_DECISION: &str = "customer_decision";
pub const WAREHOUSE_APPROVAL: &str = "warehouse_approval";
pub const MARK_READY: &str = "mark_ready";
pub const MARK_DELIVERED: &str = "mark_delivered";

lazy_static! {
    static ref TRANSITION_POLICY: HashMap<(EntityKind, &'static str), &'static [Role]> = {
        use EntityKind::*;
        use Role::*;

        let mut policy: HashMap<(EntityKind, &'static str), &'static [Role]> = HashMap::new();

        // Deal workflow
        policy.insert((Deal, CREATE_DEAL), &[Salesman]);
        policy.insert((Deal, SUBMIT_FOR_APPROVAL), &[Salesman]);
        policy.insert((Deal, MANAGER_APPROVAL), &[Manager]);
        policy.insert((Deal, SUPER_ADMIN_APPROVAL), &[SuperAdmin]);
        policy.insert((Deal, MARK_ACCOUNT_CREATED), &[Admin, SuperAdmin]);
        policy.insert((Deal, SUBMIT_FIRST_REVIEW), &[Salesman]);
        policy.insert((Deal, SUBMIT_SECOND_REVIEW), &[Salesman]);
        policy.insert((Deal, SET_CLIENT_CREDENTIALS), &[Admin, SuperAdmin]);
        policy.insert((Deal, SUBMIT_SALESMAN_REPORT), &[Salesman]);
        policy.insert((Deal, MARK_COMPLETED), &[Manager, SuperAdmin]);
        policy.insert((Deal, MARK_FAILED), &[Manager, SuperAdmin]);
        policy.insert((Deal, MARK_LEGAL_REVIEWED), &[Admin, SuperAdmin]);

        // Offer request workflow
        policy.insert((OfferRequest, CREATE_OFFER_REQUEST), &[Salesman]);
        policy.insert(
            (OfferRequest, ASSIGN_TO_SUPPORT),
            &[Manager, SalesSupport, SuperAdmin],
        );
        policy.insert(
            (OfferRequest, UPDATE_REQUEST_STATUS),
            &[SalesSupport, Manager, SuperAdmin],
        );

        // Offer workflow
        policy.insert((Offer, CREATE_OFFER), &[SalesSupport]);
        policy.insert((Offer, ADD_EQUIPMENT), &[SalesSupport]);
        policy.insert((Offer, UPDATE_TERMS), &[SalesSupport]);
        policy.insert((Offer, CREATE_INSTALLMENT_PLAN), &[SalesSupport]);
        policy.insert((Offer, SEND_TO_SALESMAN), &[SalesSupport]);
        policy.insert((Offer, RECORD_SALESMAN_DECISION), &[Salesman]);

        // Contract lifecycle
        policy.insert((Contract, DRAFT_CONTRACT), &[Admin, SuperAdmin]);
        policy.insert((Contract, SEND_TO_CUSTOMER), &[Admin, SuperAdmin]);
        policy.insert((Contract, SIGN_CONTRACT), &[Admin, SuperAdmin]);
        policy.insert((Contract, CANCEL_CONTRACT), &[Admin, SuperAdmin]);
        policy.insert((Contract, LINK_LEGACY_CONTRACT), &[Admin, SuperAdmin]);
        policy.insert((Contract, UPDATE_INSTALLMENT_STATUS), &[Admin, SuperAdmin]);

        // Spare part approval chain, one role per edge
        policy.insert((SparePartRequest, CREATE_SPARE_PART_REQUEST), &[Engineer]);
        policy.insert((SparePartRequest, CHECK_AVAILABILITY), &[SparePartsCoordinator]);
        policy.insert((SparePartRequest, SET_PRICE), &[MaintenanceManager]);
        policy.insert((SparePartRequest, CUSTOMER_DECISION), &[Customer]);
        policy.insert((SparePartRequest, WAREHOUSE_APPROVAL), &[WarehouseKeeper]);
        policy.insert((SparePartRequest, MARK_READY), &[InventoryManager]);
        policy.insert((SparePartRequest, MARK_DELIVERED), &[Engineer]);

        policy
    };
}

/// Returns the role set allowed to perform a transition, if the transition
/// is known to the policy table.
pub fn required_roles(kind: EntityKind, transition: &'static str) -> Option<&'static [Role]> {
    TRANSITION_POLICY.get(&(kind, transition)).copied()
}

/// Checks the acting user against the policy table.
///
/// Fails with [`ServiceError::UnauthorizedActor`] when the user holds none
/// of the required roles, and with [`ServiceError::InternalError`] when the
/// transition is missing from the table (a programming error, not a user
/// one).
pub fn authorize(
    kind: EntityKind,
    transition: &'static str,
    user: &AuthenticatedUser,
) -> Result<(), ServiceError> {
    let allowed = required_roles(kind, transition).ok_or_else(|| {
        ServiceError::InternalError(format!(
            "no policy entry for {} transition '{}'",
            kind, transition
        ))
    })?;

    if user.has_any_role(allowed) {
        Ok(())
    } else {
        warn!(
            entity = %kind,
            transition = transition,
            user_id = %user.user_id,
            "actor lacks required role"
        );
        Err(ServiceError::UnauthorizedActor(format!(
            "user {} may not perform '{}' on {}",
            user.user_id, transition, kind
        )))
    }
}
