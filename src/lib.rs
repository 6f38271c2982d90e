//! MedEquip API Library
//!
//! Workflow core for the medical-equipment sales and maintenance backend:
//! the deal approval pipeline, offer preparation, the contract lifecycle,
//! and the spare-part procurement chain. HTTP shaping, identity issuance,
//! file storage, and billing live in collaborating services outside this
//! crate.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod commands;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod services;
pub mod workflow;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::services::legacy::LegacyContractLookup;
use crate::services::support_assignment::SupportAssignment;
use crate::services::{
    contracts::ContractService, deals::DealService, offers::OfferService,
    spare_parts::SparePartService,
};

/// The workflow services, one per state machine.
#[derive(Clone)]
pub struct AppServices {
    pub deals: Arc<DealService>,
    pub offers: Arc<OfferService>,
    pub contracts: Arc<ContractService>,
    pub spare_parts: Arc<SparePartService>,
}

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: AppServices,
}

impl AppState {
    /// Wires the services against a database connection, an event channel,
    /// and the two external collaborators.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
        assignment: Arc<dyn SupportAssignment>,
        legacy: Arc<dyn LegacyContractLookup>,
    ) -> Self {
        let event_sender = Arc::new(event_sender);

        let services = AppServices {
            deals: Arc::new(DealService::new(db.clone(), event_sender.clone())),
            offers: Arc::new(OfferService::new(
                db.clone(),
                event_sender.clone(),
                assignment,
            )),
            contracts: Arc::new(ContractService::new(
                db.clone(),
                event_sender.clone(),
                config.contract_validity_days,
                legacy,
            )),
            spare_parts: Arc::new(SparePartService::new(db.clone(), event_sender.clone())),
        };

        Self {
            db,
            config,
            event_sender,
            services,
        }
    }

    pub fn deal_service(&self) -> Arc<DealService> {
        self.services.deals.clone()
    }

    pub fn offer_service(&self) -> Arc<OfferService> {
        self.services.offers.clone()
    }

    pub fn contract_service(&self) -> Arc<ContractService> {
        self.services.contracts.clone()
    }

    pub fn spare_part_service(&self) -> Arc<SparePartService> {
        self.services.spare_parts.clone()
    }
}
