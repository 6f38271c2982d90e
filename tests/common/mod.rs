use std::sync::Arc;

use uuid::Uuid;

use medequip_api::{
    auth::{AuthenticatedUser, Role},
    config::AppConfig,
    db, events,
    services::legacy::{InMemoryLegacyContracts, LegacyContractRecord},
    services::support_assignment::RoundRobinAssignment,
    AppState,
};

pub const KNOWN_LEGACY_ID: &str = "TBS-7001";

/// Helper harness wiring the workflow services against a throwaway SQLite
/// database with the schema created from the entity definitions.
pub struct TestApp {
    pub state: AppState,
    pub support_ids: Vec<Uuid>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_path = std::env::temp_dir().join(format!("medequip_test_{}.db", Uuid::new_v4()));
        let mut config = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test",
        );
        config.db_max_connections = 1;
        config.db_min_connections = 1;
        config.auto_create_schema = true;

        let pool = db::establish_connection_from_app_config(&config)
            .await
            .expect("failed to create test database");

        let (event_sender, receiver) = events::channel(256);
        let event_task = events::spawn_event_logger(receiver);

        let support_ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let assignment = Arc::new(RoundRobinAssignment::new(support_ids.clone()));
        let legacy = Arc::new(InMemoryLegacyContracts::from_records([
            LegacyContractRecord {
                legacy_id: KNOWN_LEGACY_ID.to_string(),
                contract_number: "C-2018-114".to_string(),
                customer_name: "Delta Medical Group".to_string(),
                signed_at: None,
            },
        ]));

        let state = AppState::new(Arc::new(pool), config, event_sender, assignment, legacy);

        Self {
            state,
            support_ids,
            _event_task: event_task,
        }
    }
}

/// A fresh user holding exactly one role.
pub fn actor(role: Role) -> AuthenticatedUser {
    AuthenticatedUser::with_role(Uuid::new_v4(), role)
}
