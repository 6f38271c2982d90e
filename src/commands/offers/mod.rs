pub mod add_equipment_command;
pub mod assign_to_support_command;
pub mod create_installment_plan_command;
pub mod create_offer_command;
pub mod create_offer_request_command;
pub mod record_salesman_decision_command;
pub mod send_to_salesman_command;
pub mod update_request_status_command;
pub mod update_terms_command;
