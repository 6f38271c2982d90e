pub mod cancel_contract_command;
pub mod draft_contract_command;
pub mod link_legacy_contract_command;
pub mod send_to_customer_command;
pub mod sign_contract_command;
pub mod update_installment_status_command;
