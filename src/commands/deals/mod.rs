pub mod complete_deal_command;
pub mod create_deal_command;
pub mod fail_deal_command;
pub mod manager_approval_command;
pub mod mark_account_created_command;
pub mod mark_legal_reviewed_command;
pub mod set_client_credentials_command;
pub mod submit_for_approval_command;
pub mod submit_review_command;
pub mod submit_salesman_report_command;
pub mod super_admin_approval_command;
