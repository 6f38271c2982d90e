pub mod check_availability_command;
pub mod create_spare_part_request_command;
pub mod customer_decision_command;
pub mod mark_delivered_command;
pub mod mark_ready_command;
pub mod set_price_command;
pub mod warehouse_approval_command;
