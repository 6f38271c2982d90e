pub mod contracts;
pub mod deals;
pub mod legacy;
pub mod offers;
pub mod spare_parts;
pub mod support_assignment;
