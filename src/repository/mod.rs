pub mod customers;
pub mod payment_dues;
pub mod payments;
pub mod table_service;
