//! Domain Entities

pub mod audit_event;
pub mod identity;
