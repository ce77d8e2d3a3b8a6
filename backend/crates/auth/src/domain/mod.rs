//! Domain Layer
//!
//! Entities, value objects, and repository traits. No persistence or
//! HTTP knowledge lives here.

pub mod entity;
pub mod repository;
pub mod value_object;
