//! Infrastructure layer: the in-memory hub and the wire DTOs.

pub mod dto;
pub mod hub;
