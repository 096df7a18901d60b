//! Health unit staff.

pub mod collaborator_service;

pub use collaborator_service::CollaboratorService;
