pub mod authenticated_user;
pub mod client;

pub use authenticated_user::AuthenticatedUser;
pub use client::{ClientKind, ClientRegistry};
