//! # Domain Entities
//!
//! Persisted document shapes, one collection each. Every entity:
//!
//! - maps `_id` to `id: Option<ObjectId>` (assigned by the repository)
//! - uses camelCase field names on the wire and in MongoDB
//! - carries `createdAt` / `updatedAt`, maintained by the repository
//! - declares its field rules with `validator`
//!
//! | Entity | Collection | Unique |
//! |--------|------------|--------|
//! | [`Customer`] | `customers` | email, cognitoId |
//! | [`HealthUnit`] | `health_units` | email |
//! | [`Collaborator`] | `collaborators` | email, cognitoId |
//! | [`Patient`] | `patients` | |
//! | [`Service`] | `services` | name |
//! | [`Order`] | `orders` | |
//! | [`Review`] | `reviews` | |
//! | [`Event`] | `events` | |

use mongodb::bson::oid::ObjectId;
use serde::{de::DeserializeOwned, Serialize};
use validator::Validate;

pub mod collaborator;
pub mod common;
pub mod customer;
pub mod event;
pub mod health_unit;
pub mod order;
pub mod patient;
pub mod review;
pub mod service;

pub use collaborator::{Collaborator, CollaboratorRole};
pub use common::Address;
pub use customer::Customer;
pub use event::{Event, EventKind};
pub use health_unit::{HealthUnit, HealthUnitKind, Rating};
pub use order::{InvoiceRef, Order, OrderStatus, Payment, PaymentStatus, Schedule};
pub use patient::{Gender, Patient};
pub use review::Review;
pub use service::Service;

/// A document type bound to one collection.
pub trait Entity: Serialize + DeserializeOwned + Validate + Send + Sync + Unpin + 'static {
    const COLLECTION: &'static str;

    /// Fields backed by a unique index (camelCase names).
    const UNIQUE_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> Option<ObjectId>;
}
