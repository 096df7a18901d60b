use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::bson_date;
use crate::domain::entities::{Order, OrderStatus, Payment, PaymentStatus, Schedule};
use crate::utils::string_utils::deserialize_optional_string;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub weekdays: Vec<i32>,
    #[serde(default)]
    pub hour: Option<String>,
}

impl ScheduleRequest {
    pub fn to_schedule(&self) -> Schedule {
        Schedule {
            start_date: bson_date(&self.start_date),
            end_date: self.end_date.as_ref().map(bson_date),
            weekdays: self.weekdays.clone(),
            hour: self.hour.clone(),
        }
    }
}

fn default_currency() -> String {
    "eur".to_string()
}

/// Booking request. The amount is the price the customer accepted from
/// the health unit's listing; the unit confirms it by accepting the order.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub health_unit: String,
    pub patient: String,
    pub service: String,
    pub schedule: ScheduleRequest,

    #[validate(range(min = 50, message = "amount must be at least 50 (minor units)"))]
    pub amount: i64,

    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub currency: String,

    #[serde(default, deserialize_with = "deserialize_optional_string")]
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl PlaceOrderRequest {
    /// Pending order with a pending payment.
    pub fn to_order(
        &self,
        customer: ObjectId,
        health_unit: ObjectId,
        patient: ObjectId,
        service: ObjectId,
    ) -> Order {
        Order {
            id: None,
            customer,
            health_unit,
            patient,
            service,
            schedule: self.schedule.to_schedule(),
            status: OrderStatus::Pending,
            payment: Payment {
                amount: self.amount,
                currency: self.currency.to_lowercase(),
                payment_intent_id: None,
                status: PaymentStatus::Pending,
            },
            invoice: None,
            notes: self.notes.clone(),
            created_at: None,
            updated_at: None,
        }
    }
}

/// `?status=accepted` on order listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub order_id: String,
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
}
