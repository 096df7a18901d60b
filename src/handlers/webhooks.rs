//! `/api/v1/webhooks/stripe`
//!
//! The body is read as raw bytes: the signature covers the exact payload.
//! Unknown event types are acknowledged so Stripe stops retrying them.

use actix_web::{post, web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::core::errors::AppError;
use crate::domain::dto::ApiResponse;
use crate::services::health_units::HealthUnitService;
use crate::services::orders::OrderService;
use crate::services::payments::{PaymentProvider, StripeEvent};

pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

#[post("/stripe")]
pub async fn stripe(
    req: HttpRequest,
    body: web::Bytes,
    payments: web::Data<dyn PaymentProvider>,
    orders: web::Data<OrderService>,
    health_units: web::Data<HealthUnitService>,
) -> Result<HttpResponse, AppError> {
    let signature = req
        .headers()
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::InvalidParameter("Missing Stripe-Signature header".to_string()))?;

    let event = payments.verify_webhook(&body, signature, chrono::Utc::now().timestamp())?;
    log::info!("Stripe event {} ({})", event.id, event.kind);

    match event.classify() {
        StripeEvent::AccountUpdated { account_id, charges_enabled } => {
            health_units.sync_stripe_account(&account_id, charges_enabled).await?;
        }
        StripeEvent::Ignored(kind) => log::debug!("Ignoring Stripe event type {}", kind),
        payment => orders.handle_payment_event(&payment).await?,
    }

    ApiResponse::ok(&json!({ "received": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::Repositories;
    use crate::services::callers::fixtures;
    use crate::services::identity::MockIdentityProvider;
    use crate::services::invoicing::MockInvoiceProvider;
    use crate::services::mail::MockMailer;
    use crate::services::payments::webhook::EventData;
    use crate::services::payments::{MockPaymentProvider, WebhookEvent};
    use actix_web::{test, App};
    use std::sync::Arc;

    fn app_data(repos: &Repositories, payments: MockPaymentProvider) -> (
        web::Data<dyn PaymentProvider>,
        web::Data<OrderService>,
        web::Data<HealthUnitService>,
    ) {
        let payments: Arc<dyn PaymentProvider> = Arc::new(payments);
        let orders = OrderService::new(
            repos.clone(),
            Arc::clone(&payments),
            Arc::new(MockInvoiceProvider::new()),
            Arc::new(MockMailer::new()),
            10,
        );
        let units = HealthUnitService::new(
            repos.clone(),
            Arc::new(MockIdentityProvider::new()),
            Arc::clone(&payments),
            Arc::new(MockMailer::new()),
        );
        (web::Data::from(payments), web::Data::new(orders), web::Data::new(units))
    }

    fn event(kind: &str, object: serde_json::Value) -> WebhookEvent {
        WebhookEvent {
            id: "evt_1".to_string(),
            kind: kind.to_string(),
            data: EventData { object },
        }
    }

    #[actix_web::test]
    async fn test_missing_signature_is_rejected() {
        let (repos, _) = Repositories::in_memory();
        let (payments, orders, units) = app_data(&repos, MockPaymentProvider::new());
        let app = test::init_service(
            App::new()
                .app_data(payments)
                .app_data(orders)
                .app_data(units)
                .service(web::scope("/webhooks").service(stripe)),
        )
        .await;

        let req = test::TestRequest::post().uri("/webhooks/stripe").set_payload("{}").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_account_updated_syncs_health_unit() {
        let (repos, _) = Repositories::in_memory();
        let unit = fixtures::health_unit(&repos, "a@lar.pt").await;

        let mut payments = MockPaymentProvider::new();
        payments
            .expect_verify_webhook()
            .withf(|_, signature, _| signature.eq_ignore_ascii_case("t=1,v1=abc"))
            .returning(|_, _, _| {
                Ok(event(
                    "account.updated",
                    serde_json::json!({ "id": "acct_1", "charges_enabled": false }),
                ))
            });
        let (payments, orders, units) = app_data(&repos, payments);
        let app = test::init_service(
            App::new()
                .app_data(payments)
                .app_data(orders)
                .app_data(units)
                .service(web::scope("/webhooks").service(stripe)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/webhooks/stripe")
            .insert_header((STRIPE_SIGNATURE_HEADER, "t=1,v1=abc"))
            .set_payload("{}")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let stored = repos.health_units.retrieve(&unit.id.unwrap().to_hex(), None).await.unwrap();
        assert!(!stored.charges_enabled);
    }

    #[actix_web::test]
    async fn test_unknown_events_are_acknowledged() {
        let (repos, _) = Repositories::in_memory();
        let mut payments = MockPaymentProvider::new();
        payments
            .expect_verify_webhook()
            .returning(|_, _, _| Ok(event("customer.created", serde_json::json!({ "id": "cus_1" }))));
        let (payments, orders, units) = app_data(&repos, payments);
        let app = test::init_service(
            App::new()
                .app_data(payments)
                .app_data(orders)
                .app_data(units)
                .service(web::scope("/webhooks").service(stripe)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/webhooks/stripe")
            .insert_header((STRIPE_SIGNATURE_HEADER, "t=1,v1=abc"))
            .set_payload("{}")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["received"], true);
    }
}
