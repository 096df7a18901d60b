//! Order lifecycle: booking, business decisions, payment and invoicing.
//!
//! | Transition | Actor |
//! |------------|-------|
//! | pending → accepted / rejected | business (admin, manager) |
//! | paid → completed | business (admin, manager) |
//! | any open → cancelled | customer, back-office |
//! | accepted / payment_failed → paid / payment_failed | Stripe webhook |

use std::sync::Arc;

use mongodb::bson::{self, doc, oid::ObjectId, DateTime, Document};
use validator::Validate;

use crate::core::errors::{AppError, AppResult, ErrorContext};
use crate::db::scope::TransactionScope;
use crate::domain::dto::orders::{CheckoutResponse, OrderFilter, PlaceOrderRequest};
use crate::domain::entities::{
    Event, EventKind, InvoiceRef, Order, OrderStatus, PaymentStatus,
};
use crate::domain::models::auth::{AuthenticatedUser, ClientKind};
use crate::repositories::{ListOptions, Page, Repositories};
use crate::services::callers::{customer_of, id_of, manager_of, member_of};
use crate::services::invoicing::{InvoiceProvider, InvoiceRequest};
use crate::services::mail::{templates, Email, Mailer};
use crate::services::orchestration::finish;
use crate::services::payments::{PaymentProvider, PaymentRequest, StripeEvent};

const DEFAULT_EVENT_MILLIS: i64 = 60 * 60 * 1000;

pub struct OrderService {
    repos: Repositories,
    payments: Arc<dyn PaymentProvider>,
    invoicing: Arc<dyn InvoiceProvider>,
    mailer: Arc<dyn Mailer>,
    fee_percent: u32,
}

impl OrderService {
    pub fn new(
        repos: Repositories,
        payments: Arc<dyn PaymentProvider>,
        invoicing: Arc<dyn InvoiceProvider>,
        mailer: Arc<dyn Mailer>,
        fee_percent: u32,
    ) -> Self {
        Self { repos, payments, invoicing, mailer, fee_percent }
    }

    /// Books a service for one of the caller's patients.
    pub async fn place(&self, user: &AuthenticatedUser, request: PlaceOrderRequest) -> AppResult<Order> {
        request.validate()?;
        let customer = customer_of(&self.repos, user).await?;
        let customer_id = id_of(customer.id)?;

        let patient = self.repos.patients.retrieve(&request.patient, None).await?;
        if !patient.belongs_to(&customer_id) {
            return Err(AppError::InvalidParameter("Patient does not belong to this customer".to_string()));
        }
        let service = self.repos.services.retrieve(&request.service, None).await?;
        let unit = self.repos.health_units.retrieve(&request.health_unit, None).await?;
        let service_id = id_of(service.id)?;
        if !unit.offers(&service_id) {
            return Err(AppError::InvalidParameter(format!("{} does not offer {}", unit.name, service.name)));
        }
        if !unit.accepts_orders() {
            return Err(AppError::InvalidParameter(format!("{} is not accepting orders yet", unit.name)));
        }

        let order = request.to_order(customer_id, id_of(unit.id)?, id_of(patient.id)?, service_id);
        let order = self.repos.orders.create(order, None).await?;
        let order_id = id_of(order.id)?.to_hex();
        log::info!("Order {} placed with {}", order_id, unit.name);

        self.notify(templates::order_status(&unit.email, &order_id, OrderStatus::Pending.as_str()))
            .await;
        Ok(order)
    }

    pub async fn list_for_customer(
        &self,
        user: &AuthenticatedUser,
        filter: OrderFilter,
        options: &ListOptions,
    ) -> AppResult<Page<Order>> {
        let customer = customer_of(&self.repos, user).await?;
        let query = with_status(doc! { "customer": id_of(customer.id)? }, filter);
        self.repos.orders.query_list(query, options, None).await
    }

    pub async fn list_for_health_unit(
        &self,
        user: &AuthenticatedUser,
        filter: OrderFilter,
        options: &ListOptions,
    ) -> AppResult<Page<Order>> {
        let member = member_of(&self.repos, user).await?;
        let query = with_status(doc! { "healthUnit": member.health_unit }, filter);
        self.repos.orders.query_list(query, options, None).await
    }

    /// Order visible to the caller: its customer, its health unit's staff
    /// or the back-office.
    pub async fn get(&self, user: &AuthenticatedUser, id: &str) -> AppResult<Order> {
        let order = self.repos.orders.retrieve(id, None).await?;
        let visible = match user.client {
            ClientKind::Admin => true,
            ClientKind::Marketplace => {
                order.belongs_to_customer(&id_of(customer_of(&self.repos, user).await?.id)?)
            }
            ClientKind::Business => {
                order.belongs_to_health_unit(&member_of(&self.repos, user).await?.health_unit)
            }
        };
        if !visible {
            return Err(not_found());
        }
        Ok(order)
    }

    /// Moves an order to `next` on behalf of the caller.
    ///
    /// Accepting also books the schedule in the unit's calendar; cancelling
    /// cancels an unpaid payment intent and removes the calendar entry.
    pub async fn transition(
        &self,
        user: &AuthenticatedUser,
        id: &str,
        next: OrderStatus,
    ) -> AppResult<Order> {
        let order = self.repos.orders.retrieve(id, None).await?;
        self.authorize_transition(user, &order, next).await?;
        if !order.status.can_transition_to(next) {
            return Err(AppError::InvalidParameter(format!(
                "Order cannot move from {} to {}",
                order.status, next
            )));
        }
        let order_id = id_of(order.id)?;

        let mut fields = doc! { "status": next.as_str() };
        if next == OrderStatus::Cancelled && order.payment.status != PaymentStatus::Succeeded {
            fields.insert("payment.status", PaymentStatus::Cancelled.as_str());
        }

        let mut scope = self.repos.begin().await?;
        let result = self.apply_transition(&mut scope, &order, fields, next).await;
        let updated = finish(scope, result).await?;
        log::info!("Order {} {} → {}", order_id, order.status, next);
        if next == OrderStatus::Cancelled {
            self.release_payment(&order).await;
        }

        let recipient = match next {
            OrderStatus::Cancelled => self.repos.health_units.retrieve(&order.health_unit.to_hex(), None).await.map(|u| u.email),
            _ => self.repos.customers.retrieve(&order.customer.to_hex(), None).await.map(|c| c.email),
        };
        match recipient {
            Ok(to) => self.notify(templates::order_status(&to, &order_id.to_hex(), next.as_str())).await,
            Err(e) => log::warn!("No recipient for order {} update: {}", order_id, e),
        }
        Ok(updated)
    }

    async fn authorize_transition(
        &self,
        user: &AuthenticatedUser,
        order: &Order,
        next: OrderStatus,
    ) -> AppResult<()> {
        let allowed = match user.client {
            ClientKind::Business => {
                let manager = manager_of(&self.repos, user).await?;
                if !order.belongs_to_health_unit(&manager.health_unit) {
                    return Err(not_found());
                }
                matches!(next, OrderStatus::Accepted | OrderStatus::Rejected | OrderStatus::Completed)
            }
            ClientKind::Marketplace => {
                let customer = customer_of(&self.repos, user).await?;
                if !order.belongs_to_customer(&id_of(customer.id)?) {
                    return Err(not_found());
                }
                next == OrderStatus::Cancelled
            }
            ClientKind::Admin => next == OrderStatus::Cancelled,
        };
        if !allowed {
            return Err(AppError::AuthorizationError(format!(
                "{} clients cannot set orders to {}",
                user.client, next
            )));
        }
        Ok(())
    }

    async fn apply_transition(
        &self,
        scope: &mut TransactionScope,
        order: &Order,
        fields: Document,
        next: OrderStatus,
    ) -> AppResult<Order> {
        let order_id = id_of(order.id)?;
        let updated = self
            .repos
            .orders
            .update_by_id(&order_id.to_hex(), fields, Some(&mut *scope))
            .await?;

        match next {
            OrderStatus::Accepted => {
                let service = self.repos.services.retrieve(&order.service.to_hex(), Some(&mut *scope)).await?;
                let start = order.schedule.start_date;
                let end = order
                    .schedule
                    .end_date
                    .unwrap_or_else(|| DateTime::from_millis(start.timestamp_millis() + DEFAULT_EVENT_MILLIS));
                let event = Event {
                    id: None,
                    health_unit: order.health_unit,
                    order: Some(order_id),
                    title: service.name,
                    description: order.notes.clone(),
                    start,
                    end,
                    kind: EventKind::Order,
                    created_at: None,
                    updated_at: None,
                };
                self.repos.events.create(event, Some(&mut *scope)).await?;
            }
            OrderStatus::Cancelled => {
                let events = self
                    .repos
                    .events
                    .query_list(doc! { "order": order_id }, &ListOptions::page(1, 0), Some(&mut *scope))
                    .await?;
                for event in events.data {
                    self.repos.events.delete(&id_of(event.id)?.to_hex(), Some(&mut *scope)).await?;
                }
            }
            _ => {}
        }
        Ok(updated)
    }

    /// Cancels the unpaid intent of an order whose cancellation is already
    /// committed. Captured payments are refunded from the Stripe dashboard.
    async fn release_payment(&self, order: &Order) {
        let Some(intent) = order.payment.payment_intent_id.as_deref() else {
            return;
        };
        if order.payment.status == PaymentStatus::Succeeded {
            log::warn!(
                "Order {:?} cancelled after payment; intent {} needs a manual refund",
                order.id, intent
            );
            return;
        }
        match self.payments.cancel_payment_intent(intent).await {
            Ok(()) => log::info!("Payment intent {} cancelled", intent),
            Err(e) => log::error!("Order {:?} cancelled but intent {} is still open: {}", order.id, intent, e),
        }
    }

    /// Creates (or, for a retry, returns) the payment intent of an accepted
    /// order and hands the client secret to the marketplace frontend.
    pub async fn checkout(&self, user: &AuthenticatedUser, id: &str) -> AppResult<CheckoutResponse> {
        let customer = customer_of(&self.repos, user).await?;
        let order = self.repos.orders.retrieve(id, None).await?;
        if !order.belongs_to_customer(&id_of(customer.id)?) {
            return Err(not_found());
        }
        if !matches!(order.status, OrderStatus::Accepted | OrderStatus::PaymentFailed) {
            return Err(AppError::InvalidParameter(format!(
                "Order is {}; only accepted orders can be paid",
                order.status
            )));
        }

        let unit = self.repos.health_units.retrieve(&order.health_unit.to_hex(), None).await?;
        let destination = match (&unit.stripe_account_id, unit.accepts_orders()) {
            (Some(account), true) => account.clone(),
            _ => {
                return Err(AppError::InvalidParameter(format!(
                    "{} cannot receive payments yet",
                    unit.name
                )));
            }
        };

        let order_id = id_of(order.id)?.to_hex();
        let request = PaymentRequest {
            amount: order.payment.amount,
            currency: order.payment.currency.clone(),
            customer: customer.stripe_customer_id.clone(),
            destination,
            application_fee: PaymentRequest::application_fee_for(order.payment.amount, self.fee_percent),
            order_id: order_id.clone(),
            idempotency_key: format!("order-{}", order_id),
        };
        let intent = self.payments.create_payment_intent(request).await?;
        log::info!("Payment intent {} created for order {}", intent.id, order_id);

        self.repos
            .orders
            .update_by_id(&order_id, doc! { "payment.paymentIntentId": intent.id.as_str() }, None)
            .await?;

        Ok(CheckoutResponse {
            order_id,
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
        })
    }

    /// Applies a verified Stripe payment event. Events for unknown orders or
    /// arriving out of order are logged and acknowledged.
    pub async fn handle_payment_event(&self, event: &StripeEvent) -> AppResult<()> {
        match event {
            StripeEvent::PaymentSucceeded { intent_id, order_id } => {
                self.payment_succeeded(intent_id, order_id.as_deref()).await
            }
            StripeEvent::PaymentFailed { intent_id, order_id } => {
                self.payment_failed(intent_id, order_id.as_deref()).await
            }
            other => {
                log::debug!("Not a payment event: {:?}", other);
                Ok(())
            }
        }
    }

    async fn order_for_intent(&self, intent_id: &str, order_id: Option<&str>) -> AppResult<Option<Order>> {
        let mut filter = doc! { "payment.paymentIntentId": intent_id };
        if let Some(id) = order_id.and_then(|id| ObjectId::parse_str(id).ok()) {
            filter.insert("_id", id);
        }
        let page = self.repos.orders.query_list(filter, &ListOptions::page(1, 1), None).await?;
        let order = page.data.into_iter().next();
        if order.is_none() {
            log::warn!("No order for payment intent {} (metadata order {:?})", intent_id, order_id);
        }
        Ok(order)
    }

    async fn payment_succeeded(&self, intent_id: &str, order_id: Option<&str>) -> AppResult<()> {
        let Some(order) = self.order_for_intent(intent_id, order_id).await? else {
            return Ok(());
        };
        if order.status == OrderStatus::Paid {
            log::debug!("Duplicate payment_intent.succeeded for {}", intent_id);
            return Ok(());
        }
        if !order.status.can_transition_to(OrderStatus::Paid) {
            log::warn!(
                "Payment {} succeeded for order {:?} in status {}; refund required",
                intent_id, order.id, order.status
            );
            return Ok(());
        }

        let id = id_of(order.id)?.to_hex();
        let fields = doc! {
            "status": OrderStatus::Paid.as_str(),
            "payment.status": PaymentStatus::Succeeded.as_str(),
        };
        self.repos.orders.update_by_id(&id, fields, None).await?;
        log::info!("Order {} paid ({})", id, intent_id);

        let customer = self.repos.customers.retrieve(&order.customer.to_hex(), None).await?;
        let invoice = self.issue_invoice(&order, &id, &customer.name, &customer.email).await;
        let receipt = templates::payment_receipt(
            &customer.email,
            &id,
            order.payment.amount,
            &order.payment.currency,
            invoice.as_ref().map(|i| i.number.as_str()),
            invoice.as_ref().and_then(|i| i.url.as_deref()),
        );
        self.notify(receipt).await;
        Ok(())
    }

    /// Issues and stores the invoice. Failures are logged for the finance
    /// team; the payment itself stands.
    async fn issue_invoice(&self, order: &Order, id: &str, name: &str, email: &str) -> Option<InvoiceRef> {
        let description = match self.repos.services.retrieve(&order.service.to_hex(), None).await {
            Ok(service) => service.name,
            Err(_) => format!("Order {}", id),
        };
        let request = InvoiceRequest {
            order_id: id.to_string(),
            customer_name: name.to_string(),
            customer_email: email.to_string(),
            description,
            amount: order.payment.amount,
            currency: order.payment.currency.clone(),
        };

        let invoice = match self.invoicing.issue_invoice(request).await {
            Ok(invoice) => invoice,
            Err(e) => {
                log::error!("Invoice for order {} not issued: {}", id, e);
                return None;
            }
        };
        let reference = InvoiceRef { id: invoice.id, number: invoice.number, url: invoice.url };
        log::info!("Invoice {} issued for order {}", reference.number, id);

        let stored = bson::to_bson(&reference).context("Failed to encode invoice reference");
        let result = match stored {
            Ok(value) => self.repos.orders.update_by_id(id, doc! { "invoice": value }, None).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            log::error!("Invoice {} issued but not stored on order {}: {}", reference.number, id, e);
        }
        Some(reference)
    }

    async fn payment_failed(&self, intent_id: &str, order_id: Option<&str>) -> AppResult<()> {
        let Some(order) = self.order_for_intent(intent_id, order_id).await? else {
            return Ok(());
        };
        if !order.status.can_transition_to(OrderStatus::PaymentFailed) {
            log::debug!("Ignoring payment failure for order {:?} in status {}", order.id, order.status);
            return Ok(());
        }

        let id = id_of(order.id)?.to_hex();
        let fields = doc! {
            "status": OrderStatus::PaymentFailed.as_str(),
            "payment.status": PaymentStatus::Failed.as_str(),
        };
        self.repos.orders.update_by_id(&id, fields, None).await?;
        log::info!("Payment {} failed for order {}", intent_id, id);

        if let Ok(customer) = self.repos.customers.retrieve(&order.customer.to_hex(), None).await {
            self.notify(templates::order_status(&customer.email, &id, OrderStatus::PaymentFailed.as_str()))
                .await;
        }
        Ok(())
    }

    async fn notify(&self, email: Email) {
        let to = email.to.clone();
        if let Err(e) = self.mailer.send(email).await {
            log::warn!("Email to {} not sent: {}", to, e);
        }
    }
}

fn with_status(mut query: Document, filter: OrderFilter) -> Document {
    if let Some(status) = filter.status {
        query.insert("status", status.as_str());
    }
    query
}

fn not_found() -> AppError {
    AppError::NotFound("orders document not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_store::MemoryStore;
    use crate::db::store::StoreError;
    use crate::domain::entities::{CollaboratorRole, Customer, HealthUnit, Patient, Service};
    use crate::services::callers::fixtures;
    use crate::services::invoicing::{Invoice, MockInvoiceProvider};
    use crate::services::mail::MockMailer;
    use crate::services::payments::{MockPaymentProvider, PaymentIntent};

    struct World {
        repos: Repositories,
        store: Arc<MemoryStore>,
        customer: Customer,
        patient: Patient,
        unit: HealthUnit,
        service: Service,
    }

    async fn world() -> World {
        let (repos, store) = Repositories::in_memory();
        let customer = fixtures::customer(&repos, "ana").await;
        let patient = repos
            .patients
            .create(Patient::new(customer.id.unwrap(), "Maria Silva".to_string()), None)
            .await
            .unwrap();
        let service = repos
            .services
            .create(Service::new("Home care".to_string(), "care".to_string()), None)
            .await
            .unwrap();
        let unit = fixtures::health_unit(&repos, "geral@larsol.pt").await;
        let unit = repos
            .health_units
            .update_by_id(&unit.id.unwrap().to_hex(), doc! { "services": [service.id.unwrap()] }, None)
            .await
            .unwrap();
        fixtures::member(&repos, "boss", &unit, CollaboratorRole::Manager).await;
        World { repos, store, customer, patient, unit, service }
    }

    fn quiet_mailer() -> MockMailer {
        let mut mailer = MockMailer::new();
        mailer.expect_send().returning(|_| Ok(()));
        mailer
    }

    fn orders(world: &World, payments: MockPaymentProvider, invoicing: MockInvoiceProvider) -> OrderService {
        OrderService::new(world.repos.clone(), Arc::new(payments), Arc::new(invoicing), Arc::new(quiet_mailer()), 10)
    }

    fn place_request(world: &World) -> PlaceOrderRequest {
        serde_json::from_value(serde_json::json!({
            "healthUnit": world.unit.id.unwrap().to_hex(),
            "patient": world.patient.id.unwrap().to_hex(),
            "service": world.service.id.unwrap().to_hex(),
            "schedule": { "startDate": "2024-04-01T09:00:00Z", "weekdays": [1, 3] },
            "amount": 4500
        }))
        .unwrap()
    }

    fn ana() -> AuthenticatedUser {
        fixtures::user("ana", ClientKind::Marketplace)
    }

    fn boss() -> AuthenticatedUser {
        fixtures::user("boss", ClientKind::Business)
    }

    async fn placed(world: &World, service: &OrderService) -> String {
        let order = service.place(&ana(), place_request(world)).await.unwrap();
        order.id.unwrap().to_hex()
    }

    #[actix_web::test]
    async fn test_place_creates_pending_order() {
        let world = world().await;
        let service = orders(&world, MockPaymentProvider::new(), MockInvoiceProvider::new());

        let order = service.place(&ana(), place_request(&world)).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.customer, world.customer.id.unwrap());
        assert_eq!(order.payment.currency, "eur");
        let mine = service
            .list_for_customer(&ana(), OrderFilter::default(), &ListOptions::default())
            .await
            .unwrap();
        assert_eq!(mine.total_documents, 1);
    }

    #[actix_web::test]
    async fn test_place_rejects_foreign_patient() {
        let world = world().await;
        fixtures::customer(&world.repos, "rui").await;
        let service = orders(&world, MockPaymentProvider::new(), MockInvoiceProvider::new());

        let err = service
            .place(&fixtures::user("rui", ClientKind::Marketplace), place_request(&world))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
    }

    #[actix_web::test]
    async fn test_place_rejects_unit_without_charges() {
        let world = world().await;
        world
            .repos
            .health_units
            .update_by_id(&world.unit.id.unwrap().to_hex(), doc! { "chargesEnabled": false }, None)
            .await
            .unwrap();
        let service = orders(&world, MockPaymentProvider::new(), MockInvoiceProvider::new());

        let err = service.place(&ana(), place_request(&world)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(m) if m.contains("not accepting")));
    }

    #[actix_web::test]
    async fn test_accept_books_calendar_event() {
        let world = world().await;
        let service = orders(&world, MockPaymentProvider::new(), MockInvoiceProvider::new());
        let id = placed(&world, &service).await;

        let accepted = service.transition(&boss(), &id, OrderStatus::Accepted).await.unwrap();
        assert_eq!(accepted.status, OrderStatus::Accepted);

        let events = world
            .repos
            .events
            .query_list(doc! { "order": accepted.id.unwrap() }, &ListOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(events.total_documents, 1);
        assert_eq!(events.data[0].kind, EventKind::Order);
        assert_eq!(events.data[0].title, "Home care");
        assert_eq!(
            events.data[0].end.timestamp_millis() - events.data[0].start.timestamp_millis(),
            DEFAULT_EVENT_MILLIS
        );
    }

    #[actix_web::test]
    async fn test_actor_rules() {
        let world = world().await;
        let service = orders(&world, MockPaymentProvider::new(), MockInvoiceProvider::new());
        let id = placed(&world, &service).await;

        let err = service.transition(&ana(), &id, OrderStatus::Accepted).await.unwrap_err();
        assert!(matches!(err, AppError::AuthorizationError(_)));

        let err = service.transition(&boss(), &id, OrderStatus::Completed).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));

        let err = service.transition(&boss(), &id, OrderStatus::Paid).await.unwrap_err();
        assert!(matches!(err, AppError::AuthorizationError(_)));
    }

    #[actix_web::test]
    async fn test_checkout_creates_destination_charge() {
        let world = world().await;
        let mut payments = MockPaymentProvider::new();
        payments
            .expect_create_payment_intent()
            .withf(|request| {
                request.amount == 4500
                    && request.application_fee == 450
                    && request.destination == "acct_1"
                    && request.customer.as_deref() == Some("cus_ana")
                    && request.idempotency_key == format!("order-{}", request.order_id)
            })
            .times(1)
            .returning(|_| {
                Ok(PaymentIntent {
                    id: "pi_1".to_string(),
                    client_secret: Some("pi_1_secret".to_string()),
                    status: "requires_payment_method".to_string(),
                })
            });
        let service = orders(&world, payments, MockInvoiceProvider::new());
        let id = placed(&world, &service).await;

        let err = service.checkout(&ana(), &id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));

        service.transition(&boss(), &id, OrderStatus::Accepted).await.unwrap();
        let checkout = service.checkout(&ana(), &id).await.unwrap();

        assert_eq!(checkout.client_secret.as_deref(), Some("pi_1_secret"));
        let stored = world.repos.orders.retrieve(&id, None).await.unwrap();
        assert_eq!(stored.payment.payment_intent_id.as_deref(), Some("pi_1"));
    }

    async fn awaiting_payment(world: &World, service: &OrderService) -> String {
        let id = placed(world, service).await;
        service.transition(&boss(), &id, OrderStatus::Accepted).await.unwrap();
        world
            .repos
            .orders
            .update_by_id(&id, doc! { "payment.paymentIntentId": "pi_1" }, None)
            .await
            .unwrap();
        id
    }

    #[actix_web::test]
    async fn test_payment_succeeded_marks_paid_and_invoices_once() {
        let world = world().await;
        let mut invoicing = MockInvoiceProvider::new();
        invoicing
            .expect_issue_invoice()
            .withf(|request| request.amount == 4500 && request.description == "Home care")
            .times(1)
            .returning(|_| {
                Ok(Invoice {
                    id: "77".to_string(),
                    number: "FR 2024/77".to_string(),
                    url: Some("https://vendus.pt/doc/77".to_string()),
                })
            });
        let service = orders(&world, MockPaymentProvider::new(), invoicing);
        let id = awaiting_payment(&world, &service).await;

        let event = StripeEvent::PaymentSucceeded { intent_id: "pi_1".to_string(), order_id: Some(id.clone()) };
        service.handle_payment_event(&event).await.unwrap();
        service.handle_payment_event(&event).await.unwrap();

        let stored = world.repos.orders.retrieve(&id, None).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);
        assert_eq!(stored.payment.status, PaymentStatus::Succeeded);
        assert_eq!(stored.invoice.map(|i| i.number), Some("FR 2024/77".to_string()));
    }

    #[actix_web::test]
    async fn test_invoice_failure_keeps_payment() {
        let world = world().await;
        let mut invoicing = MockInvoiceProvider::new();
        invoicing
            .expect_issue_invoice()
            .returning(|_| Err(AppError::InternalError("vendus down".to_string())));
        let service = orders(&world, MockPaymentProvider::new(), invoicing);
        let id = awaiting_payment(&world, &service).await;

        let event = StripeEvent::PaymentSucceeded { intent_id: "pi_1".to_string(), order_id: None };
        service.handle_payment_event(&event).await.unwrap();

        let stored = world.repos.orders.retrieve(&id, None).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);
        assert!(stored.invoice.is_none());
    }

    #[actix_web::test]
    async fn test_payment_failure_then_unknown_intent() {
        let world = world().await;
        let service = orders(&world, MockPaymentProvider::new(), MockInvoiceProvider::new());
        let id = awaiting_payment(&world, &service).await;

        let failed = StripeEvent::PaymentFailed { intent_id: "pi_1".to_string(), order_id: Some(id.clone()) };
        service.handle_payment_event(&failed).await.unwrap();
        let stored = world.repos.orders.retrieve(&id, None).await.unwrap();
        assert_eq!(stored.status, OrderStatus::PaymentFailed);
        assert_eq!(stored.payment.status, PaymentStatus::Failed);

        let unknown = StripeEvent::PaymentSucceeded { intent_id: "pi_other".to_string(), order_id: None };
        assert!(service.handle_payment_event(&unknown).await.is_ok());
    }

    #[actix_web::test]
    async fn test_customer_cancel_releases_intent_and_calendar() {
        let world = world().await;
        let mut payments = MockPaymentProvider::new();
        payments
            .expect_cancel_payment_intent()
            .withf(|id| id.eq_ignore_ascii_case("pi_1"))
            .times(1)
            .returning(|_| Ok(()));
        let service = orders(&world, payments, MockInvoiceProvider::new());
        let id = awaiting_payment(&world, &service).await;

        let cancelled = service.transition(&ana(), &id, OrderStatus::Cancelled).await.unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.payment.status, PaymentStatus::Cancelled);
        let events = world
            .repos
            .events
            .query_list(doc! { "order": cancelled.id.unwrap() }, &ListOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(events.total_documents, 0);
    }

    #[actix_web::test]
    async fn test_failed_cancel_keeps_intent_open() {
        let world = world().await;
        let mut payments = MockPaymentProvider::new();
        payments.expect_cancel_payment_intent().never();
        let service = orders(&world, payments, MockInvoiceProvider::new());
        let id = awaiting_payment(&world, &service).await;
        let admin = fixtures::user("root", ClientKind::Admin);

        // The order lookup goes through; opening the transaction fails.
        world.store.fail_after(1, StoreError::Driver("primary stepped down".to_string()));
        let result = service.transition(&admin, &id, OrderStatus::Cancelled).await;

        assert!(result.is_err());
        let order = world.repos.orders.retrieve(&id, None).await.unwrap();
        assert_eq!(order.status, OrderStatus::Accepted);
        assert_eq!(order.payment.status, PaymentStatus::Pending);
    }

    #[actix_web::test]
    async fn test_cancel_survives_intent_release_failure() {
        let world = world().await;
        let mut payments = MockPaymentProvider::new();
        payments
            .expect_cancel_payment_intent()
            .times(1)
            .returning(|_| Err(AppError::InternalError("stripe unavailable".to_string())));
        let service = orders(&world, payments, MockInvoiceProvider::new());
        let id = awaiting_payment(&world, &service).await;

        let cancelled = service.transition(&ana(), &id, OrderStatus::Cancelled).await.unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        let stored = world.repos.orders.retrieve(&id, None).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
    }

    #[actix_web::test]
    async fn test_other_units_cannot_see_order() {
        let world = world().await;
        let service = orders(&world, MockPaymentProvider::new(), MockInvoiceProvider::new());
        let id = placed(&world, &service).await;
        let other = fixtures::health_unit(&world.repos, "other@lar.pt").await;
        fixtures::member(&world.repos, "stranger", &other, CollaboratorRole::Admin).await;

        let stranger = fixtures::user("stranger", ClientKind::Business);
        assert!(matches!(service.get(&stranger, &id).await, Err(AppError::NotFound(_))));
        assert!(service.get(&boss(), &id).await.is_ok());
    }
}
