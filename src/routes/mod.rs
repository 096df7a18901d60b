//! # Routes
//!
//! Everything lives under `/api/v1`. Each scope names the client apps it
//! accepts through [`AuthMiddleware`]; public endpoints are registered
//! without it. More specific scopes are registered first because actix
//! stops at the first scope whose prefix matches.
//!
//! | Scope | Clients |
//! |---|---|
//! | `/customers` | sign-up public, `/me` marketplace |
//! | `/health-units` | onboarding and reads public, `/me` business |
//! | `/collaborators` | business |
//! | `/patients` | marketplace |
//! | `/services` | reads public, writes admin |
//! | `/orders` | marketplace, business, admin |
//! | `/reviews` | listing public, submit marketplace |
//! | `/events` | business |
//! | `/webhooks/stripe` | Stripe signature |

use actix_web::{get, web, HttpResponse};
use serde_json::json;

use crate::domain::models::auth::ClientKind;
use crate::handlers;
use crate::middlewares::AuthMiddleware;

pub const API_PREFIX: &str = "/api/v1";

pub fn configure_all_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check);
    cfg.service(
        web::scope(API_PREFIX)
            .service(health_check)
            .configure(configure_customer_routes)
            .configure(configure_health_unit_routes)
            .configure(configure_collaborator_routes)
            .configure(configure_patient_routes)
            .configure(configure_catalog_routes)
            .configure(configure_order_routes)
            .configure(configure_review_routes)
            .configure(configure_event_routes)
            .configure(configure_webhook_routes),
    );
}

fn configure_customer_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/customers/me")
            .wrap(AuthMiddleware::marketplace())
            .service(handlers::customers::me)
            .service(handlers::customers::update_me),
    );
    cfg.service(web::scope("/customers").service(handlers::customers::sign_up));
}

fn configure_health_unit_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/health-units/me")
            .wrap(AuthMiddleware::business())
            .service(handlers::health_units::mine)
            .service(handlers::health_units::update_mine)
            .service(handlers::health_units::onboarding_link),
    );
    cfg.service(
        web::scope("/health-units")
            .service(handlers::health_units::onboard)
            .service(handlers::health_units::list)
            .service(handlers::health_units::get),
    );
}

fn configure_collaborator_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/collaborators")
            .wrap(AuthMiddleware::business())
            .service(handlers::collaborators::list)
            .service(handlers::collaborators::add)
            .service(handlers::collaborators::me)
            .service(handlers::collaborators::get)
            .service(handlers::collaborators::update)
            .service(handlers::collaborators::remove),
    );
}

fn configure_patient_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/patients")
            .wrap(AuthMiddleware::marketplace())
            .service(handlers::patients::list)
            .service(handlers::patients::create)
            .service(handlers::patients::get)
            .service(handlers::patients::update)
            .service(handlers::patients::delete),
    );
}

/// Reads are public; the nested scope only sees what the GET
/// resources did not match.
fn configure_catalog_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/services")
            .service(handlers::catalog::list)
            .service(handlers::catalog::get)
            .service(
                web::scope("")
                    .wrap(AuthMiddleware::admin())
                    .service(handlers::catalog::create)
                    .service(handlers::catalog::update)
                    .service(handlers::catalog::delete),
            ),
    );
}

fn configure_order_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .wrap(AuthMiddleware::for_clients(&[
                ClientKind::Marketplace,
                ClientKind::Business,
                ClientKind::Admin,
            ]))
            .service(handlers::orders::place)
            .service(handlers::orders::list)
            .service(handlers::orders::get)
            .service(handlers::orders::accept)
            .service(handlers::orders::reject)
            .service(handlers::orders::complete)
            .service(handlers::orders::cancel)
            .service(handlers::orders::checkout),
    );
}

fn configure_review_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reviews")
            .service(handlers::reviews::list)
            .service(
                web::scope("")
                    .wrap(AuthMiddleware::marketplace())
                    .service(handlers::reviews::submit),
            ),
    );
}

fn configure_event_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/events")
            .wrap(AuthMiddleware::business())
            .service(handlers::events::list)
            .service(handlers::events::create)
            .service(handlers::events::get)
            .service(handlers::events::update)
            .service(handlers::events::delete),
    );
}

fn configure_webhook_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhooks").service(handlers::webhooks::stripe));
}

#[get("/health")]
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "statusCode": 200,
        "data": {
            "status": "healthy",
            "service": "care_marketplace_backend",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }
    }))
}
