//! Care marketplace HTTP server.
//!
//! Connects to MongoDB, builds the provider adapters from the environment,
//! wires the services and serves the REST API.

use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::http::header;
use actix_web::{error, middleware, web, App, HttpServer};
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};

use care_marketplace_backend::config::{
    CorsConfig, Environment, RateLimitConfig, RepositoryConfig, ServerConfig, StripeConfig,
};
use care_marketplace_backend::core::errors::AppError;
use care_marketplace_backend::db::mongo_store::MongoStore;
use care_marketplace_backend::db::Database;
use care_marketplace_backend::domain::models::auth::ClientRegistry;
use care_marketplace_backend::middlewares::CLIENT_ID_HEADER;
use care_marketplace_backend::repositories::Repositories;
use care_marketplace_backend::routes::configure_all_routes;
use care_marketplace_backend::services::auth::TokenVerifier;
use care_marketplace_backend::services::catalog::CatalogService;
use care_marketplace_backend::services::collaborators::CollaboratorService;
use care_marketplace_backend::services::customers::CustomerService;
use care_marketplace_backend::services::events::EventService;
use care_marketplace_backend::services::health_units::HealthUnitService;
use care_marketplace_backend::services::identity::{CognitoIdentityProvider, IdentityProvider};
use care_marketplace_backend::services::invoicing::{InvoiceProvider, VendusInvoiceProvider};
use care_marketplace_backend::services::mail::{Mailer, SesMailer};
use care_marketplace_backend::services::orders::OrderService;
use care_marketplace_backend::services::patients::PatientService;
use care_marketplace_backend::services::payments::{PaymentProvider, StripePaymentProvider};
use care_marketplace_backend::services::reviews::ReviewService;
use care_marketplace_backend::utils::display_terminal::{
    print_boxed_title, print_final_summary, print_step_complete, print_step_start, print_sub_task,
};

const REPOSITORY_COUNT: usize = 8;

/// Everything handlers receive through `web::Data`.
#[derive(Clone)]
struct AppState {
    verifier: web::Data<TokenVerifier>,
    clients: web::Data<ClientRegistry>,
    payments: web::Data<dyn PaymentProvider>,
    customers: web::Data<CustomerService>,
    health_units: web::Data<HealthUnitService>,
    collaborators: web::Data<CollaboratorService>,
    patients: web::Data<PatientService>,
    catalog: web::Data<CatalogService>,
    orders: web::Data<OrderService>,
    reviews: web::Data<ReviewService>,
    events: web::Data<EventService>,
}

impl AppState {
    const SERVICE_COUNT: usize = 8;
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    error!("{}: {}", context, err);
    io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    load_env_file();
    init_logging();

    print_boxed_title("Care marketplace backend");
    info!("Starting in {:?} mode", Environment::current());

    let repos = initialize_storage().await?;
    let state = initialize_services(repos).await?;

    start_http_server(state).await
}

async fn initialize_storage() -> io::Result<Repositories> {
    print_step_start(1, "Connecting to MongoDB");
    let database = Arc::new(
        Database::new()
            .await
            .map_err(|e| startup_error("MongoDB connection failed", e))?,
    );
    print_sub_task("Database", database.database_name());

    let repos = Repositories::new(
        Arc::new(MongoStore::new(database)),
        RepositoryConfig::deletion_policy(),
        RepositoryConfig::max_page_size(),
    );
    repos
        .ensure_indexes()
        .await
        .map_err(|e| startup_error("Index creation failed", e))?;
    print_step_complete(1, "Collections indexed", REPOSITORY_COUNT);
    Ok(repos)
}

async fn initialize_services(repos: Repositories) -> io::Result<AppState> {
    print_step_start(2, "Building provider adapters");
    let identity: Arc<dyn IdentityProvider> = Arc::new(
        CognitoIdentityProvider::from_env()
            .await
            .map_err(|e| startup_error("Cognito configuration", e))?,
    );
    print_sub_task("Cognito", "ready");
    let payments: Arc<dyn PaymentProvider> =
        Arc::new(StripePaymentProvider::from_env().map_err(|e| startup_error("Stripe configuration", e))?);
    print_sub_task("Stripe", "ready");
    let mailer: Arc<dyn Mailer> = Arc::new(
        SesMailer::from_env()
            .await
            .map_err(|e| startup_error("SES configuration", e))?,
    );
    print_sub_task("SES", "ready");
    let invoicing: Arc<dyn InvoiceProvider> =
        Arc::new(VendusInvoiceProvider::from_env().map_err(|e| startup_error("Vendus configuration", e))?);
    print_sub_task("Vendus", "ready");
    print_step_complete(2, "Provider adapters ready", 4);

    print_step_start(3, "Wiring services");
    let verifier = TokenVerifier::from_env().map_err(|e| startup_error("Cognito token configuration", e))?;
    let clients = ClientRegistry::from_env();
    print_sub_task("Client applications", &clients.len().to_string());

    let state = AppState {
        verifier: web::Data::new(verifier),
        clients: web::Data::new(clients),
        payments: web::Data::from(Arc::clone(&payments)),
        customers: web::Data::new(CustomerService::new(
            repos.clone(),
            Arc::clone(&identity),
            Arc::clone(&payments),
            Arc::clone(&mailer),
        )),
        health_units: web::Data::new(HealthUnitService::new(
            repos.clone(),
            Arc::clone(&identity),
            Arc::clone(&payments),
            Arc::clone(&mailer),
        )),
        collaborators: web::Data::new(CollaboratorService::new(
            repos.clone(),
            Arc::clone(&identity),
            Arc::clone(&mailer),
        )),
        patients: web::Data::new(PatientService::new(repos.clone())),
        catalog: web::Data::new(CatalogService::new(repos.clone())),
        orders: web::Data::new(OrderService::new(
            repos.clone(),
            Arc::clone(&payments),
            invoicing,
            mailer,
            StripeConfig::fee_percent(),
        )),
        reviews: web::Data::new(ReviewService::new(repos.clone())),
        events: web::Data::new(EventService::new(repos)),
    };
    print_step_complete(3, "Services wired", AppState::SERVICE_COUNT);
    Ok(state)
}

async fn start_http_server(state: AppState) -> io::Result<()> {
    let bind_address = format!("{}:{}", ServerConfig::host(), ServerConfig::port());

    let per_second = RateLimitConfig::per_second();
    let burst_size = RateLimitConfig::burst_size();
    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_second(per_second)
        .burst_size(burst_size)
        .use_headers()
        .finish()
        .ok_or_else(|| startup_error("Rate limiting", "per-second and burst values must be non-zero"))?;
    info!("Rate limiting: {} req/s, burst {}", per_second, burst_size);

    let origins = CorsConfig::allowed_origins();
    info!("CORS origins: {:?}", origins);

    print_final_summary(REPOSITORY_COUNT, 4, AppState::SERVICE_COUNT, &bind_address);
    info!("Health check: http://{}/health", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Governor::new(&governor_conf))
            .wrap(configure_cors(&origins))
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(json_config())
            .app_data(query_config())
            .app_data(state.verifier.clone())
            .app_data(state.clients.clone())
            .app_data(state.payments.clone())
            .app_data(state.customers.clone())
            .app_data(state.health_units.clone())
            .app_data(state.collaborators.clone())
            .app_data(state.patients.clone())
            .app_data(state.catalog.clone())
            .app_data(state.orders.clone())
            .app_data(state.reviews.clone())
            .app_data(state.events.clone())
            .configure(configure_all_routes)
    })
    .bind(bind_address)?
    .run()
    .await
}

/// Malformed bodies get the same envelope as validation failures.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(256 * 1024)
        .error_handler(|err, _| error::Error::from(AppError::InvalidParameter(err.to_string())))
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _| error::Error::from(AppError::InvalidParameter(err.to_string())))
}

/// `PROFILE=dev` loads `.env.dev`, `PROFILE=prod` loads `.env.prod`,
/// anything else falls back to `.env`.
fn load_env_file() {
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "dev".to_string());
    let file = match profile.as_str() {
        "prod" => Some(".env.prod"),
        "dev" => Some(".env.dev"),
        _ => None,
    };

    match file {
        Some(file) => {
            if let Err(e) = dotenv::from_filename(file) {
                // logging is not initialised yet
                eprintln!("Failed to load {}: {}", file, e);
            }
        }
        None => {
            dotenv().ok();
        }
    }
}

/// `RUST_LOG` overrides the default filter.
fn init_logging() {
    env_logger::init_from_env(
        Env::default().default_filter_or("info,actix_web=info,care_marketplace_backend=debug"),
    );
}

fn configure_cors(origins: &[String]) -> Cors {
    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::HeaderName::from_static(CLIENT_ID_HEADER),
        ])
        .supports_credentials()
        .max_age(3600)
}
