mod authz;
mod config;
mod db;
mod models;
mod responses;
mod routes;
mod services;
mod state;
mod tenancy;
pub mod utils;
mod worker;

use std::{net::SocketAddr, sync::Arc};

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::http::Method;
use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::Config;
use db::postgres_organization_repository::PostgresOrganizationRepository;
use db::postgres_project_repository::PostgresProjectRepository;
use db::postgres_user_repository::PostgresUserRepository;
use db::{
    organization_repository::OrganizationRepository, project_repository::ProjectRepository,
    user_repository::UserRepository,
};
use responses::JsonResponse;
use routes::auth::{handle_login, handle_me, handle_refresh, handle_reset_password, handle_signup};
use routes::orgs::{handle_invite, handle_my_memberships, handle_switch_org};
use routes::projects::{handle_add_project_member, handle_create_project, handle_list_projects};
use services::mailer::SmtpMailer;
use state::AppState;
use utils::jwt::JwtKeys;
use worker::start_email_worker;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let rate_limit_ms: u64 = std::env::var("RATE_LIMITER_MILLISECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        // Default: 200ms/token (~5 req/sec)
        .unwrap_or(200);
    let rate_limit_burst: u32 = std::env::var("RATE_LIMITER_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(20);
    let global_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(rate_limit_ms)
            .burst_size(rate_limit_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .unwrap(),
    );

    // Background task to cleanup old IPs
    let governor_limiter = global_governor_conf.limiter().clone();
    std::thread::spawn(move || {
        let interval = std::time::Duration::from_secs(60);
        loop {
            std::thread::sleep(interval);
            governor_limiter.retain_recent();
        }
    });

    // Stricter limiter for /api/auth/*
    let rate_limit_auth_s: u64 = std::env::var("RATE_LIMITER_AUTH_SECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(1);
    let rate_limit_auth_burst: u32 = std::env::var("RATE_LIMITER_AUTH_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(10);
    let auth_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(rate_limit_auth_s)
            .burst_size(rate_limit_auth_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .unwrap(),
    );

    let config = Arc::new(Config::from_env());

    let pg_pool = establish_connection(&config.database_url).await;
    let users = Arc::new(PostgresUserRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn UserRepository>;
    let orgs = Arc::new(PostgresOrganizationRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn OrganizationRepository>;
    let projects = Arc::new(PostgresProjectRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn ProjectRepository>;

    let jwt_secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
    let jwt = JwtKeys::from_secret(jwt_secret.as_bytes()).expect("JWT_SECRET rejected");

    let mailer = Arc::new(SmtpMailer::new().expect("Failed to initialize mailer"));
    let email_queue = start_email_worker(mailer);

    let state = AppState {
        users,
        orgs,
        projects,
        email_queue,
        jwt,
        config: config.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origin.parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            axum::http::HeaderName::from_static("x-org"),
        ])
        .allow_credentials(true);

    let auth_routes = Router::new()
        .route("/signup", post(handle_signup))
        .route("/login", post(handle_login))
        .route("/refresh", post(handle_refresh))
        .route("/me", get(handle_me))
        .layer(GovernorLayer {
            config: auth_governor_conf.clone(),
        });

    let project_routes = Router::new()
        .route("/", get(handle_list_projects).post(handle_create_project))
        .route("/{project_id}/members", post(handle_add_project_member));

    let app = Router::new()
        .route("/", get(root))
        .nest("/api/auth", auth_routes)
        .route("/api/me/memberships", get(handle_my_memberships))
        .route("/api/switch-org", post(handle_switch_org))
        .route("/api/organizations/invite", post(handle_invite))
        .route(
            "/api/reset-password/{uid}/{token}",
            post(handle_reset_password),
        )
        .nest("/api/projects", project_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer {
            config: global_governor_conf.clone(),
        })
        .layer(cors);

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));

    let listener = TcpListener::bind(addr).await.unwrap();
    info!("Listening on http://{}", addr);
    axum::serve(listener, make_service).await.unwrap();
}

/// A simple root route.
async fn root() -> Response {
    JsonResponse::success("Hello, TenantX!").into_response()
}

/// Establish a connection to the database and verify it.
async fn establish_connection(database_url: &str) -> PgPool {
    let pool = PgPool::connect(database_url)
        .await
        .expect("Failed to connect to the database");

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .expect("Failed to verify database connection");

    info!("Successfully connected to the database");
    pool
}
