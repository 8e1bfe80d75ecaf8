mod auth;
mod config;
mod cron_tasks;
mod database;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod service;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use cron_tasks::{SweepResult, sweep_expired_sessions};

use crate::database::postgres_repository::PostgresRepository;
use crate::db::stage_db;
use crate::error::app_error::AppError;
use crate::middleware::RequestLogger;
use crate::routes as app_routes;
use crate::service::auth::AuthService;
use crate::service::clock::SystemClock;
use crate::service::identity::TokenInfoVerifier;
use crate::service::session::{SessionManager, SessionPolicy};
use crate::service::tasks::TokioTaskRunner;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};
use rocket_okapi::{get_openapi_route, okapi::merge::marge_spec_list};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Later calls are no-ops.
pub fn init_tracing(log_level: &str, json_format: bool) {
    // RUST_LOG overrides the configured level, e.g. RUST_LOG=info,session_gate::service=debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true);

    // a subscriber may already be installed when the rocket is rebuilt in-process
    let _ = if json_format { subscriber.json().try_init() } else { subscriber.try_init() };
}

fn ensure_rocket_secret_key() {
    let profile = std::env::var("ROCKET_PROFILE").unwrap_or_else(|_| "debug".to_string());

    // Session cookies are encrypted with this key; a generated one would log everyone out on restart.
    if profile != "debug" && std::env::var("ROCKET_SECRET_KEY").is_err() {
        panic!(
            "ROCKET_SECRET_KEY is required for profile '{}'. Generate one with: openssl rand -base64 32",
            profile
        );
    }
}

fn get_swagger_config(openapi_url: &str) -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: openapi_url.to_string(),
        ..Default::default()
    }
}

fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return config::DEFAULT_API_BASE_PATH.to_string();
    }

    let mut normalized = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };

    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }

    normalized
}

fn join_base_path(base_path: &str, path: &str) -> String {
    let base = base_path.trim_end_matches('/');
    let suffix = path.trim_start_matches('/');

    if base.is_empty() {
        format!("/{}", suffix)
    } else {
        format!("{}/{}", base, suffix)
    }
}

struct RouteSpec {
    path: &'static str,
    routes: Vec<rocket::Route>,
    openapi: rocket_okapi::okapi::openapi3::OpenApi,
}

fn collect_route_specs() -> Vec<RouteSpec> {
    let (auth_routes, auth_openapi) = app_routes::auth::routes();
    let (health_routes, health_openapi) = app_routes::health::routes();

    vec![
        RouteSpec {
            path: "",
            routes: auth_routes,
            openapi: auth_openapi,
        },
        RouteSpec {
            path: "/health",
            routes: health_routes,
            openapi: health_openapi,
        },
    ]
}

fn mount_api_routes(mut rocket: Rocket<Build>, base_path: &str, enable_swagger: bool) -> Rocket<Build> {
    let route_specs = collect_route_specs();
    let mut openapi_list = Vec::new();

    for spec in route_specs {
        let mount_point = if spec.path.is_empty() {
            base_path.to_string()
        } else {
            join_base_path(base_path, spec.path)
        };
        rocket = rocket.mount(mount_point, spec.routes);
        openapi_list.push((spec.path, spec.openapi));
    }

    if !enable_swagger {
        return rocket;
    }

    let openapi_docs = match marge_spec_list(&openapi_list) {
        Ok(docs) => docs,
        Err(err) => {
            error!(error = %err, "could not merge OpenAPI documents, docs disabled");
            return rocket;
        }
    };

    let settings = rocket_okapi::settings::OpenApiSettings::default();
    rocket = rocket.mount(base_path, vec![get_openapi_route(openapi_docs, &settings)]);

    let docs_path = join_base_path(base_path, "docs");
    let openapi_url = join_base_path(base_path, "openapi.json");
    rocket.mount(docs_path, make_swagger_ui(&get_swagger_config(&openapi_url)))
}

/// Wire the production services over a ready pool.
pub fn build_auth_service(config: &Config, pool: PgPool) -> Result<AuthService, AppError> {
    let verifier = TokenInfoVerifier::new(&config.identity)?;
    let repo = Arc::new(PostgresRepository { pool });
    let tasks = TokioTaskRunner::new(Duration::from_secs(config.session.background_task_timeout_secs.max(1)));
    let sessions = SessionManager::new(repo.clone(), Arc::new(SystemClock), Arc::new(tasks), SessionPolicy::from(&config.session));

    Ok(AuthService::new(Arc::new(verifier), repo, sessions))
}

fn stage_services(config: Config) -> AdHoc {
    AdHoc::try_on_ignite("Auth services", |rocket| async move {
        let Some(pool) = rocket.state::<PgPool>().cloned() else {
            error!("database pool missing, auth services not started");
            return Err(rocket);
        };

        match build_auth_service(&config, pool) {
            Ok(auth) => {
                info!(ttl_days = config.session.ttl().num_days(), "auth services initialized");
                Ok(rocket.manage(auth))
            }
            Err(e) => {
                error!(error = ?e, "failed to initialize auth services");
                Err(rocket)
            }
        }
    })
}

fn assemble(rocket: Rocket<Build>, config: Config) -> Rocket<Build> {
    let base_path = normalize_base_path(&config.api.base_path);
    let enable_swagger = config.api.enable_swagger;

    let rocket = rocket.attach(RequestLogger).manage(config);
    mount_api_routes(rocket, &base_path, enable_swagger).register(base_path.as_str(), app_routes::error::catchers())
}

pub fn build_rocket(config: Config) -> Rocket<Build> {
    init_tracing(&config.logging.level, config.logging.json_format);
    ensure_rocket_secret_key();

    let figment = rocket::Config::figment()
        .merge(("port", config.server.port))
        .merge(("address", config.server.address.clone()));

    let rocket = rocket::custom(figment)
        .attach(stage_db(config.database.clone()))
        .attach(stage_services(config.clone()));

    assemble(rocket, config)
}

/// Same surface as [`build_rocket`] around an already constructed [`AuthService`].
pub fn build_rocket_with_services(config: Config, auth: AuthService) -> Rocket<Build> {
    assemble(rocket::build(), config).manage(auth)
}
