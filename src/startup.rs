use crate::app_state::AppState;
use crate::config::Config;
use crate::db;
use crate::handlers_auth;
use crate::handlers_bucket;
use crate::handlers_file;
use crate::ids::SharedIdGenerator;
use crate::storage::LocalStorage;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Opens the database, applies migrations and assembles the shared state.
/// The uploads root is not touched; call [`LocalStorage::init`] before serving.
pub fn init_state(config: Config) -> anyhow::Result<AppState> {
    let db_pool = db::create_pool(&config.database_url)?;

    let mut conn = db_pool.get()?;
    db::run_migrations(&mut conn)?;
    tracing::info!("Database migrations completed");

    let id_gen = SharedIdGenerator::new(config.worker_id, config.datacenter_id)?;
    let storage = LocalStorage::new(config.uploads_dir.clone());

    Ok(AppState::new(db_pool, storage, id_gen, config))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(Any);

    let auth_routes = Router::new()
        .route("/register", post(handlers_auth::register))
        .route("/login", post(handlers_auth::login))
        .route("/logout", post(handlers_auth::logout))
        .route("/logoutall", post(handlers_auth::logout_all));

    let bucket_routes = Router::new()
        .route("/add", post(handlers_bucket::add_bucket))
        .route("/list/:page/:page_size", get(handlers_bucket::list_buckets))
        .route("/:bucket_id", get(handlers_bucket::get_bucket))
        .route("/update/:bucket_id", put(handlers_bucket::update_bucket_name))
        .route("/delete/:bucket_id", delete(handlers_bucket::delete_bucket));

    // `/:id` is a file id on GET and a bucket id under `/:id/files`; the
    // router needs one parameter name per position.
    let file_routes = Router::new()
        .route("/:id/files", post(handlers_file::upload_file))
        .route("/list/:page/:page_size", get(handlers_file::list_files))
        .route("/:id", get(handlers_file::get_file))
        .route("/update/:bucket_id/:file_id", put(handlers_file::update_file))
        .route("/delete/:bucket_id/:file_id", delete(handlers_file::delete_file));

    let body_limit = state.config.max_file_size_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .nest("/auth", auth_routes)
        .nest("/bucket", bucket_routes)
        .nest("/file", file_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
