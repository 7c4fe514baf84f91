use crate::app_state::AppState;
use crate::auth::hash_password_blocking;
use crate::config::Config;
use crate::models::{NewUser, User};
use crate::schema::users;
use crate::startup::init_state;
use diesel::prelude::*;
use std::path::Path;
use tempfile::TempDir;

pub fn create_test_config(dir: &Path) -> Config {
    Config {
        database_url: dir.join("test.sqlite").to_string_lossy().into_owned(),
        host: "127.0.0.1".to_string(),
        port: 0,
        uploads_dir: dir.join("uploads"),
        secret_key: "test-secret".to_string(),
        token_ttl_secs: 3600,
        max_file_size_bytes: 1024,
        allowed_mime_types: vec![
            "image/png".to_string(),
            "image/jpeg".to_string(),
            "application/pdf".to_string(),
        ],
        worker_id: 1,
        datacenter_id: 1,
    }
}

/// Fresh state backed by its own database file and uploads root. Keep the
/// returned directory alive for as long as the state is used.
pub fn create_test_app_state() -> (AppState, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(dir.path());
    std::fs::create_dir_all(&config.uploads_dir).expect("Failed to create uploads dir");
    let state = init_state(config).expect("Failed to initialise test state");
    (state, dir)
}

pub fn insert_test_user(state: &AppState, email: &str) -> User {
    let mut conn = state.db_pool.get().expect("Failed to get connection");
    let (oid, id) = state.id_gen.next_pair("user").unwrap();

    diesel::insert_into(users::table)
        .values(NewUser {
            oid,
            id,
            full_name: "Test User".to_string(),
            email: email.to_string(),
            password_hash: hash_password_blocking("password").unwrap(),
        })
        .get_result(&mut conn)
        .expect("Failed to insert test user")
}
