pub mod app_state;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers_auth;
pub mod handlers_bucket;
pub mod handlers_file;
pub mod ids;
pub mod models;
pub mod schema;
pub mod startup;
pub mod storage;
pub mod validation;

#[cfg(test)]
pub mod test_utils;
