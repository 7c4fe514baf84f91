// Shared setup for the router-level tests.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use s3_clone::{app_state::AppState, config::Config, startup};
use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;
use tower::ServiceExt;

pub const MAX_FILE_SIZE: usize = 1024;
const BOUNDARY: &str = "----S3CloneTestBoundary";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = Config {
            database_url: dir.path().join("api.sqlite").to_string_lossy().into_owned(),
            host: "127.0.0.1".to_string(),
            port: 0,
            uploads_dir: dir.path().join("uploads"),
            secret_key: "integration-secret".to_string(),
            token_ttl_secs: 3600,
            max_file_size_bytes: MAX_FILE_SIZE,
            allowed_mime_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "application/pdf".to_string(),
            ],
            worker_id: 2,
            datacenter_id: 3,
        };
        std::fs::create_dir_all(&config.uploads_dir).unwrap();

        let state = startup::init_state(config).unwrap();
        let router = startup::build_router(state.clone());

        Self { router, state, dir }
    }

    pub fn uploads(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Sends a request with an optional JSON body and decodes the JSON reply.
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.send(request).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn register(&self, email: &str) -> String {
        let (status, body) = self
            .json(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({
                    "fullName": "Test User",
                    "email": email,
                    "password": "hunter22",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn create_bucket(&self, token: &str, name: &str) -> String {
        let (status, body) = self
            .json(
                Method::POST,
                "/bucket/add",
                Some(token),
                Some(json!({ "bucketName": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn multipart(
        &self,
        method: Method,
        uri: &str,
        token: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, multipart_content_type())
            .body(Body::from(multipart_body(filename, content_type, data)))
            .unwrap();

        let response = self.send(request).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn upload(
        &self,
        token: &str,
        bucket_id: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> (StatusCode, Value) {
        self.multipart(
            Method::POST,
            &format!("/file/{}/files", bucket_id),
            token,
            filename,
            content_type,
            data,
        )
        .await
    }

    /// Uploads and returns the new file id, asserting success.
    pub async fn upload_ok(&self, token: &str, bucket_id: &str, filename: &str) -> String {
        let (status, body) = self
            .upload(token, bucket_id, filename, "image/png", b"png-bytes")
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn download(&self, token: &str, file_id: &str) -> Response {
        let request = Request::builder()
            .method(Method::GET)
            .uri(format!("/file/{}", file_id))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

/// Opening boundary and part headers of a `file` part, up to its first byte.
pub fn multipart_head(filename: &str, content_type: &str) -> Vec<u8> {
    format!(
        "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
        BOUNDARY, filename, content_type
    )
    .into_bytes()
}

pub fn multipart_body(filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = multipart_head(filename, content_type);
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = body_bytes(response).await;
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}
