use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub uploads_dir: PathBuf,
    pub secret_key: String,
    pub token_ttl_secs: i64,
    pub max_file_size_bytes: usize,
    pub allowed_mime_types: Vec<String>,
    pub worker_id: u64,
    pub datacenter_id: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let secret_key =
            env::var("SECRET_KEY").map_err(|_| "SECRET_KEY must be set".to_string())?;
        if secret_key.trim().is_empty() {
            return Err("SECRET_KEY must not be empty".to_string());
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "s3_clone.sqlite".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", "6000", "a valid u16")?,
            uploads_dir: PathBuf::from(
                env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string()),
            ),
            secret_key,
            token_ttl_secs: parse_var("TOKEN_TTL_SECS", "3600", "a valid i64")?,
            max_file_size_bytes: parse_var("MAX_FILE_SIZE_BYTES", "10485760", "a valid usize")?,
            allowed_mime_types: parse_list(
                &env::var("ALLOWED_MIME_TYPES")
                    .unwrap_or_else(|_| "image/jpeg,image/png,application/pdf".to_string()),
            ),
            worker_id: parse_var("WORKER_ID", "1", "a valid u64")?,
            datacenter_id: parse_var("DATACENTER_ID", "1", "a valid u64")?,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_allowed_mime_type(&self, mime: &str) -> bool {
        self.allowed_mime_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str, expected: &str) -> Result<T, String> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| format!("{} must be {}", name, expected))
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
