//! Input checks applied before anything reaches the database or the disk.
//!
//! Bucket names and filenames become path components under the uploads root,
//! so they are restricted to a conservative character set and may never be a
//! relative path segment.

use std::sync::LazyLock;

use regex::Regex;

static BUCKET_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid bucket name regex"));

static FILE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._ -]+$").expect("valid file name regex"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

const MAX_NAME_LEN: usize = 255;

pub const BUCKET_NAME_RULES: &str =
    "Invalid bucket name. Only alphanumeric characters, dashes, underscores, and dots are allowed.";

pub const FILE_NAME_RULES: &str =
    "Invalid file name. Avoid path separators and special characters.";

fn is_relative_segment(name: &str) -> bool {
    name == "." || name == ".."
}

pub fn is_safe_bucket_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LEN && !is_relative_segment(name) && BUCKET_NAME_RE.is_match(name)
}

pub fn is_safe_file_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LEN
        && !is_relative_segment(name)
        && name.trim() == name
        && FILE_NAME_RE.is_match(name)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
