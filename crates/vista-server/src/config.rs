use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use jsonwebtoken::Algorithm;

use vista_ai::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me", "secret"];

/// Which Gemini deployment serves the two strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiBackend {
    /// Separate vision and language models.
    Split,
    /// One multimodal model for both roles (uses the LLM model name).
    Unified,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub base_url: String,
    pub vlm_model: String,
    pub llm_model: String,
    pub backend: GeminiBackend,
}

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub project_name: String,
    /// Normalised: empty, or a leading slash and no trailing slash.
    pub api_prefix: String,
    pub database_path: PathBuf,
    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
    pub token_ttl: chrono::Duration,
    pub gemini: GeminiSettings,
    pub image_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = get("VISTA_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("VISTA_JWT_SECRET is unset or still a placeholder");
        }

        let jwt_algorithm = parse_algorithm(&get_or("VISTA_JWT_ALGORITHM", "HS256"))?;

        let expire_minutes: i64 = get_or("ACCESS_TOKEN_EXPIRE_MINUTES", "30")
            .parse()
            .context("ACCESS_TOKEN_EXPIRE_MINUTES must be an integer")?;
        if expire_minutes <= 0 {
            bail!("ACCESS_TOKEN_EXPIRE_MINUTES must be positive");
        }

        let api_key = get("GEMINI_API_KEY").context("GEMINI_API_KEY is not set")?;

        let backend = match get_or("GEMINI_BACKEND", "split").to_ascii_lowercase().as_str() {
            "split" => GeminiBackend::Split,
            "unified" => GeminiBackend::Unified,
            other => bail!("GEMINI_BACKEND must be 'split' or 'unified', got '{}'", other),
        };

        let port: u16 = get_or("VISTA_PORT", "8000")
            .parse()
            .context("VISTA_PORT must be a port number")?;

        let max_upload_mb: usize = get_or("VISTA_MAX_UPLOAD_MB", "25")
            .parse()
            .context("VISTA_MAX_UPLOAD_MB must be an integer")?;

        Ok(Self {
            project_name: get_or("VISTA_PROJECT_NAME", "Vista"),
            api_prefix: normalize_prefix(&get_or("VISTA_API_PREFIX", "/api/v1")),
            database_path: database_path(&get_or("DATABASE_URL", "vista.db")),
            jwt_secret,
            jwt_algorithm,
            token_ttl: chrono::Duration::minutes(expire_minutes),
            gemini: GeminiSettings {
                api_key,
                base_url: get_or("GEMINI_BASE_URL", DEFAULT_BASE_URL),
                vlm_model: get_or("GEMINI_VLM_MODEL", DEFAULT_MODEL),
                llm_model: get_or("GEMINI_LLM_MODEL", DEFAULT_MODEL),
                backend,
            },
            image_dir: get_or("VISTA_IMAGE_DIR", "static/images").into(),
            host: get_or("VISTA_HOST", "0.0.0.0"),
            port,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        })
    }
}

/// Only HMAC algorithms work with a shared secret.
fn parse_algorithm(raw: &str) -> Result<Algorithm> {
    let algorithm = Algorithm::from_str(&raw.to_ascii_uppercase())
        .map_err(|_| anyhow::anyhow!("Unknown JWT algorithm '{}'", raw))?;
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => bail!("JWT algorithm {:?} needs a key pair; use HS256, HS384 or HS512", other),
    }
}

/// Accepts a bare path or a `sqlite:` URL.
fn database_path(url: &str) -> PathBuf {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(path)
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
