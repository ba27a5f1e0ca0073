use anyhow::{Context, Result, bail};
use axum::http::HeaderValue;
use clap::Parser;
use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};

const DEFAULT_API_BASE_URL: &str = "https://api.ayrshare.com/api";
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments; built once at startup
/// and shared read-only with every component.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the upstream publishing API, without trailing slash.
    pub api_base_url: String,
    /// Bearer credential for every upstream call.
    pub api_key: String,
    /// Directory where uploaded media is spooled while a request is handled.
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub upload_timeout: Duration,
    pub request_timeout: Duration,
    pub cors_origin: HeaderValue,
    pub link: LinkConfig,
}

/// Settings for the account-linking handshake. All optional at startup;
/// the handshake endpoint fails per request when one is missing.
#[derive(Debug, Clone, Default)]
pub struct LinkConfig {
    pub private_key_path: Option<PathBuf>,
    pub domain: Option<String>,
    pub profile_key: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Relay between the post composer UI and the social publishing API")]
pub struct Args {
    /// Host to bind to (overrides POST_RELAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides POST_RELAY_PORT / PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Upstream API base URL (overrides AYRSHARE_API_URL)
    #[arg(long)]
    pub api_base_url: Option<String>,

    /// Directory for temporary media uploads (overrides POST_RELAY_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Maximum request body size in MiB (overrides POST_RELAY_MAX_UPLOAD_MB)
    #[arg(long)]
    pub max_upload_mb: Option<usize>,

    /// Origin allowed by CORS (overrides POST_RELAY_CORS_ORIGIN)
    #[arg(long)]
    pub cors_origin: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_parts(Args::parse(), |key| env::var(key).ok())
    }

    /// Merge parsed CLI args over values produced by `lookup`.
    ///
    /// Empty values returned by `lookup` count as unset.
    pub fn from_parts<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        // --- Environment fallback ---
        let env_host = var("POST_RELAY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = match var("POST_RELAY_PORT").or_else(|| var("PORT")) {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing port value `{}`", value))?,
            None => 3001,
        };
        let env_base_url = var("AYRSHARE_API_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.into());
        let env_upload_dir = var("POST_RELAY_UPLOAD_DIR").unwrap_or_else(|| "./uploads".into());
        let env_max_upload_mb: usize = parse_var(&var, "POST_RELAY_MAX_UPLOAD_MB", 100)?;
        let env_cors = var("POST_RELAY_CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.into());

        let upload_timeout_secs: u64 = parse_var(&var, "POST_RELAY_UPLOAD_TIMEOUT_SECS", 30)?;
        let request_timeout_secs: u64 = parse_var(&var, "POST_RELAY_REQUEST_TIMEOUT_SECS", 15)?;
        if upload_timeout_secs == 0 || request_timeout_secs == 0 {
            bail!("upstream timeouts must be at least one second");
        }

        let Some(api_key) = var("AYRSHARE_API_KEY") else {
            bail!("AYRSHARE_API_KEY must be set");
        };

        let cors_origin = args.cors_origin.unwrap_or(env_cors);
        let cors_origin = HeaderValue::from_str(&cors_origin)
            .with_context(|| format!("parsing CORS origin `{}`", cors_origin))?;

        let api_base_url = args.api_base_url.unwrap_or(env_base_url);

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            api_key,
            upload_dir: PathBuf::from(args.upload_dir.unwrap_or(env_upload_dir)),
            max_upload_bytes: args
                .max_upload_mb
                .unwrap_or(env_max_upload_mb)
                .saturating_mul(1024 * 1024),
            upload_timeout: Duration::from_secs(upload_timeout_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
            cors_origin,
            link: LinkConfig {
                private_key_path: var("AYRSHARE_PRIVATE_KEY_PATH").map(PathBuf::from),
                domain: var("AYRSHARE_DOMAIN"),
                profile_key: var("AYRSHARE_PROFILE_KEY"),
            },
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        None => Ok(default),
    }
}

// The API key stays out of startup logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &"<redacted>")
            .field("upload_dir", &self.upload_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("upload_timeout", &self.upload_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("cors_origin", &self.cors_origin)
            .field("link", &self.link)
            .finish()
    }
}

#[cfg(test)]
pub fn test_config(api_base_url: &str, upload_dir: &std::path::Path) -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        api_base_url: api_base_url.trim_end_matches('/').to_string(),
        api_key: "test-api-key".into(),
        upload_dir: upload_dir.to_path_buf(),
        max_upload_bytes: 10 * 1024 * 1024,
        upload_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(5),
        cors_origin: HeaderValue::from_static(DEFAULT_CORS_ORIGIN),
        link: LinkConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_api_key_is_set() {
        let cfg = AppConfig::from_parts(Args::default(), env_of(&[("AYRSHARE_API_KEY", "k")]))
            .unwrap();

        assert_eq!(cfg.addr(), "0.0.0.0:3001");
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(cfg.upload_dir, PathBuf::from("./uploads"));
        assert_eq!(cfg.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(cfg.upload_timeout, Duration::from_secs(30));
        assert_eq!(cfg.request_timeout, Duration::from_secs(15));
        assert_eq!(cfg.cors_origin, DEFAULT_CORS_ORIGIN);
        assert!(cfg.link.private_key_path.is_none());
    }

    #[test]
    fn args_override_environment() {
        let args = Args {
            host: Some("127.0.0.1".into()),
            port: Some(8080),
            api_base_url: Some("http://localhost:9000/api/".into()),
            ..Args::default()
        };
        let cfg = AppConfig::from_parts(
            args,
            env_of(&[
                ("AYRSHARE_API_KEY", "k"),
                ("POST_RELAY_HOST", "10.0.0.1"),
                ("POST_RELAY_PORT", "4000"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.addr(), "127.0.0.1:8080");
        assert_eq!(cfg.api_base_url, "http://localhost:9000/api");
    }

    #[test]
    fn plain_port_variable_is_a_fallback() {
        let cfg = AppConfig::from_parts(
            Args::default(),
            env_of(&[("AYRSHARE_API_KEY", "k"), ("PORT", "5050")]),
        )
        .unwrap();
        assert_eq!(cfg.port, 5050);
    }

    #[test]
    fn link_settings_are_read_from_environment() {
        let cfg = AppConfig::from_parts(
            Args::default(),
            env_of(&[
                ("AYRSHARE_API_KEY", "k"),
                ("AYRSHARE_PRIVATE_KEY_PATH", "/etc/relay/private.key"),
                ("AYRSHARE_DOMAIN", "acme"),
                ("AYRSHARE_PROFILE_KEY", ""),
            ]),
        )
        .unwrap();

        assert_eq!(
            cfg.link.private_key_path,
            Some(PathBuf::from("/etc/relay/private.key"))
        );
        assert_eq!(cfg.link.domain.as_deref(), Some("acme"));
        assert!(cfg.link.profile_key.is_none());
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = AppConfig::from_parts(Args::default(), env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("AYRSHARE_API_KEY"));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = AppConfig::from_parts(
            Args::default(),
            env_of(&[("AYRSHARE_API_KEY", "k"), ("POST_RELAY_PORT", "http")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("port"));

        let err = AppConfig::from_parts(
            Args::default(),
            env_of(&[
                ("AYRSHARE_API_KEY", "k"),
                ("POST_RELAY_UPLOAD_TIMEOUT_SECS", "0"),
            ]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("timeouts"));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let cfg = AppConfig::from_parts(
            Args::default(),
            env_of(&[("AYRSHARE_API_KEY", "super-secret")]),
        )
        .unwrap();
        let rendered = format!("{:?}", cfg);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
