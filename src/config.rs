use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    /// Bearer token required on every request. Empty or absent disables the check.
    pub api_token: Option<String>,
    /// Token for administrative routes. Empty or absent disables those routes entirely.
    pub admin_token: Option<String>,
}

/// Whether the audit insert shares the transaction of the business mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditPolicy {
    /// Mutation and audit entry commit or roll back together.
    #[default]
    Strict,
    /// Mutation commits first; a failed audit insert is logged and reported as a warning.
    BestEffort,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityConfig {
    pub table: String,
    /// Name written to the ledger; defaults to `table`.
    pub audit_name: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditConfig {
    #[serde(default)]
    pub policy: AuditPolicy,
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

const DEFAULTS: &str = include_str!("../config/default.toml");

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

impl SecurityConfig {
    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref().filter(|t| !t.is_empty())
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: bitacora.toml (in CWD)
        .add_source(::config::File::with_name("bitacora").required(false));

    if let Ok(custom_path) = std::env::var("BITACORA_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("BITACORA").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

/// Loads the embedded defaults overlaid with a single TOML file, without touching the environment.
pub fn load_from_file(path: &Path) -> anyhow::Result<AppConfig> {
    let cfg = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        .add_source(::config::File::from(path).format(::config::FileFormat::Toml))
        .build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    if cfg.database.max_connections == 0 || cfg.database.max_connections > 256 {
        return Err(anyhow::anyhow!("database.max_connections must be in 1..=256"));
    }

    let mut seen = HashSet::new();
    for entity in &cfg.audit.entities {
        if entity.table.trim().is_empty() {
            return Err(anyhow::anyhow!("audit.entities: table name must not be empty"));
        }
        if !seen.insert(entity.table.as_str()) {
            return Err(anyhow::anyhow!("audit.entities: table {} registered twice", entity.table));
        }
        if matches!(&entity.audit_name, Some(name) if name.trim().is_empty()) {
            return Err(anyhow::anyhow!("audit.entities: audit_name of {} must not be empty", entity.table));
        }
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        let path = path.split('?').next().unwrap_or(path);
        if path.is_empty() || path == ":memory:" {
            return Ok(());
        }
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}
