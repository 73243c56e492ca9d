//! Process configuration loaded once from environment variables, layered
//! over hard-coded defaults. Nothing in this core mutates a `DexConfig`
//! after construction; downstream components receive a cloned handle.

use dex_risk::ConfirmationMode;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub provider: String,
    pub model_name: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub planning_depth: u32,
    pub verification_enabled: bool,
    pub self_correction_attempts: u32,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub from: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub smtp: Option<SmtpConfig>,
    pub whatsapp: Option<TwilioConfig>,
    pub user_whatsapp_number: Option<String>,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub disable_semantic_memory: bool,
}

/// The single immutable configuration struct for the whole process.
#[derive(Debug, Clone)]
pub struct DexConfig {
    pub data_dir: std::path::PathBuf,
    pub time_zone: String,
    pub log_level: String,
    pub risk_mode: ConfirmationMode,
    pub reminder_check_interval: Duration,
    pub http_host: String,
    pub http_port: u16,
    pub planner: PlannerConfig,
    pub pipeline: PipelineConfig,
    pub notify: NotifyConfig,
    pub memory: MemoryConfig,
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parses a numeric env var, falling back to `default` on absence *or* a
/// malformed value — external misconfiguration must never crash startup.
fn env_num<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).as_deref() {
        Ok(v) => v == "1" || v.eq_ignore_ascii_case("true"),
        Err(_) => default,
    }
}

impl DexConfig {
    /// Build the configuration once at process start. Never fails:
    /// unrecognized or malformed environment values fall back to defaults.
    pub fn from_env() -> Self {
        let data_dir = env_opt("DEX_DATA_DIR")
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|| std::path::PathBuf::from("./.agentic_os"));

        let risk_mode = match std::env::var("DEX_RISK_MODE").as_deref() {
            Ok("strict") => ConfirmationMode::Strict,
            Ok("permissive") => ConfirmationMode::Permissive,
            _ => ConfirmationMode::Balanced,
        };

        Self {
            data_dir,
            time_zone: env_str("DEX_TIME_ZONE", "UTC"),
            log_level: env_str("DEX_LOG_LEVEL", "info"),
            risk_mode,
            reminder_check_interval: Duration::from_secs(env_num("DEX_REMINDER_CHECK_INTERVAL", 60)),
            http_host: env_str("DEX_HTTP_HOST", "127.0.0.1"),
            http_port: env_num("DEX_HTTP_PORT", 8787u16),
            planner: PlannerConfig {
                provider: env_str("LLM_PROVIDER", "rule_based"),
                model_name: env_str("LLM_MODEL_NAME", "gemini-1.5-flash"),
                api_key: env_opt("LLM_API_KEY"),
                base_url: env_opt("LLM_BASE_URL"),
                temperature: env_num("LLM_TEMPERATURE", 0.2f32),
                max_tokens: env_num("LLM_MAX_TOKENS", 1024u32),
                timeout: Duration::from_secs(env_num("LLM_TIMEOUT", 30)),
            },
            pipeline: PipelineConfig {
                planning_depth: env_num("AGENT_PLANNING_DEPTH", 1u32),
                verification_enabled: env_bool("AGENT_VERIFICATION_ENABLED", true),
                self_correction_attempts: env_num("AGENT_SELF_CORRECTION_ATTEMPTS", 3u32),
                request_timeout: Duration::from_secs(env_num("AGENT_REQUEST_TIMEOUT", 30)),
            },
            notify: NotifyConfig {
                smtp: smtp_from_env(),
                whatsapp: twilio_from_env(),
                user_whatsapp_number: env_opt("NOTIFY_USER_WHATSAPP_NUMBER"),
                webhook_url: env_opt("NOTIFY_WEBHOOK_URL"),
            },
            memory: MemoryConfig {
                disable_semantic_memory: env_bool("DISABLE_SEMANTIC_MEMORY", false),
            },
        }
    }
}

fn smtp_from_env() -> Option<SmtpConfig> {
    let server = env_opt("NOTIFY_SMTP_SERVER")?;
    let from = env_opt("NOTIFY_EMAIL_FROM")?;
    let password = env_opt("NOTIFY_SMTP_PASSWORD").unwrap_or_default();
    let port = env_num("NOTIFY_SMTP_PORT", 587u16);
    Some(SmtpConfig { server, port, from, password })
}

fn twilio_from_env() -> Option<TwilioConfig> {
    let account_sid = env_opt("NOTIFY_TWILIO_ACCOUNT_SID")?;
    let auth_token = env_opt("NOTIFY_TWILIO_AUTH_TOKEN")?;
    let from_number = env_opt("NOTIFY_TWILIO_FROM_NUMBER")?;
    Some(TwilioConfig { account_sid, auth_token, from_number })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_absent() {
        std::env::remove_var("DEX_HTTP_PORT");
        let config = DexConfig::from_env();
        assert_eq!(config.http_port, 8787);
        assert_eq!(config.risk_mode, ConfirmationMode::Balanced);
    }

    #[test]
    fn malformed_numeric_env_falls_back_to_default() {
        std::env::set_var("DEX_HTTP_PORT", "not-a-number");
        let config = DexConfig::from_env();
        assert_eq!(config.http_port, 8787);
        std::env::remove_var("DEX_HTTP_PORT");
    }

    #[test]
    fn smtp_requires_server_and_from() {
        std::env::remove_var("NOTIFY_SMTP_SERVER");
        std::env::remove_var("NOTIFY_EMAIL_FROM");
        let config = DexConfig::from_env();
        assert!(config.notify.smtp.is_none());
    }
}
