use interview_core::SessionConfig;
use interview_core::policy::ReportPolicy;
use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub groq_api_key: SecretString,
    pub deepgram_api_key: SecretString,
    /// Without it sessions run text-only.
    pub openai_api_key: Option<SecretString>,
    pub llm_model: String,
    pub fast_llm_model: String,
    pub vision_model: String,
    pub deepgram_model: String,
    pub tts_voice: String,
    pub history_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub session: SessionConfig,
    pub log_level: Level,
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, ConfigError> {
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let secs = parsed(lookup, name, default.as_secs_f64())?;
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// This function will look for a `.env` file in the current directory
    /// and load the following variables:
    ///
    /// *   `BIND_ADDRESS`: Address and port to listen on. Defaults to "0.0.0.0:8000".
    /// *   `GROQ_API_KEY`: Key for the Groq chat and vision models. Required.
    /// *   `DEEPGRAM_API_KEY`: Key for Deepgram transcription. Required.
    /// *   `OPENAI_API_KEY`: (Optional) Key for OpenAI text to speech.
    /// *   `LLM_MODEL`, `FAST_LLM_MODEL`, `VISION_MODEL`, `DEEPGRAM_MODEL`: (Optional) model names.
    /// *   `OPENAI_TTS_VOICE`: (Optional) Defaults to "alloy".
    /// *   `VISION_CHANGE_THRESHOLD`: (Optional) Fraction in `0..=1`. Defaults to 0.10.
    /// *   `VISION_MIN_INTERVAL`, `MIN_QUESTION_INTERVAL`, `SCREEN_RECONNECT_TIMEOUT`:
    ///     (Optional) seconds, fractional values allowed.
    /// *   `REPORT_POLICY`: (Optional) `ask_first`, `always_auto` or `never_auto`.
    /// *   `HISTORY_DIR`, `REPORTS_DIR`: (Optional) storage locations.
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_address = parsed(&lookup, "BIND_ADDRESS", SocketAddr::from(([0, 0, 0, 0], 8000)))?;

        let groq_api_key = SecretString::from(required(&lookup, "GROQ_API_KEY")?);
        let deepgram_api_key = SecretString::from(required(&lookup, "DEEPGRAM_API_KEY")?);
        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::from);

        let text = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());
        let llm_model = text("LLM_MODEL", "llama-3.3-70b-versatile");
        let fast_llm_model = text("FAST_LLM_MODEL", "llama-3.1-8b-instant");
        let vision_model = text("VISION_MODEL", "meta-llama/llama-4-scout-17b-16e-instruct");
        let deepgram_model = text("DEEPGRAM_MODEL", "nova-2");
        let tts_voice = text("OPENAI_TTS_VOICE", "alloy");
        let history_dir = PathBuf::from(text("HISTORY_DIR", "interview_history"));
        let reports_dir = PathBuf::from(text("REPORTS_DIR", "reports"));

        let defaults = SessionConfig::default();
        let vision_change_threshold = parsed(
            &lookup,
            "VISION_CHANGE_THRESHOLD",
            defaults.vision_change_threshold,
        )?;
        if !(0.0..=1.0).contains(&vision_change_threshold) {
            return Err(ConfigError::InvalidValue(
                "VISION_CHANGE_THRESHOLD".to_string(),
                format!("{vision_change_threshold} is outside 0..=1"),
            ));
        }
        let session = SessionConfig {
            vision_change_threshold,
            vision_min_interval: seconds(&lookup, "VISION_MIN_INTERVAL", defaults.vision_min_interval)?,
            min_question_interval: seconds(
                &lookup,
                "MIN_QUESTION_INTERVAL",
                defaults.min_question_interval,
            )?,
            recovery_timeout: seconds(&lookup, "SCREEN_RECONNECT_TIMEOUT", defaults.recovery_timeout)?,
            report_policy: parsed(&lookup, "REPORT_POLICY", ReportPolicy::default())?,
            ..defaults
        };

        let log_level_str = text("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            groq_api_key,
            deepgram_api_key,
            openai_api_key,
            llm_model,
            fast_llm_model,
            vision_model,
            deepgram_model,
            tts_voice,
            history_dir,
            reports_dir,
            session,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    const KEYS: [(&str, &str); 2] = [("GROQ_API_KEY", "gsk"), ("DEEPGRAM_API_KEY", "dg")];

    #[test]
    fn defaults_apply_when_only_keys_are_set() {
        let config = load(&KEYS).unwrap();
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:8000");
        assert_eq!(config.groq_api_key.expose_secret(), "gsk");
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.deepgram_model, "nova-2");
        assert_eq!(config.session.recovery_timeout, Duration::from_secs(30));
        assert_eq!(config.session.report_policy, ReportPolicy::AskFirst);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn missing_required_key_is_reported() {
        let err = load(&[("GROQ_API_KEY", "gsk")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(name) if name == "DEEPGRAM_API_KEY"));
    }

    #[test]
    fn tunables_are_parsed() {
        let mut vars = KEYS.to_vec();
        vars.extend([
            ("SCREEN_RECONNECT_TIMEOUT", "12.5"),
            ("MIN_QUESTION_INTERVAL", "4"),
            ("REPORT_POLICY", "always-auto"),
            ("OPENAI_API_KEY", "sk"),
            ("RUST_LOG", "debug"),
        ]);
        let config = load(&vars).unwrap();
        assert_eq!(config.session.recovery_timeout, Duration::from_millis(12_500));
        assert_eq!(config.session.min_question_interval, Duration::from_secs(4));
        assert_eq!(config.session.report_policy, ReportPolicy::AlwaysAuto);
        assert!(config.openai_api_key.is_some());
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (name, value) in [
            ("BIND_ADDRESS", "nowhere"),
            ("VISION_CHANGE_THRESHOLD", "1.5"),
            ("SCREEN_RECONNECT_TIMEOUT", "-3"),
            ("REPORT_POLICY", "sometimes"),
        ] {
            let mut vars = KEYS.to_vec();
            vars.push((name, value));
            let err = load(&vars).unwrap_err();
            assert!(
                matches!(&err, ConfigError::InvalidValue(var, _) if var == name),
                "{name}: {err}"
            );
        }
    }
}
