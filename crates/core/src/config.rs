use std::path::Path;

use serde::Deserialize;

use crate::types::{QuestionDefinition, TemplateRef};

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "survey-express";

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `SURVEY_EXPRESS__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub survey: SurveyConfig,
    #[serde(default)]
    pub outreach: OutreachConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Run against the in-memory store instead of PostgreSQL.
    #[serde(default)]
    pub in_memory: bool,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Upper bound for a single store operation as seen by the engine.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub phone_number_id: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_verify_token")]
    pub verify_token: String,
    /// When set, inbound webhook bodies must carry a valid
    /// `X-Hub-Signature-256` header.
    #[serde(default)]
    pub app_secret: Option<String>,
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurveyConfig {
    #[serde(default = "default_closing_message")]
    pub closing_message: String,
    #[serde(default = "default_template")]
    pub template: TemplateRef,
    /// Questions 2..N. Question 1 is the template.
    #[serde(default)]
    pub questions: Vec<QuestionDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutreachConfig {
    #[serde(default = "default_messages_per_second")]
    pub messages_per_second: u32,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    3000
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_database_url() -> String {
    "postgres://localhost:5432/survey_express".to_string()
}
fn default_max_connections() -> u32 {
    10
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_statement_timeout_ms() -> u64 {
    3000
}
fn default_api_base_url() -> String {
    "https://graph.facebook.com".to_string()
}
fn default_api_version() -> String {
    "v20.0".to_string()
}
fn default_verify_token() -> String {
    "change-me".to_string()
}
fn default_send_timeout_ms() -> u64 {
    5000
}
fn default_closing_message() -> String {
    "Thank you for completing the survey!".to_string()
}
fn default_template() -> TemplateRef {
    TemplateRef {
        name: "survey_intro".to_string(),
        language: "en_US".to_string(),
    }
}
fn default_messages_per_second() -> u32 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            in_memory: false,
            max_connections: default_max_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
            statement_timeout_ms: default_statement_timeout_ms(),
        }
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_version: default_api_version(),
            phone_number_id: String::new(),
            access_token: String::new(),
            verify_token: default_verify_token(),
            app_secret: None,
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            closing_message: default_closing_message(),
            template: default_template(),
            questions: Vec::new(),
        }
    }
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            messages_per_second: default_messages_per_second(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            database: DatabaseConfig::default(),
            whatsapp: WhatsAppConfig::default(),
            survey: SurveyConfig::default(),
            outreach: OutreachConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file and environment variables.
    ///
    /// An explicit `path` must exist; otherwise `survey-express.toml` in the
    /// working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let builder = config::Config::builder().add_source(file).add_source(
            config::Environment::with_prefix("SURVEY_EXPRESS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
node_id = "node-07"

[api]
http_port = 8081

[whatsapp]
phone_number_id = "1234567890"
verify_token = "hub-secret"

[survey]
closing_message = "Bye!"
template = { name = "feedback_survey2", language = "es_ES" }

[[survey.questions]]
number = 2
prompt = "How often?"
options = [
  { id = "weekly", title = "Once a week" },
  { id = "important", title = "Only important" },
]

[[survey.questions]]
number = 3
prompt = "Anything else?"
"#;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api.http_port, 3000);
        assert_eq!(config.whatsapp.api_version, "v20.0");
        assert!(config.whatsapp.app_secret.is_none());
        assert!(config.survey.questions.is_empty());
        assert!(!config.database.in_memory);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.node_id, "node-07");
        assert_eq!(config.api.http_port, 8081);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.whatsapp.verify_token, "hub-secret");
        assert_eq!(config.survey.template.name, "feedback_survey2");
        assert_eq!(config.survey.closing_message, "Bye!");
        assert_eq!(config.survey.questions.len(), 2);
        assert_eq!(config.survey.questions[0].options.len(), 2);
        assert!(config.survey.questions[1].is_free_text());
    }

    #[test]
    fn test_bundled_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../survey-express.toml");
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.survey.template.name, "feedback_survey2");
        assert_eq!(config.survey.template.language, "es_ES");
        let numbers: Vec<u32> = config.survey.questions.iter().map(|q| q.number).collect();
        assert_eq!(numbers, vec![2, 3, 4, 5, 6, 7]);
        assert_eq!(config.survey.questions[0].options[0].id, "tiempo");
        assert!(config.survey.questions[5].is_free_text());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/survey-express.toml")));
        assert!(result.is_err());
    }
}
