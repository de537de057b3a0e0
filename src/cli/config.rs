use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dom::fields::{DEFAULT_INPUT_TYPES, FieldPolicy, IdentifyBy};
use crate::dom::truncate::{DEFAULT_TOKEN_BUDGET, DEFAULT_TRUNCATE_THRESHOLD};
use crate::recording::compiler::{CompilerPolicy, DEFAULT_BASE_URL, DEFAULT_PAUSE_THRESHOLD_MS};
use crate::suggest::ai_model::{DEFAULT_API_KEY_ENV, DEFAULT_NUM_CTX, DEFAULT_TIMEOUT_SECS};
use crate::suggest::analyzer::EngineSettings;
use crate::testcase::generator::DEFAULT_TEST_CASE_COUNT;

pub const DEFAULT_CONFIG_FILE: &str = "recorder-companion.yaml";

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "recorder-companion",
    version,
    about = "Local companion server for a browser test-recording extension"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: recorder-companion.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Ollama chat endpoint
    #[arg(long, global = true)]
    pub ollama_endpoint: Option<String>,

    /// Model name
    #[arg(long, global = true)]
    pub model: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server the extension talks to
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(long)]
        port: Option<u16>,

        /// Directory that receives one run_* folder per server start
        #[arg(long)]
        snapshot_dir: Option<String>,
    },

    /// Compile a recorded_events.json file into a test script
    Compile {
        /// Events file (bare array or {"events": [...]})
        #[arg(long)]
        events: String,

        /// Output format: html, json
        #[arg(long, default_value = "html")]
        format: String,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// List the input fields found in a captured page
    Fields {
        /// Captured HTML file
        #[arg(long)]
        html: String,
    },

    /// Ask the model for field values for a captured page
    Suggest {
        /// Captured HTML file
        #[arg(long)]
        html: String,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Combine recorded events with confirmed values into test cases
    Cases {
        /// Events file
        #[arg(long)]
        events: String,

        /// suggestion_book.json to take accepted values from
        #[arg(long)]
        book: Option<String>,

        /// Maximum number of test cases
        #[arg(long)]
        count: Option<usize>,

        /// Output directory for test_cases.csv and test_case_<n>.html
        /// (default: print CSV to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `recorder-companion.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub fields: FieldsConfig,
    #[serde(default)]
    pub compiler: CompilerConfig,
    #[serde(default)]
    pub cases: CasesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,

    /// Largest accepted request body, in megabytes.
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            snapshot_dir: default_snapshot_dir(),
            body_limit_mb: default_body_limit_mb(),
        }
    }
}

impl ServerConfig {
    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb.saturating_mul(1024 * 1024)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelProvider {
    Ollama,
    Openai,
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: ModelProvider,

    pub endpoint: Option<String>,

    pub model: Option<String>,

    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Environment variable holding the key for the `openai` provider.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Canned reply of the `mock` provider.
    #[serde(default)]
    pub mock_response: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: None,
            model: None,
            num_ctx: default_num_ctx(),
            timeout_secs: default_timeout_secs(),
            api_key_env: default_api_key_env(),
            mock_response: String::new(),
        }
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    #[serde(default = "default_truncate_threshold")]
    pub truncate_threshold: usize,

    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            truncate_threshold: default_truncate_threshold(),
            max_parallel: default_max_parallel(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldsConfig {
    #[serde(default = "default_input_types")]
    pub input_types: Vec<String>,

    #[serde(default = "default_identify_by")]
    pub identify_by: IdentifyBy,

    #[serde(default = "default_true")]
    pub include_textarea: bool,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            input_types: default_input_types(),
            identify_by: default_identify_by(),
            include_textarea: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    #[serde(default = "default_pause_threshold_ms")]
    pub pause_threshold_ms: i64,

    #[serde(default = "default_base_url")]
    pub default_base_url: String,

    /// Tooling event kinds in addition to the built-in ones.
    #[serde(default)]
    pub extra_tooling_kinds: Vec<String>,

    /// Tooling element-id prefixes in addition to the built-in ones.
    #[serde(default)]
    pub extra_tooling_id_prefixes: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            pause_threshold_ms: default_pause_threshold_ms(),
            default_base_url: default_base_url(),
            extra_tooling_kinds: Vec::new(),
            extra_tooling_id_prefixes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasesConfig {
    #[serde(default = "default_case_count")]
    pub count: usize,

    #[serde(default = "default_examples_per_field")]
    pub examples_per_field: usize,
}

impl Default for CasesConfig {
    fn default() -> Self {
        Self {
            count: default_case_count(),
            examples_per_field: default_examples_per_field(),
        }
    }
}

// Serde default helpers
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 5000 }
fn default_snapshot_dir() -> String { "snapshots".to_string() }
fn default_body_limit_mb() -> usize { 64 }
fn default_provider() -> ModelProvider { ModelProvider::Ollama }
fn default_num_ctx() -> u32 { DEFAULT_NUM_CTX }
fn default_timeout_secs() -> u64 { DEFAULT_TIMEOUT_SECS }
fn default_api_key_env() -> String { DEFAULT_API_KEY_ENV.to_string() }
fn default_token_budget() -> usize { DEFAULT_TOKEN_BUDGET }
fn default_truncate_threshold() -> usize { DEFAULT_TRUNCATE_THRESHOLD }
fn default_max_parallel() -> usize { 4 }
fn default_input_types() -> Vec<String> { DEFAULT_INPUT_TYPES.iter().map(|s| s.to_string()).collect() }
fn default_identify_by() -> IdentifyBy { IdentifyBy::IdOrName }
fn default_true() -> bool { true }
fn default_pause_threshold_ms() -> i64 { DEFAULT_PAUSE_THRESHOLD_MS }
fn default_base_url() -> String { DEFAULT_BASE_URL.to_string() }
fn default_case_count() -> usize { DEFAULT_TEST_CASE_COUNT }
fn default_examples_per_field() -> usize { 5 }

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or(DEFAULT_CONFIG_FILE);
    match std::fs::read_to_string(config_path) {
        Ok(content) => match serde_yaml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = config_path, error = %e, "malformed config file, using defaults");
                AppConfig::default()
            }
        },
        Err(_) => AppConfig::default(),
    }
}

// ============================================================================
// Config Builders (merge config file into component policies)
// ============================================================================

impl AppConfig {
    pub fn field_policy(&self) -> FieldPolicy {
        FieldPolicy {
            input_types: self.fields.input_types.iter().map(|t| t.to_ascii_lowercase()).collect(),
            identify_by: self.fields.identify_by,
            include_textarea: self.fields.include_textarea,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            token_budget: self.budget.token_budget,
            truncate_threshold: self.budget.truncate_threshold,
            max_parallel: self.budget.max_parallel.max(1),
            field_policy: self.field_policy(),
            examples_per_field: self.cases.examples_per_field,
        }
    }

    pub fn compiler_policy(&self) -> CompilerPolicy {
        let mut policy = CompilerPolicy {
            pause_threshold_ms: self.compiler.pause_threshold_ms,
            default_base_url: self.compiler.default_base_url.clone(),
            ..CompilerPolicy::default()
        };
        policy
            .tooling_kinds
            .extend(self.compiler.extra_tooling_kinds.iter().cloned());
        policy
            .tooling_id_prefixes
            .extend(self.compiler.extra_tooling_id_prefixes.iter().cloned());
        policy
    }
}
