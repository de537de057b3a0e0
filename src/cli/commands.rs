use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::cli::config::{AppConfig, Cli, Commands, ModelConfig, ModelProvider};
use crate::dom::document::Document;
use crate::dom::fields::{FieldPolicy, scan_fields};
use crate::error::CompanionError;
use crate::recording::compiler::{CompilerPolicy, compile_events};
use crate::recording::event_model::{EventBatch, RecordedEvent};
use crate::script::csv::render_csv;
use crate::script::selenese::{render_instructions, render_selenese};
use crate::server::routes::{SCRIPT_TITLE, serve};
use crate::server::state::AppState;
use crate::server::store::RunStore;
use crate::suggest::ai_model::{
    DEFAULT_MODEL, DEFAULT_OLLAMA_ENDPOINT, MockTextInference, OllamaBackend, OpenAiBackend,
    TextInference,
};
use crate::suggest::analyzer::{EngineSettings, SuggestionEngine};
use crate::suggest::suggestion_model::SuggestionBook;
use crate::testcase::generator::{apply_row, build_test_cases};

const OPENAI_DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

// ============================================================================
// serve subcommand
// ============================================================================

pub async fn cmd_serve(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let host: IpAddr = config
        .server
        .host
        .parse()
        .map_err(|e| CompanionError::Config(format!("invalid host '{}': {}", config.server.host, e)))?;
    let addr = SocketAddr::new(host, config.server.port);

    let store = RunStore::create(Path::new(&config.server.snapshot_dir))?;
    info!(run = %store.dir().display(), provider = ?config.model.provider, "starting run");

    let state = Arc::new(AppState::new(
        store,
        build_backend(&config.model),
        config.engine_settings(),
        config.compiler_policy(),
        config.cases.count,
    ));

    serve(addr, state, config.server.body_limit_bytes()).await?;
    Ok(())
}

// ============================================================================
// compile subcommand
// ============================================================================

pub fn cmd_compile(
    events_path: &str,
    format: &str,
    output: Option<&str>,
    policy: &CompilerPolicy,
) -> Result<(), Box<dyn std::error::Error>> {
    let events = load_events(events_path)?;
    let script = compile_events(&events, policy);

    let content = match format {
        "json" => serde_json::to_string_pretty(&script)?,
        _ => render_selenese(&script, SCRIPT_TITLE),
    };

    info!(
        events = events.len(),
        instructions = script.instructions.len(),
        "compiled"
    );
    write_or_print(output, &content)
}

// ============================================================================
// fields subcommand
// ============================================================================

pub fn cmd_fields(html_path: &str, policy: &FieldPolicy) -> Result<(), Box<dyn std::error::Error>> {
    let html = read_file(html_path)?;
    let doc = Document::parse(&html);
    let fields = scan_fields(&doc, policy);

    for field in &fields {
        println!(
            "{:<30} {:<10} {:<16} {}",
            field.identifier.locator(),
            field.tag,
            field.input_type.as_deref().unwrap_or("-"),
            if field.visible { "visible" } else { "hidden" }
        );
    }
    println!(
        "{} fields ({} visible)",
        fields.len(),
        fields.iter().filter(|f| f.visible).count()
    );
    Ok(())
}

// ============================================================================
// suggest subcommand
// ============================================================================

pub fn cmd_suggest(
    html_path: &str,
    output: Option<&str>,
    backend: &dyn TextInference,
    settings: EngineSettings,
) -> Result<(), Box<dyn std::error::Error>> {
    let html = read_file(html_path)?;
    let report = SuggestionEngine::new(backend, settings).suggest(&html);

    for skipped in &report.skipped {
        eprintln!("skipped {}: {:?}", skipped.identifier, skipped.reason);
    }
    let json = serde_json::to_string_pretty(&report.suggestions)?;
    write_or_print(output, &json)
}

// ============================================================================
// cases subcommand
// ============================================================================

pub fn cmd_cases(
    events_path: &str,
    book_path: Option<&str>,
    count: usize,
    output_dir: Option<&str>,
    policy: &CompilerPolicy,
) -> Result<(), Box<dyn std::error::Error>> {
    let events = load_events(events_path)?;
    let script = compile_events(&events, policy);

    let book: SuggestionBook = match book_path {
        Some(path) => {
            let content = read_file(path)?;
            serde_json::from_str(&content).map_err(|e| CompanionError::json_parse(path, e))?
        }
        None => SuggestionBook::default(),
    };

    let table = build_test_cases(&script, &book, count);
    let csv = render_csv(&table)?;

    match output_dir {
        Some(dir) => {
            let store = RunStore::open(dir);
            std::fs::create_dir_all(store.dir())?;
            let scripts: Vec<String> = table
                .rows
                .iter()
                .enumerate()
                .map(|(n, row)| {
                    let instructions = apply_row(&script.instructions, row);
                    render_instructions(&script.base_url, &instructions, &format!("Test case {}", n + 1))
                })
                .collect();
            store.save_test_cases(&csv, &scripts)?;
            println!("Generated {} test cases in {}/", table.len(), dir);
        }
        None => print!("{}", csv),
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Merge CLI flags over the config file: CLI > file > defaults.
pub fn apply_cli_overrides(cli: &Cli, mut config: AppConfig) -> AppConfig {
    if let Some(endpoint) = &cli.ollama_endpoint {
        config.model.endpoint = Some(endpoint.clone());
    }
    if let Some(model) = &cli.model {
        config.model.model = Some(model.clone());
    }
    if let Commands::Serve {
        host,
        port,
        snapshot_dir,
    } = &cli.command
    {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
        if let Some(dir) = snapshot_dir {
            config.server.snapshot_dir = dir.clone();
        }
    }
    config
}

/// Build the model backend the config asks for.
pub fn build_backend(model: &ModelConfig) -> Arc<dyn TextInference> {
    let name = model.model.as_deref().unwrap_or(DEFAULT_MODEL);
    match model.provider {
        ModelProvider::Ollama => {
            let endpoint = model.endpoint.as_deref().unwrap_or(DEFAULT_OLLAMA_ENDPOINT);
            Arc::new(
                OllamaBackend::new(endpoint, name)
                    .with_num_ctx(model.num_ctx)
                    .with_timeout(model.timeout()),
            )
        }
        ModelProvider::Openai => {
            let endpoint = model.endpoint.as_deref().unwrap_or(OPENAI_DEFAULT_ENDPOINT);
            Arc::new(
                OpenAiBackend::new(endpoint, name)
                    .with_api_key_env(&model.api_key_env)
                    .with_timeout(model.timeout()),
            )
        }
        ModelProvider::Mock => Arc::new(MockTextInference::new(&model.mock_response)),
    }
}

/// Read a recorded-events file (bare array or `{"events": [...]}`).
pub fn load_events(path: &str) -> Result<Vec<RecordedEvent>, CompanionError> {
    let content = read_file(path)?;
    let batch: EventBatch =
        serde_json::from_str(&content).map_err(|e| CompanionError::json_parse(path, e))?;
    Ok(batch.into_events())
}

fn read_file(path: &str) -> Result<String, CompanionError> {
    std::fs::read_to_string(path).map_err(|e| CompanionError::io(format!("reading {}", path), e))
}

fn write_or_print(output: Option<&str>, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(path) => std::fs::write(path, content)?,
        None => println!("{}", content),
    }
    Ok(())
}
