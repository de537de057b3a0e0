use clap::Parser;
use recorder_companion::cli::commands::{
    apply_cli_overrides, build_backend, cmd_cases, cmd_compile, cmd_fields, cmd_serve, cmd_suggest,
};
use recorder_companion::cli::config::{Cli, Commands, load_config};
use recorder_companion::trace::logger::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Resolve settings: CLI > config file > defaults
    let config = apply_cli_overrides(&cli, load_config(cli.config.as_deref()));

    match cli.command {
        Commands::Serve { .. } => {
            cmd_serve(&config).await?;
        }
        Commands::Compile {
            events,
            format,
            output,
        } => {
            cmd_compile(&events, &format, output.as_deref(), &config.compiler_policy())?;
        }
        Commands::Fields { html } => {
            cmd_fields(&html, &config.field_policy())?;
        }
        Commands::Suggest { html, output } => {
            let backend = build_backend(&config.model);
            let settings = config.engine_settings();
            // blocking HTTP client must not run on the async runtime's threads
            tokio::task::spawn_blocking(move || {
                cmd_suggest(&html, output.as_deref(), backend.as_ref(), settings)
                    .map_err(|e| e.to_string())
            })
            .await??;
        }
        Commands::Cases {
            events,
            book,
            count,
            output,
        } => {
            cmd_cases(
                &events,
                book.as_deref(),
                count.unwrap_or(config.cases.count),
                output.as_deref(),
                &config.compiler_policy(),
            )?;
        }
    }

    Ok(())
}
