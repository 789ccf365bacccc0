use clap::Parser;
use std::sync::Arc;
use vision_etl::adapters::input::load_inputs;
use vision_etl::core::export::Exporter;
use vision_etl::core::telemetry::{digest, latency_rows, summarize};
use vision_etl::utils::error::{ErrorSeverity, VisionEtlError};
use vision_etl::utils::{logger, validation::Validate};
use vision_etl::{
    BatchProcessor, BatchReport, CliConfig, LocalStorage, OpenRouterClient, ProgressEvent,
    ProxyClient, VisionModel,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting vision-etl");
    if config.verbose {
        tracing::debug!(
            model = %config.model,
            server_url = ?config.server_url,
            output = %config.output_path,
            "CLI config"
        );
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    match run(&config).await {
        Ok(()) => {}
        Err(e) => {
            tracing::error!(
                "❌ Batch failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn build_model(config: &CliConfig) -> Result<Arc<dyn VisionModel>, VisionEtlError> {
    match &config.server_url {
        Some(url) => {
            tracing::info!("Sending images through {}", url);
            Ok(Arc::new(ProxyClient::new(url.clone(), config.timeout())?))
        }
        None => {
            let settings = config.openrouter_settings()?;
            tracing::info!("Calling {} directly", settings.endpoint);
            Ok(Arc::new(OpenRouterClient::new(settings)?))
        }
    }
}

async fn run(config: &CliConfig) -> Result<(), VisionEtlError> {
    let prompt = config.resolve_prompt()?;
    let params = config.params();
    let export_options = config.export_options()?;

    let files = load_inputs(&config.inputs).await?;
    tracing::info!("📁 {} image(s) queued for {}", files.len(), params.model);

    let processor = BatchProcessor::new(build_model(config)?);
    let report = processor
        .collect(&files, &prompt, &params, |event| {
            if let ProgressEvent::FileCompleted {
                index,
                total,
                record,
                ..
            } = event
            {
                let status = if record.outcome.is_success() { "✅" } else { "❌" };
                println!(
                    "[{:>5.1}%] {}/{} {} {} ({:.2}s)",
                    event.progress_percent(),
                    index + 1,
                    total,
                    status,
                    record.filename,
                    record.latency_seconds
                );
            }
        })
        .await;

    let Some(report) = report else {
        return Err(VisionEtlError::EmptyInputError {
            message: "No files to process".to_string(),
        });
    };

    print_report(&report);

    if config.no_export {
        return Ok(());
    }

    let exporter = Exporter::new(LocalStorage::new(config.output_path.clone()), export_options);
    let written = exporter.export(&report.batch, chrono::Utc::now()).await?;
    for location in written {
        tracing::info!("📁 Output saved to: {}", location);
        println!("📁 Output saved to: {}", location);
    }

    Ok(())
}

fn print_report(report: &BatchReport) {
    let summary = summarize(&report.batch);

    println!();
    println!("📋 Summary:");
    println!("  Total Documents:        {}", summary.total);
    println!("  Successfully Processed: {}", summary.succeeded);
    println!("  Failed:                 {}", summary.failed);
    println!("  Mean Latency:           {:.2}s", summary.mean_latency_seconds);
    println!("  Total Time:             {:.2}s", report.elapsed_seconds);

    println!();
    println!("⏱️ Latency:");
    for row in latency_rows(&report.batch) {
        println!(
            "  {:<40} {:<36} {:>8.2}s {}",
            row.filename,
            row.model_id,
            row.latency_seconds,
            if row.succeeded { "ok" } else { "failed" }
        );
    }

    println!();
    println!("🔎 Document Insights:");
    for line in digest(&report.batch) {
        println!("  {}", line);
    }
}
