use std::{path::Path, sync::Arc, time::Duration};

use crate::{
    cli::ProcessArgs,
    core::{
        config::PipelineConfig,
        errors::{AppError, AppResult},
        log::ProcessingLog,
        types::{FolderBatch, Provider, RunReport},
    },
    export::docx::DocxSerializer,
    ingest::{folder::build_batches, scan::scan_directory},
    pipeline::{CancelFlag, Orchestrator},
    providers::{gemini::GeminiClient, Collaborators},
    raster::pdf::PdfiumRasterizer,
    security::keyring,
};

pub const REPORT_FILE: &str = "run-report.json";
pub const LOG_FILE: &str = "processing.log";

pub async fn run(args: ProcessArgs, cancel: CancelFlag) -> AppResult<RunReport> {
    let config = apply_overrides(PipelineConfig::from_env()?, &args)?;
    let api_key = keyring::resolve_api_key(Provider::Gemini)?;

    let mut batches = build_batches(scan_directory(&args.input_dir)?);
    apply_selection(&mut batches, &args);
    if batches.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "no supported files under {}",
            args.input_dir.display()
        )));
    }

    let gemini = Arc::new(GeminiClient::new(config.model.clone(), api_key)?);
    tracing::info!(model = gemini.model(), folders = batches.len(), "starting run");
    let collaborators = Collaborators {
        analyzer: gemini.clone(),
        ranker: gemini.clone(),
        summarizer: gemini,
        serializer: Arc::new(DocxSerializer),
        rasterizer: Arc::new(PdfiumRasterizer::new(config.pdfium_library_dir.clone())),
    };

    let log = ProcessingLog::new();
    let orchestrator = Orchestrator::new(config, collaborators, log.clone());
    let snapshots = orchestrator.subscribe();

    let result = orchestrator.run(batches, &cancel).await;

    tokio::fs::create_dir_all(&args.out).await?;
    let final_state = snapshots.borrow().clone();
    write_artifacts(&args.out, &final_state).await?;
    tokio::fs::write(args.out.join(LOG_FILE), log.render()).await?;

    let report = result?;
    tokio::fs::write(
        args.out.join(REPORT_FILE),
        serde_json::to_vec_pretty(&report)?,
    )
    .await?;
    tracing::info!(
        out = %args.out.display(),
        folders = report.folders.len(),
        cancelled = report.cancelled,
        "run finished"
    );
    Ok(report)
}

/// CLI flags win over the environment.
pub fn apply_overrides(mut config: PipelineConfig, args: &ProcessArgs) -> AppResult<PipelineConfig> {
    if args.summary {
        config.summary_enabled = true;
    }
    if let Some(language) = &args.language {
        config.language = language.trim().to_string();
    }
    if let Some(model) = &args.model {
        config.model = model.trim().to_string();
    }
    if let Some(secs) = args.timeout_secs {
        if secs == 0 {
            return Err(AppError::Configuration(
                "--timeout-secs must be positive".to_string(),
            ));
        }
        config.call_timeout = Duration::from_secs(secs);
    }
    Ok(config)
}

/// Marks excluded items and applies requested rotations, matching by file name.
pub fn apply_selection(batches: &mut [FolderBatch], args: &ProcessArgs) {
    for item in batches.iter_mut().flat_map(|batch| batch.items.iter_mut()) {
        if args.excludes.iter().any(|name| name == &item.name) {
            item.included = false;
        }
        if let Some((_, rotation)) = args.rotations.iter().rev().find(|(name, _)| name == &item.name) {
            item.rotation = *rotation;
        }
    }
}

async fn write_artifacts(out: &Path, state: &[FolderBatch]) -> AppResult<()> {
    for artifact in state.iter().filter_map(|batch| batch.artifact.as_ref()) {
        tokio::fs::write(out.join(&artifact.file_name), &artifact.bytes[..]).await?;
    }
    Ok(())
}
