use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    core::{
        config::PipelineConfig,
        errors::{AppError, AppResult},
        log::ProcessingLog,
        types::{
            Artifact, FolderBatch, FolderReport, FolderStatus, ItemOutcome, ReorderSource,
            RunReport,
        },
    },
    pipeline::{
        assembler::{self, AssemblyOptions, AssemblyStats},
        extractor, reorder, summary,
    },
    providers::{retry::CallPolicy, Collaborators},
};

pub type Snapshot = Arc<Vec<FolderBatch>>;

/// Cooperative cancellation, checked before each folder and each item.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What one folder produced before its status was settled.
struct FolderRun {
    items: Vec<ItemOutcome>,
    page_count: usize,
    reorder: ReorderSource,
    summary_included: bool,
    stats: AssemblyStats,
    artifact: AppResult<Artifact>,
}

impl FolderRun {
    fn aborted(items: Vec<ItemOutcome>, page_count: usize, err: AppError) -> Self {
        Self {
            items,
            page_count,
            reorder: ReorderSource::Unchanged,
            summary_included: false,
            stats: AssemblyStats::default(),
            artifact: Err(err),
        }
    }
}

/// Single writer of folder status. Folders run one after another, items
/// inside a folder one at a time.
pub struct Orchestrator {
    config: PipelineConfig,
    collaborators: Collaborators,
    log: ProcessingLog,
    policy: CallPolicy,
    snapshots: watch::Sender<Snapshot>,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, collaborators: Collaborators, log: ProcessingLog) -> Self {
        let policy = CallPolicy::new(config.call_timeout, config.max_retries);
        let (snapshots, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            config,
            collaborators,
            log,
            policy,
            snapshots,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    pub fn log(&self) -> &ProcessingLog {
        &self.log
    }

    pub async fn run(&self, batches: Vec<FolderBatch>, cancel: &CancelFlag) -> AppResult<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let mut state = batches;
        let mut reports = Vec::with_capacity(state.len());
        let mut cancelled = false;

        self.log
            .info("run", format!("run {run_id} started with {} folders", state.len()));
        self.publish(&state);

        for index in 0..state.len() {
            if cancelled || cancel.is_cancelled() {
                cancelled = true;
                reports.push(pending_report(&state[index]));
                continue;
            }

            state[index] = state[index].transition(FolderStatus::Processing)?;
            self.publish(&state);

            let run = self.process_folder(&state, index, cancel).await;
            let artifact = run.artifact;
            let (next, artifact_name, artifact_sha256, error) = match artifact {
                Ok(artifact) => {
                    let sha = format!("{:x}", Sha256::digest(&artifact.bytes[..]));
                    let name = artifact.file_name.clone();
                    let failed = run.items.iter().filter(|item| item.is_failure()).count();
                    self.log.info(
                        &state[index].name,
                        format!(
                            "completed: {name} ({} bytes, {failed} failed items)",
                            artifact.bytes.len()
                        ),
                    );
                    (state[index].complete(artifact)?, Some(name), Some(sha), None)
                }
                Err(err) => {
                    if matches!(err, AppError::Cancelled) {
                        cancelled = true;
                    }
                    self.log.error(&state[index].name, format!("failed: {err}"));
                    (state[index].transition(FolderStatus::Error)?, None, None, Some(err))
                }
            };
            state[index] = next;
            self.publish(&state);

            let fatal = error.as_ref().filter(|err| err.is_run_fatal()).cloned();
            reports.push(FolderReport {
                folder: state[index].name.clone(),
                status: state[index].status,
                items: run.items,
                page_count: run.page_count,
                reorder: run.reorder,
                summary_included: run.summary_included,
                crops: run.stats.crops,
                crop_failures: run.stats.crop_failures,
                artifact_name,
                artifact_sha256,
                error,
            });

            if let Some(err) = fatal {
                return Err(err);
            }
        }

        if cancelled {
            self.log.warn("run", "run cancelled");
        }
        self.log.info("run", format!("run {run_id} finished"));

        Ok(RunReport {
            run_id,
            started_at,
            ended_at: Utc::now(),
            cancelled,
            folders: reports,
        })
    }

    /// Runs every phase for `state[index]`, republishing `state` after each one.
    async fn process_folder(
        &self,
        state: &[FolderBatch],
        index: usize,
        cancel: &CancelFlag,
    ) -> FolderRun {
        let batch = &state[index];
        let folder = batch.name.as_str();
        let collaborators = &self.collaborators;
        let mut items = Vec::with_capacity(batch.items.len());
        let mut pages = Vec::new();

        self.log.info(
            folder,
            format!(
                "processing {} of {} items",
                batch.included_items().count(),
                batch.items.len()
            ),
        );

        for item in &batch.items {
            if cancel.is_cancelled() {
                self.log.warn(folder, "cancelled between items");
                return FolderRun::aborted(items, pages.len(), AppError::Cancelled);
            }

            if !item.included {
                self.log.info(folder, format!("{} excluded", item.name));
                items.push(ItemOutcome::Skipped {
                    item_id: item.id.clone(),
                    name: item.name.clone(),
                });
                continue;
            }

            let rasters = match extractor::extract_rasters(
                item,
                Arc::clone(&collaborators.rasterizer),
                &self.config,
                &self.log,
            )
            .await
            {
                Ok(rasters) => rasters,
                Err(err) => {
                    self.log.error(folder, format!("{} skipped: {err}", item.name));
                    items.push(ItemOutcome::Failed {
                        item_id: item.id.clone(),
                        name: item.name.clone(),
                        error: err,
                    });
                    continue;
                }
            };

            let (mut analyzed, analysis_failures) = extractor::analyze_pages(
                rasters,
                item.kind,
                collaborators.analyzer.as_ref(),
                &self.policy,
                &self.config.language,
                &self.log,
            )
            .await;

            items.push(ItemOutcome::Processed {
                item_id: item.id.clone(),
                name: item.name.clone(),
                pages: analyzed.len(),
                analysis_failures,
            });
            pages.append(&mut analyzed);
        }
        self.publish(state);

        let page_count = pages.len();
        let ordered = reorder::reorder(
            pages,
            collaborators.ranker.as_ref(),
            &self.policy,
            self.config.excerpt_char_budget,
            &self.log,
        )
        .await;
        self.publish(state);

        let summary = if self.config.summary_enabled {
            summary::summarize(
                &ordered.pages,
                collaborators.summarizer.as_ref(),
                &self.policy,
                &self.config.language,
                self.config.summary_char_budget,
                &self.log,
            )
            .await
        } else {
            None
        };
        self.publish(state);

        let (tree, stats) = assembler::assemble(
            &ordered.pages,
            summary.as_deref(),
            AssemblyOptions {
                crop_padding_px: self.config.crop_padding_px,
                max_display_size: self.config.max_display_size,
            },
            &self.log,
        )
        .await;
        self.publish(state);

        let serializer = &collaborators.serializer;
        let artifact = self
            .policy
            .run("serialize", || serializer.serialize(&tree))
            .await
            .map_err(|err| match err {
                AppError::Assembly(_) | AppError::Configuration(_) => err,
                other => AppError::Assembly(other.to_string()),
            })
            .map(|bytes| Artifact {
                file_name: artifact_name(folder, serializer.extension()),
                bytes: bytes.into(),
            });

        FolderRun {
            items,
            page_count,
            reorder: ordered.source,
            summary_included: summary.is_some(),
            stats,
            artifact,
        }
    }

    fn publish(&self, state: &[FolderBatch]) {
        self.snapshots.send_replace(Arc::new(state.to_vec()));
    }
}

pub fn artifact_name(folder: &str, extension: &str) -> String {
    format!("{folder}_AI_Processed.{extension}")
}

fn pending_report(batch: &FolderBatch) -> FolderReport {
    FolderReport {
        folder: batch.name.clone(),
        status: batch.status,
        items: Vec::new(),
        page_count: 0,
        reorder: ReorderSource::Unchanged,
        summary_included: false,
        crops: 0,
        crop_failures: 0,
        artifact_name: None,
        artifact_sha256: None,
        error: None,
    }
}
