//! Pipeline orchestrator.
//!
//! Sequences Analyze -> Compose-Prompt -> Generate-Audio -> Merge for one
//! uploaded video. Every run owns an [`ArtifactJanitor`]; whatever the
//! outcome, the janitor is drained before the terminal progress record is
//! emitted and the run returns.

use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;

use tokio::fs::File;

use bruno_media::{ArtifactJanitor, TransientArtifact};
use bruno_models::{Job, ProgressEvent, SectionTimings, Stage};
use metrics::{counter, histogram};
use serde::Serialize;
use tracing::Instrument;

use crate::cancel::CancelSignal;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::progress::ProgressReporter;
use crate::stages::{StageResult, StageSet};

const STAGE_DURATION_SECONDS: &str = "bruno_stage_duration_seconds";
const STAGE_FAILURES_TOTAL: &str = "bruno_stage_failures_total";
const PIPELINE_RUNS_TOTAL: &str = "bruno_pipeline_runs_total";

/// Input of one run. The upload must already be owned by `janitor`.
#[derive(Debug)]
pub struct PipelineRequest {
    pub janitor: ArtifactJanitor,
    pub upload: TransientArtifact,
    /// File name the caller uploaded, used to name the output
    pub original_filename: Option<String>,
}

/// Result of a full run.
#[derive(Debug)]
pub struct RunOutput {
    pub job: Job,
    /// Persisted final video, outside janitor ownership
    pub output: PathBuf,
    /// Handle opened on this run's video before it was persisted. It keeps
    /// reading this run's bytes even if a later run with the same file name
    /// replaces `output`.
    pub video: File,
}

/// Result of an analysis-only run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutput {
    pub context: String,
    pub duration: f64,
}

/// Result of a prompt-only run.
#[derive(Debug, Clone, Serialize)]
pub struct PromptOutput {
    pub context: String,
    pub duration: f64,
    pub suno_prompt: String,
    pub tags: String,
    pub negative_tags: String,
}

pub struct Orchestrator {
    config: PipelineConfig,
    stages: StageSet,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, stages: StageSet) -> Self {
        Self { config, stages }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline, streaming progress to `progress`.
    ///
    /// The record sequence always ends in `done` or `error`.
    pub async fn run(
        &self,
        request: PipelineRequest,
        progress: ProgressReporter,
        cancel: CancelSignal,
    ) -> PipelineResult<RunOutput> {
        let PipelineRequest {
            janitor,
            upload,
            original_filename,
        } = request;

        let mut job = Job::new(upload.path(), original_filename);
        let logger = JobLogger::new(&job.id, "generate");
        let span = logger.create_span();

        logger.log_start(job.original_filename.as_deref().unwrap_or("unnamed upload"));

        let result = self
            .execute(&mut job, &janitor, upload, &progress, &cancel, &logger)
            .instrument(span)
            .await;

        janitor.release_all().await;

        match result {
            Ok((output, video)) => {
                let file_name = output
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                job.succeed(&output);
                progress
                    .emit(&mut job, ProgressEvent::done(format!("Complete! File: {}", file_name)))
                    .await;
                logger.log_completion(&file_name);
                counter!(PIPELINE_RUNS_TOTAL, "outcome" => "succeeded").increment(1);
                Ok(RunOutput { job, output, video })
            }
            Err(e) => {
                self.record_failure(&mut job, &e, &logger);
                progress.emit(&mut job, ProgressEvent::error(e.user_message())).await;
                Err(e)
            }
        }
    }

    /// Probe and analyze only.
    pub async fn analyze_only(
        &self,
        request: PipelineRequest,
        cancel: CancelSignal,
    ) -> PipelineResult<AnalysisOutput> {
        let PipelineRequest {
            janitor,
            upload,
            original_filename,
        } = request;

        let mut job = Job::new(upload.path(), original_filename);
        let logger = JobLogger::new(&job.id, "analyze_only");
        let span = logger.create_span();
        let progress = ProgressReporter::disabled();

        let result = async {
            let duration = self.admit(&upload).await?;
            job.start(duration);
            let context = self
                .stage(&mut job, Stage::Analyze, &progress, &cancel, &logger, || {
                    self.stages.analyzer.analyze(&upload, &cancel)
                })
                .await?;
            Ok::<_, PipelineError>(AnalysisOutput { context, duration })
        }
        .instrument(span)
        .await;

        janitor.release_all().await;
        self.finish_partial(&mut job, result, &logger)
    }

    /// Probe, analyze and compose the prompt; nothing is generated.
    pub async fn prompt_only(
        &self,
        request: PipelineRequest,
        cancel: CancelSignal,
    ) -> PipelineResult<PromptOutput> {
        let PipelineRequest {
            janitor,
            upload,
            original_filename,
        } = request;

        let mut job = Job::new(upload.path(), original_filename);
        let logger = JobLogger::new(&job.id, "prompt_only");
        let span = logger.create_span();
        let progress = ProgressReporter::disabled();

        let result = async {
            let duration = self.admit(&upload).await?;
            job.start(duration);
            let timings = section_timings(duration)?;

            let context = self
                .stage(&mut job, Stage::Analyze, &progress, &cancel, &logger, || {
                    self.stages.analyzer.analyze(&upload, &cancel)
                })
                .await?;
            let bundle = self
                .stage(&mut job, Stage::ComposePrompt, &progress, &cancel, &logger, || {
                    self.stages.composer.compose(&context, duration, &timings)
                })
                .await?;

            Ok::<_, PipelineError>(PromptOutput {
                context,
                duration,
                suno_prompt: bundle.prompt,
                tags: bundle.tags,
                negative_tags: bundle.negative_tags,
            })
        }
        .instrument(span)
        .await;

        janitor.release_all().await;
        self.finish_partial(&mut job, result, &logger)
    }

    async fn execute(
        &self,
        job: &mut Job,
        janitor: &ArtifactJanitor,
        upload: TransientArtifact,
        progress: &ProgressReporter,
        cancel: &CancelSignal,
        logger: &JobLogger,
    ) -> PipelineResult<(PathBuf, File)> {
        progress.emit(job, ProgressEvent::uploaded()).await;

        let duration = self.admit(&upload).await?;
        job.start(duration);
        let timings = section_timings(duration)?;

        let context = self
            .stage(job, Stage::Analyze, progress, cancel, logger, || {
                self.stages.analyzer.analyze(&upload, cancel)
            })
            .await?;
        progress
            .emit(
                job,
                ProgressEvent::new(
                    Stage::Analyze.progress_id(),
                    "Video analysis complete",
                    Stage::Analyze.end_percent(),
                ),
            )
            .await;

        let bundle = self
            .stage(job, Stage::ComposePrompt, progress, cancel, logger, || {
                self.stages.composer.compose(&context, duration, &timings)
            })
            .await?;
        let message = match bundle.degradation_note() {
            Some(note) => {
                logger.log_warning(&note);
                format!("Music prompt generated ({})", note)
            }
            None => "Music prompt generated".to_string(),
        };
        progress
            .emit(
                job,
                ProgressEvent::new(
                    Stage::ComposePrompt.progress_id(),
                    message,
                    Stage::ComposePrompt.end_percent(),
                ),
            )
            .await;

        let audio = self
            .stage(job, Stage::GenerateAudio, progress, cancel, logger, || {
                self.stages.generator.generate(&bundle, duration, janitor, cancel)
            })
            .await?;
        progress
            .emit(
                job,
                ProgressEvent::new(
                    Stage::GenerateAudio.progress_id(),
                    "Audio generated successfully",
                    Stage::GenerateAudio.end_percent(),
                ),
            )
            .await;

        let merged = self
            .stage(job, Stage::Merge, progress, cancel, logger, || {
                self.stages.merger.merge(&upload, &audio, janitor, cancel)
            })
            .await?;

        // Inputs are consumed once the merge succeeded.
        janitor.release(&audio).await;
        janitor.release(&upload).await;

        if merged.size().await == 0 {
            return Err(PipelineError::stage_failed(
                Stage::Merge,
                "merged output is missing or empty",
            ));
        }

        let dest = self
            .config
            .output_dir
            .join(format!("output_{}.mp4", job.output_stem()));
        let video = File::open(merged.path()).await.map_err(|e| {
            PipelineError::stage_failed(Stage::Merge, format!("Output file was not created: {}", e))
        })?;
        let output = janitor.persist(merged, &dest).await?;

        Ok((output, video))
    }

    /// Probe the upload and enforce the duration ceiling. No stage runs
    /// before this succeeds.
    async fn admit(&self, upload: &TransientArtifact) -> PipelineResult<f64> {
        let duration = self.stages.probe.duration(upload.path()).await?;

        if !duration.is_finite() || duration <= 0.0 {
            return Err(PipelineError::validation(
                "Could not determine video duration",
            ));
        }
        if duration > self.config.duration_ceiling_secs {
            return Err(PipelineError::VideoTooLong {
                duration,
                ceiling: self.config.duration_ceiling_secs,
            });
        }
        Ok(duration)
    }

    /// Run one stage: entry record, cancellation check, timing and logging.
    async fn stage<T, F, Fut>(
        &self,
        job: &mut Job,
        stage: Stage,
        progress: &ProgressReporter,
        cancel: &CancelSignal,
        logger: &JobLogger,
        call: F,
    ) -> StageResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StageResult<T>>,
    {
        job.enter_stage(stage);
        progress
            .emit(
                job,
                ProgressEvent::new(stage.progress_id(), start_message(stage), stage.start_percent()),
            )
            .await;
        logger.log_stage_start(stage);

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled { stage });
        }

        let started = Instant::now();
        let result = call().await;
        let elapsed = started.elapsed();

        histogram!(STAGE_DURATION_SECONDS, "stage" => stage.as_str()).record(elapsed.as_secs_f64());
        if result.is_ok() {
            logger.log_stage_done(stage, elapsed);
        }
        result
    }

    fn finish_partial<T>(
        &self,
        job: &mut Job,
        result: PipelineResult<T>,
        logger: &JobLogger,
    ) -> PipelineResult<T> {
        match result {
            Ok(output) => {
                logger.log_completion(logger.operation());
                Ok(output)
            }
            Err(e) => {
                self.record_failure(job, &e, logger);
                Err(e)
            }
        }
    }

    fn record_failure(&self, job: &mut Job, err: &PipelineError, logger: &JobLogger) {
        job.fail();
        logger.log_error(err.stage(), &err.user_message());

        let stage = err.stage().map(|s| s.as_str()).unwrap_or("none");
        counter!(STAGE_FAILURES_TOTAL, "stage" => stage, "kind" => err.kind_label()).increment(1);
        counter!(PIPELINE_RUNS_TOTAL, "outcome" => "failed").increment(1);
    }
}

fn section_timings(duration: f64) -> PipelineResult<SectionTimings> {
    SectionTimings::for_duration(duration).map_err(|e| PipelineError::validation(e.to_string()))
}

fn start_message(stage: Stage) -> &'static str {
    match stage {
        Stage::Analyze => "Analyzing video content...",
        Stage::ComposePrompt => "Crafting music prompt...",
        Stage::GenerateAudio => "Generating audio...",
        Stage::Merge => "Combining video and audio...",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::progress_channel;
    use crate::stages::{AudioGenerator, DurationProbe, MediaMerger, PromptComposer, VideoAnalyzer};
    use crate::cancel::cancel_pair;
    use async_trait::async_trait;
    use bruno_models::{ArtifactKind, PromptBundle};
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Scripted stand-in for all five collaborators.
    struct Stub {
        duration: f64,
        fail_at: Option<Stage>,
        defaulted_tags: bool,
        merged_bytes: &'static [u8],
        calls: Mutex<Vec<&'static str>>,
        timings: Mutex<Option<SectionTimings>>,
    }

    impl Stub {
        fn new(duration: f64) -> Self {
            Self {
                duration,
                fail_at: None,
                defaulted_tags: false,
                merged_bytes: b"merged video",
                calls: Mutex::new(Vec::new()),
                timings: Mutex::new(None),
            }
        }

        fn failing_at(duration: f64, stage: Stage) -> Self {
            Self {
                fail_at: Some(stage),
                ..Self::new(duration)
            }
        }

        fn called(&self, name: &'static str) {
            self.calls.lock().unwrap().push(name);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn check(&self, stage: Stage) -> StageResult<()> {
            if self.fail_at == Some(stage) {
                Err(PipelineError::stage_failed(stage, "scripted failure"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DurationProbe for Stub {
        async fn duration(&self, _video: &Path) -> StageResult<f64> {
            self.called("probe");
            Ok(self.duration)
        }
    }

    #[async_trait]
    impl VideoAnalyzer for Stub {
        async fn analyze(&self, _video: &TransientArtifact, _cancel: &CancelSignal) -> StageResult<String> {
            self.called("analyze");
            self.check(Stage::Analyze)?;
            Ok("=== SCENE BREAKDOWN ===\nScene 1: 0.0s - 17.4s".to_string())
        }
    }

    #[async_trait]
    impl PromptComposer for Stub {
        async fn compose(
            &self,
            _context: &str,
            duration: f64,
            timings: &SectionTimings,
        ) -> StageResult<PromptBundle> {
            self.called("compose");
            *self.timings.lock().unwrap() = Some(*timings);
            self.check(Stage::ComposePrompt)?;
            Ok(PromptBundle {
                prompt: format!("[Intro - 0 to 4.35 seconds]\nPop, 100 BPM\nENDS AT {duration}"),
                tags: "Pop, 100 BPM".to_string(),
                negative_tags: "harsh".to_string(),
                tags_defaulted: self.defaulted_tags,
                negative_tags_defaulted: false,
            })
        }
    }

    #[async_trait]
    impl AudioGenerator for Stub {
        async fn generate(
            &self,
            _bundle: &PromptBundle,
            _duration: f64,
            janitor: &ArtifactJanitor,
            _cancel: &CancelSignal,
        ) -> StageResult<TransientArtifact> {
            self.called("generate");
            // Produce the file before failing so teardown has something to reclaim.
            let audio = janitor.acquire(ArtifactKind::GeneratedAudio)?;
            tokio::fs::write(audio.path(), b"audio").await.unwrap();
            self.check(Stage::GenerateAudio)?;
            Ok(audio)
        }
    }

    #[async_trait]
    impl MediaMerger for Stub {
        async fn merge(
            &self,
            _video: &TransientArtifact,
            _audio: &TransientArtifact,
            janitor: &ArtifactJanitor,
            _cancel: &CancelSignal,
        ) -> StageResult<TransientArtifact> {
            self.called("merge");
            let merged = janitor.acquire(ArtifactKind::MergedVideo)?;
            tokio::fs::write(merged.path(), self.merged_bytes).await.unwrap();
            self.check(Stage::Merge)?;
            Ok(merged)
        }
    }

    struct Harness {
        work: TempDir,
        outputs: TempDir,
        stub: Arc<Stub>,
    }

    impl Harness {
        fn new(stub: Stub) -> Self {
            Self {
                work: TempDir::new().unwrap(),
                outputs: TempDir::new().unwrap(),
                stub: Arc::new(stub),
            }
        }

        fn orchestrator(&self) -> Orchestrator {
            self.orchestrator_writing_to(self.outputs.path())
        }

        fn orchestrator_writing_to(&self, output_dir: &Path) -> Orchestrator {
            let config = PipelineConfig {
                work_dir: self.work.path().to_path_buf(),
                output_dir: output_dir.to_path_buf(),
                ..Default::default()
            };
            let stages = StageSet {
                probe: self.stub.clone(),
                analyzer: self.stub.clone(),
                composer: self.stub.clone(),
                generator: self.stub.clone(),
                merger: self.stub.clone(),
            };
            Orchestrator::new(config, stages)
        }

        async fn request(&self, filename: &str) -> PipelineRequest {
            let janitor = ArtifactJanitor::new(self.work.path()).unwrap();
            let upload = janitor.acquire(ArtifactKind::UploadedVideo).unwrap();
            tokio::fs::write(upload.path(), b"video").await.unwrap();
            PipelineRequest {
                janitor,
                upload,
                original_filename: Some(filename.to_string()),
            }
        }

        async fn run(&self) -> (PipelineResult<RunOutput>, Vec<ProgressEvent>) {
            let (reporter, mut rx) = progress_channel();
            let request = self.request("clip.mov").await;
            let result = self
                .orchestrator()
                .run(request, reporter, CancelSignal::never())
                .await;

            let mut events = Vec::new();
            while let Some(event) = rx.recv().await {
                events.push(event);
            }
            (result, events)
        }

        fn work_entries(&self) -> usize {
            std::fs::read_dir(self.work.path()).unwrap().count()
        }
    }

    fn assert_monotonic(events: &[ProgressEvent]) {
        let progress: Vec<u8> = events.iter().filter(|e| !e.is_error()).map(|e| e.progress).collect();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
    }

    #[tokio::test]
    async fn test_full_run_event_sequence_and_output() {
        let harness = Harness::new(Stub::new(17.4));
        let (result, events) = harness.run().await;
        let output = result.unwrap();

        let sequence: Vec<(&str, u8)> = events.iter().map(|e| (e.stage.as_str(), e.progress)).collect();
        assert_eq!(
            sequence,
            vec![
                ("uploading", 10),
                ("analyzing", 15),
                ("analyzing", 35),
                ("prompting", 40),
                ("prompting", 55),
                ("generating", 60),
                ("generating", 80),
                ("combining", 85),
                ("done", 100),
            ]
        );
        assert_eq!(events.last().unwrap().message, "Complete! File: output_clip.mp4");

        assert_eq!(output.output, harness.outputs.path().join("output_clip.mp4"));
        assert_eq!(std::fs::read(&output.output).unwrap(), b"merged video");
        assert_eq!(output.job.status, bruno_models::JobStatus::Succeeded);
        assert_eq!(output.job.duration, Some(17.4));
        assert_eq!(harness.work_entries(), 0);
        assert_eq!(harness.stub.calls(), vec!["probe", "analyze", "compose", "generate", "merge"]);
    }

    #[tokio::test]
    async fn test_same_file_name_runs_keep_their_own_video() {
        let first = Harness::new(Stub {
            merged_bytes: b"first caller video",
            ..Stub::new(17.4)
        });
        let second = Harness::new(Stub {
            merged_bytes: b"second caller video",
            ..Stub::new(17.4)
        });
        let shared = first.outputs.path();

        let run_first = first
            .orchestrator_writing_to(shared)
            .run(first.request("clip.mp4").await, ProgressReporter::disabled(), CancelSignal::never())
            .await
            .unwrap();
        // Second run persists onto the same path before the first is read.
        let run_second = second
            .orchestrator_writing_to(shared)
            .run(second.request("clip.mp4").await, ProgressReporter::disabled(), CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(run_first.output, run_second.output);
        assert_eq!(std::fs::read(&run_first.output).unwrap(), b"second caller video");

        let mut bytes = Vec::new();
        let mut video = run_first.video;
        tokio::io::AsyncReadExt::read_to_end(&mut video, &mut bytes).await.unwrap();
        assert_eq!(bytes, b"first caller video");
    }

    #[tokio::test]
    async fn test_composer_receives_clamped_timings() {
        let harness = Harness::new(Stub::new(17.4));
        harness.run().await.0.unwrap();

        let timings = harness.stub.timings.lock().unwrap().unwrap();
        assert!((timings.intro_end - 4.35).abs() < 1e-9);
        assert!((timings.verse_end - 13.05).abs() < 1e-9);
        assert!((timings.outro_start - 13.05).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_too_long_rejects_before_any_stage() {
        let harness = Harness::new(Stub::new(61.0));
        let (result, events) = harness.run().await;

        let err = result.unwrap_err();
        assert!(matches!(err, PipelineError::VideoTooLong { .. }));
        assert_eq!(harness.stub.calls(), vec!["probe"]);
        assert_eq!(events.len(), 2);
        assert!(events[0].stage == "uploading");
        assert_eq!(
            events[1],
            ProgressEvent::error(
                "Video is too long (61.0s). Maximum allowed duration is 60 seconds."
            )
        );
        assert_eq!(harness.work_entries(), 0);
    }

    #[tokio::test]
    async fn test_failure_at_each_stage_leaves_no_artifacts() {
        for stage in Stage::ORDER {
            let harness = Harness::new(Stub::failing_at(20.0, stage));
            let (result, events) = harness.run().await;

            let err = result.unwrap_err();
            assert_eq!(err.stage(), Some(stage));
            assert_eq!(harness.work_entries(), 0, "artifacts left after {stage} failure");
            assert_eq!(std::fs::read_dir(harness.outputs.path()).unwrap().count(), 0);

            let last = events.last().unwrap();
            assert!(last.is_error());
            assert_eq!(last.progress, 0);
            assert_eq!(last.message, format!("{} failed: scripted failure", stage.display_name()));
            assert_monotonic(&events);
        }
    }

    #[tokio::test]
    async fn test_failed_stage_stops_the_chain() {
        let harness = Harness::new(Stub::failing_at(20.0, Stage::ComposePrompt));
        harness.run().await.0.unwrap_err();
        assert_eq!(harness.stub.calls(), vec!["probe", "analyze", "compose"]);
    }

    #[tokio::test]
    async fn test_degraded_prompt_is_noted_in_progress() {
        let harness = Harness::new(Stub {
            defaulted_tags: true,
            ..Stub::new(20.0)
        });
        let (_, events) = harness.run().await;
        let prompt_done = events
            .iter()
            .find(|e| e.stage == "prompting" && e.progress == 55)
            .unwrap();
        assert_eq!(prompt_done.message, "Music prompt generated (default style tags used)");
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_at_next_stage() {
        let harness = Harness::new(Stub::new(20.0));
        let (guard, signal) = cancel_pair();
        guard.cancel();

        let (reporter, mut rx) = progress_channel();
        let request = harness.request("clip.mp4").await;
        let err = harness
            .orchestrator()
            .run(request, reporter, signal)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.stage(), Some(Stage::Analyze));
        assert_eq!(harness.stub.calls(), vec!["probe"]);
        assert_eq!(harness.work_entries(), 0);

        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        assert!(last.unwrap().is_error());
    }

    #[tokio::test]
    async fn test_analyze_only() {
        let harness = Harness::new(Stub::new(12.5));
        let request = harness.request("clip.mp4").await;
        let output = harness
            .orchestrator()
            .analyze_only(request, CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(output.duration, 12.5);
        assert!(output.context.starts_with("=== SCENE BREAKDOWN ==="));
        assert_eq!(harness.stub.calls(), vec!["probe", "analyze"]);
        assert_eq!(harness.work_entries(), 0);
    }

    #[tokio::test]
    async fn test_prompt_only() {
        let harness = Harness::new(Stub::new(17.4));
        let request = harness.request("clip.mp4").await;
        let output = harness
            .orchestrator()
            .prompt_only(request, CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(output.tags, "Pop, 100 BPM");
        assert_eq!(output.negative_tags, "harsh");
        assert!(output.suno_prompt.contains("17.4"));
        assert_eq!(harness.stub.calls(), vec!["probe", "analyze", "compose"]);
        assert_eq!(harness.work_entries(), 0);
    }

    #[tokio::test]
    async fn test_partial_runs_honor_the_ceiling() {
        let harness = Harness::new(Stub::new(75.0));
        let request = harness.request("clip.mp4").await;
        let err = harness
            .orchestrator()
            .prompt_only(request, CancelSignal::never())
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(harness.stub.calls(), vec!["probe"]);
    }
}
