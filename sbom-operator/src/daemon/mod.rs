//! The scheduled control loop.
//!
//! Every cron tick triggers one run: discover the running images, catalogue
//! the ones not processed yet either in-process or through a delegated job,
//! then record the result on the pods. At most one run is in flight; a tick
//! that fires while a run is still going is dropped.

mod error;
mod guard;
mod schedule;

use std::{future::Future, pin::pin, sync::atomic::AtomicBool};

use chrono::Utc;
use futures::{StreamExt, stream::FuturesUnordered};
use snafu::ResultExt;

pub use self::error::Error;
use self::{guard::RunGuard, schedule::CronSchedule};
use crate::{
    cluster::{BatchApi, ClusterApi},
    inventory::{ContainerImage, Discovery, Inventory},
    job::JobController,
    registry::CredentialResolver,
    scanner::Scanner,
    sink::Sink,
};

/// How pending images are turned into SBOMs.
pub enum Execution<S, T, R> {
    /// Scan every image from the operator process and hand the SBOMs to the
    /// sinks, in order.
    InProcess { scanner: S, sinks: Vec<T> },

    /// Hand all pending images to one batch job.
    Delegated(JobController<R>),
}

/// What a completed run did.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunReport {
    /// Number of distinct images running in the selected pods.
    pub discovered: usize,

    /// Images catalogued during this run.
    pub processed: Vec<String>,

    /// Images that stay pending until the next run.
    pub skipped: Vec<String>,

    /// Pod containers annotated as processed.
    pub annotated_pods: usize,
}

/// Result of one trigger of the schedule.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RunOutcome {
    /// Another run was in flight.
    Skipped,
    /// The run went through; per-image failures are listed in the report.
    Completed(RunReport),
}

/// Drives discovery, SBOM generation and annotation on a cron schedule.
///
/// The orchestrator owns the run guard: at most one run executes at any time,
/// whatever the number of callers or ticks.
pub struct Orchestrator<C, S, T, R> {
    cluster: C,
    discovery: Discovery,
    execution: Execution<S, T, R>,
    running: AtomicBool,
}

impl<C, S, T, R> Orchestrator<C, S, T, R>
where
    C: ClusterApi + BatchApi,
    S: Scanner,
    T: Sink,
    R: CredentialResolver,
{
    /// Creates an orchestrator that is not running yet.
    pub const fn new(cluster: C, discovery: Discovery, execution: Execution<S, T, R>) -> Self {
        Self { cluster, discovery, execution, running: AtomicBool::new(false) }
    }

    /// Runs on every fire time of `schedule` until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the schedule cannot be parsed, or if a run fails in
    /// a way that the next tick cannot recover from. Other run failures are
    /// logged and retried on the next tick.
    pub async fn start<F>(&self, schedule: &str, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let schedule = CronSchedule::parse(schedule)?;
        self.validate_sinks()?;

        let mut last_fire = Utc::now();
        if let Some(next) = schedule.next_after(last_fire) {
            tracing::info!("Cron set to '{}', next run at {next}", schedule.expression());
        }

        let mut shutdown = pin!(shutdown);
        let mut runs = FuturesUnordered::new();
        loop {
            let Some(next) = schedule.next_after(last_fire.max(Utc::now())) else {
                tracing::warn!("Cron '{}' has no upcoming fire time", schedule.expression());
                break;
            };
            let delay = (next - Utc::now()).to_std().unwrap_or_default();

            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Shutting down, {} runs in flight are abandoned", runs.len());
                    break;
                }
                () = tokio::time::sleep(delay) => {
                    last_fire = next;
                    runs.push(self.run_once());
                }
                Some(result) = runs.next(), if !runs.is_empty() => {
                    match result {
                        Ok(RunOutcome::Completed(report)) => log_report(&report),
                        Ok(RunOutcome::Skipped) => {
                            tracing::info!("Previous run is still in progress, tick dropped");
                        }
                        Err(err) if err.is_fatal() => return Err(err),
                        Err(err) => tracing::error!("Run aborted, error: {err}"),
                    }
                    if let Some(next) = schedule.next_after(Utc::now()) {
                        tracing::info!("Next run at {next}");
                    }
                }
            }
        }

        Ok(())
    }

    /// Executes one run unless another run is in flight.
    ///
    /// # Errors
    ///
    /// Sink validation and initialization failures are fatal. Discovery and
    /// job submission failures abort the run. Failures that concern a single
    /// image, sink or pod are logged and do not fail the run.
    pub async fn run_once(&self) -> Result<RunOutcome, Error> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::debug!("A run is already in progress");
            return Ok(RunOutcome::Skipped);
        };
        tracing::info!("Starting run");

        if let Execution::InProcess { sinks, .. } = &self.execution {
            self.validate_sinks()?;
            for sink in sinks {
                sink.initialize()
                    .await
                    .with_context(|_| error::InitializeSinkSnafu { name: sink.name() })?;
            }
        }

        let inventory =
            self.discovery.discover(&self.cluster).await.context(error::DiscoverImagesSnafu)?;

        let report = match &self.execution {
            Execution::InProcess { scanner, sinks } => {
                self.run_in_process(scanner, sinks, &inventory).await
            }
            Execution::Delegated(controller) => self.run_delegated(controller, &inventory).await?,
        };

        Ok(RunOutcome::Completed(report))
    }

    /// Checks the settings of every in-process sink. Delegated runs have no
    /// sink in this process.
    fn validate_sinks(&self) -> Result<(), Error> {
        if let Execution::InProcess { sinks, .. } = &self.execution {
            for sink in sinks {
                sink.validate_config()
                    .with_context(|_| error::ValidateSinkSnafu { name: sink.name() })?;
            }
        }
        Ok(())
    }

    /// Scans the pending images one by one and hands each SBOM to every sink in
    /// configuration order. An image is annotated only when all sinks accepted
    /// it.
    async fn run_in_process(&self, scanner: &S, sinks: &[T], inventory: &Inventory) -> RunReport {
        let mut report =
            RunReport { discovered: inventory.all_images.len(), ..RunReport::default() };

        for image in inventory.images.values() {
            let sbom = match scanner.scan(image).await {
                Ok(sbom) => sbom,
                Err(err) => {
                    tracing::error!("Failed to scan {}, error: {err}", image.image_id);
                    report.skipped.push(image.image_id.clone());
                    continue;
                }
            };

            let mut failed = false;
            for sink in sinks {
                if let Err(err) = sink.process_sbom(image, &sbom).await {
                    tracing::error!(
                        "Target {} failed to process SBOM of {}, error: {err}",
                        sink.name(),
                        image.image_id
                    );
                    failed = true;
                }
            }

            if failed {
                report.skipped.push(image.image_id.clone());
            } else {
                report.annotated_pods += self.annotate(image).await;
                report.processed.push(image.image_id.clone());
            }
        }

        for sink in sinks {
            if let Err(err) = sink.cleanup(&inventory.all_images).await {
                tracing::error!("Target {} failed to clean up, error: {err}", sink.name());
            }
        }

        report
    }

    /// Submits one job for all pending images and waits for it. Annotations are
    /// all or nothing.
    async fn run_delegated(
        &self,
        controller: &JobController<R>,
        inventory: &Inventory,
    ) -> Result<RunReport, Error> {
        let mut report =
            RunReport { discovered: inventory.all_images.len(), ..RunReport::default() };
        let images = inventory.images.values().collect::<Vec<_>>();
        if images.is_empty() {
            tracing::info!("All images are processed, no job is needed");
            return Ok(report);
        }

        let handle =
            controller.submit(&self.cluster, &images).await.context(error::SubmitJobSnafu)?;
        let succeeded = controller.wait(&self.cluster, &handle).await;

        for image in images {
            if succeeded {
                report.annotated_pods += self.annotate(image).await;
                report.processed.push(image.image_id.clone());
            } else {
                report.skipped.push(image.image_id.clone());
            }
        }

        Ok(report)
    }

    /// Records `image` as processed on every pod container running it and
    /// returns how many annotations were written.
    async fn annotate(&self, image: &ContainerImage) -> usize {
        let mut annotated = 0;
        for pod in &image.pods {
            match self.cluster.annotate_pod(pod, &image.image_id).await {
                Ok(()) => annotated += 1,
                Err(err) => tracing::warn!("{err}"),
            }
        }
        annotated
    }
}

fn log_report(report: &RunReport) {
    tracing::info!(
        discovered = report.discovered,
        processed = report.processed.len(),
        skipped = report.skipped.len(),
        annotated_pods = report.annotated_pods,
        "Run finished"
    );
    for image in &report.skipped {
        tracing::debug!("{image} stays pending");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        job::{ImageConfig, JobOutcome, JobSettings},
        testing::{
            FailingResolver, FakeCluster, FakeScanner, Gate, RecordingSink, SinkEvent,
            StaticResolver, Timeline, docker_config_secret, pod, with_pull_secret,
        },
    };

    const NGINX: &str = "docker.io/library/nginx@sha256:aaa";
    const REDIS: &str = "docker.io/library/redis@sha256:bbb";

    type TestOrchestrator = Orchestrator<FakeCluster, FakeScanner, RecordingSink, StaticResolver>;

    /// Two namespaces, three pods, two distinct images.
    fn cluster() -> FakeCluster {
        FakeCluster::new(["team-a", "team-b"], vec![
            pod("team-a", "web-1", &[("nginx", NGINX)]),
            pod("team-a", "cache-1", &[("redis", REDIS)]),
            pod("team-b", "web-2", &[("nginx", NGINX)]),
        ])
    }

    fn in_process(
        cluster: &FakeCluster,
        scanner: &FakeScanner,
        sinks: &[RecordingSink],
    ) -> TestOrchestrator {
        Orchestrator::new(cluster.clone(), Discovery::default(), Execution::InProcess {
            scanner: scanner.clone(),
            sinks: sinks.to_vec(),
        })
    }

    fn delegated(cluster: &FakeCluster) -> TestOrchestrator {
        let settings = JobSettings::new("ghcr.io/org/sbom-job:1.0", "sbom");
        Orchestrator::new(
            cluster.clone(),
            Discovery::default(),
            Execution::Delegated(JobController::new(StaticResolver, settings)),
        )
    }

    fn completed(outcome: RunOutcome) -> RunReport {
        match outcome {
            RunOutcome::Completed(report) => report,
            RunOutcome::Skipped => panic!("run was skipped"),
        }
    }

    #[tokio::test]
    async fn test_run_catalogues_every_image_once() {
        let cluster = cluster();
        let sink = RecordingSink::new("recording");
        let orchestrator = in_process(&cluster, &FakeScanner::default(), &[sink.clone()]);

        let report = completed(orchestrator.run_once().await.unwrap());

        assert_eq!(report.discovered, 2);
        assert_eq!(report.annotated_pods, 3);
        assert_eq!(sink.events(), vec![
            SinkEvent::Initialize,
            SinkEvent::Process(NGINX.to_string()),
            SinkEvent::Process(REDIS.to_string()),
            SinkEvent::Cleanup(vec![NGINX.to_string(), REDIS.to_string()]),
        ]);
        let mut annotated = cluster.annotated_pods();
        annotated.sort();
        assert_eq!(annotated, vec!["team-a/cache-1", "team-a/web-1", "team-b/web-2"]);
        assert!(
            cluster.annotations().iter().all(|(pod, image_id)| match pod.container.as_str() {
                "nginx" => image_id == NGINX,
                _ => image_id == REDIS,
            })
        );
    }

    #[tokio::test]
    async fn test_scan_failure_skips_only_that_image() {
        let cluster = cluster();
        let scanner = FakeScanner::failing_for(NGINX);
        let sink = RecordingSink::new("recording");
        let orchestrator = in_process(&cluster, &scanner, &[sink.clone()]);

        let report = completed(orchestrator.run_once().await.unwrap());

        assert_eq!(scanner.scanned(), vec![NGINX, REDIS]);
        assert_eq!(report.processed, vec![REDIS]);
        assert_eq!(report.skipped, vec![NGINX]);
        assert_eq!(sink.processed(), vec![REDIS]);
        assert_eq!(cluster.annotated_pods(), vec!["team-a/cache-1"]);
        assert_eq!(sink.cleanups(), vec![vec![NGINX.to_string(), REDIS.to_string()]]);
    }

    #[tokio::test]
    async fn test_sink_failure_withholds_annotations_only() {
        let cluster = cluster();
        let failing = RecordingSink::new("failing").failing_for(NGINX);
        let healthy = RecordingSink::new("healthy");
        let orchestrator =
            in_process(&cluster, &FakeScanner::default(), &[failing.clone(), healthy.clone()]);

        let report = completed(orchestrator.run_once().await.unwrap());

        assert_eq!(failing.processed(), vec![NGINX, REDIS]);
        assert_eq!(healthy.processed(), vec![NGINX, REDIS]);
        assert_eq!(report.skipped, vec![NGINX]);
        assert_eq!(cluster.annotated_pods(), vec!["team-a/cache-1"]);
        assert_eq!(healthy.cleanups().len(), 1);
    }

    #[tokio::test]
    async fn test_sinks_run_in_order_before_annotations() {
        let timeline = Timeline::default();
        let cluster = cluster().recording_to(timeline.clone());
        let first = RecordingSink::new("first").failing_for(REDIS).recording_to(timeline.clone());
        let second = RecordingSink::new("second").recording_to(timeline.clone());
        let orchestrator = in_process(&cluster, &FakeScanner::default(), &[first, second]);

        let report = completed(orchestrator.run_once().await.unwrap());

        assert_eq!(report.processed, vec![NGINX]);
        assert_eq!(timeline.entries(), vec![
            "first initialize".to_string(),
            "second initialize".to_string(),
            format!("first process {NGINX}"),
            format!("second process {NGINX}"),
            "annotate team-a/web-1".to_string(),
            "annotate team-b/web-2".to_string(),
            format!("first process {REDIS}"),
            format!("second process {REDIS}"),
            "first cleanup".to_string(),
            "second cleanup".to_string(),
        ]);
    }

    #[tokio::test]
    async fn test_annotation_failure_is_isolated() {
        let cluster = cluster().failing_annotation("web-1");
        let orchestrator =
            in_process(&cluster, &FakeScanner::default(), &[RecordingSink::new("recording")]);

        let report = completed(orchestrator.run_once().await.unwrap());

        assert_eq!(report.processed, vec![NGINX, REDIS]);
        assert_eq!(report.annotated_pods, 2);
    }

    #[tokio::test]
    async fn test_tick_during_run_is_dropped() {
        let cluster = cluster();
        let gate = Gate::default();
        let scanner = FakeScanner::gated(gate.clone());
        let orchestrator = in_process(&cluster, &scanner, &[RecordingSink::new("recording")]);

        let first = orchestrator.run_once();
        let second = async {
            gate.entered.notified().await;
            let outcome = orchestrator.run_once().await;
            gate.release.notify_one();
            gate.entered.notified().await;
            gate.release.notify_one();
            outcome
        };
        let (first, second) = tokio::join!(first, second);

        assert!(matches!(first, Ok(RunOutcome::Completed(_))));
        assert!(matches!(second, Ok(RunOutcome::Skipped)));
        assert_eq!(cluster.namespace_listings(), 1);
        assert_eq!(scanner.scanned().len(), 2);
    }

    #[tokio::test]
    async fn test_guard_is_cleared_after_failed_run() {
        let cluster = cluster().failing_listing();
        let orchestrator =
            in_process(&cluster, &FakeScanner::default(), &[RecordingSink::new("recording")]);

        let first = orchestrator.run_once().await;
        let second = orchestrator.run_once().await;

        assert!(matches!(&first, Err(err @ Error::DiscoverImages { .. }) if !err.is_fatal()));
        assert!(matches!(second, Err(Error::DiscoverImages { .. })));
        assert_eq!(cluster.namespace_listings(), 2);
    }

    #[tokio::test]
    async fn test_sink_initialization_failure_is_fatal() {
        let cluster = cluster();
        let orchestrator = in_process(&cluster, &FakeScanner::default(), &[
            RecordingSink::new("recording").failing_initialize(),
        ]);

        let result = orchestrator.run_once().await;

        assert!(matches!(&result, Err(err @ Error::InitializeSink { .. }) if err.is_fatal()));
        assert_eq!(cluster.namespace_listings(), 0);
    }

    #[tokio::test]
    async fn test_delegated_success_annotates_all_pods() {
        let cluster = FakeCluster::new(["team-a", "team-b"], vec![
            with_pull_secret(pod("team-a", "web-1", &[("nginx", NGINX)]), "hub"),
            pod("team-a", "cache-1", &[("redis", REDIS)]),
            pod("team-b", "web-2", &[("nginx", NGINX)]),
        ])
        .with_job_outcomes([JobOutcome::Succeeded]);
        let orchestrator = delegated(&cluster);

        let report = completed(orchestrator.run_once().await.unwrap());

        assert_eq!(cluster.applied_jobs().len(), 1);
        assert_eq!(cluster.job_polls(), 1);
        assert_eq!(report.processed, vec![NGINX, REDIS]);
        assert_eq!(report.annotated_pods, 3);

        let secrets = cluster.applied_secrets();
        let payload = &secrets[0].string_data.as_ref().unwrap()["image-config.json"];
        let configs: Vec<ImageConfig> = serde_json::from_str(payload).unwrap();
        assert_eq!(configs.iter().map(|config| config.image.as_str()).collect::<Vec<_>>(), vec![
            NGINX, REDIS
        ]);
        assert_eq!(configs[0].pods.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delegated_failure_annotates_nothing() {
        let cluster = cluster().with_job_outcomes([JobOutcome::Running, JobOutcome::Failed]);
        let orchestrator = delegated(&cluster);

        let report = completed(orchestrator.run_once().await.unwrap());

        assert!(cluster.annotations().is_empty());
        assert_eq!(report.skipped, vec![NGINX, REDIS]);
    }

    #[tokio::test]
    async fn test_delegated_submit_failure_aborts_run() {
        let cluster = cluster();
        let settings = JobSettings::new("ghcr.io/org/sbom-job:1.0", "sbom");
        let orchestrator: Orchestrator<FakeCluster, FakeScanner, RecordingSink, FailingResolver> =
            Orchestrator::new(
                cluster.clone(),
                Discovery::default(),
                Execution::Delegated(JobController::new(FailingResolver, settings)),
            );

        let first = orchestrator.run_once().await;
        let second = orchestrator.run_once().await;

        assert!(matches!(&first, Err(err @ Error::SubmitJob { .. }) if !err.is_fatal()));
        assert!(matches!(second, Err(Error::SubmitJob { .. })));
        assert_eq!(cluster.namespace_listings(), 2);
        assert!(cluster.annotations().is_empty());
        assert!(cluster.applied_secrets().is_empty());
        assert!(cluster.applied_jobs().is_empty());
    }

    #[tokio::test]
    async fn test_delegated_without_pending_images_creates_no_job() {
        let cluster = FakeCluster::new(["team-a"], Vec::new())
            .with_secret(docker_config_secret("team-a", "hub", "{}"));
        let orchestrator = delegated(&cluster);

        let report = completed(orchestrator.run_once().await.unwrap());

        assert_eq!(report, RunReport::default());
        assert!(cluster.applied_secrets().is_empty());
        assert!(cluster.applied_jobs().is_empty());
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_schedule() {
        let orchestrator = in_process(&cluster(), &FakeScanner::default(), &[
            RecordingSink::new("recording"),
        ]);

        let result = orchestrator.start("not a schedule", std::future::pending()).await;

        assert!(matches!(&result, Err(err @ Error::InvalidSchedule { .. }) if err.is_fatal()));
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_sink() {
        let orchestrator = in_process(&cluster(), &FakeScanner::default(), &[
            RecordingSink::new("recording").invalid(),
        ]);

        let result = orchestrator.start("0 30 * * * *", std::future::pending()).await;

        assert!(matches!(result, Err(Error::ValidateSink { .. })));
    }

    #[tokio::test]
    async fn test_start_runs_until_shutdown() {
        let cluster = cluster();
        let sink = RecordingSink::new("recording");
        let orchestrator = in_process(&cluster, &FakeScanner::default(), &[sink.clone()]);

        let result = orchestrator
            .start("* * * * * *", tokio::time::sleep(Duration::from_millis(2500)))
            .await;

        assert!(result.is_ok());
        assert!(cluster.namespace_listings() >= 1);
        assert!(sink.events().contains(&SinkEvent::Initialize));
    }
}
