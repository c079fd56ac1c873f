//! In-memory stand-ins for the cluster, the scanner, the sinks and the
//! credential resolver.

use std::{
    collections::{BTreeMap, VecDeque},
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use k8s_openapi::{
    ByteString,
    api::{
        batch::v1::Job,
        core::v1::{ContainerStatus, LocalObjectReference, Pod, PodSpec, PodStatus, Secret},
    },
};
use kube::api::ObjectMeta;
use sbom_operator_base::consts::k8s::annotations;
use tokio::sync::Notify;

use crate::{
    cluster::{self, BatchApi, ClusterApi},
    config::SbomFormat,
    inventory::{ContainerImage, PodReference},
    job::JobOutcome,
    registry::{self, CredentialResolver, RegistryCredentials, registry_host},
    scanner::{self, Sbom, Scanner},
    sink::{self, Sink},
};

fn injected_failure() -> Box<kube::Error> {
    Box::new(kube::Error::Service("injected failure".into()))
}

/// A pod in `namespace` whose containers run the given `(container, image id)`
/// pairs.
pub fn pod(namespace: &str, name: &str, containers: &[(&str, &str)]) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        spec: Some(PodSpec::default()),
        status: Some(PodStatus {
            container_statuses: Some(
                containers
                    .iter()
                    .map(|(container, image_id)| ContainerStatus {
                        name: (*container).to_string(),
                        image: (*image_id).to_string(),
                        image_id: (*image_id).to_string(),
                        ..ContainerStatus::default()
                    })
                    .collect(),
            ),
            ..PodStatus::default()
        }),
    }
}

/// A single-container pod already annotated as processed for `image_id`.
pub fn processed_pod(namespace: &str, name: &str, container: &str, image_id: &str) -> Pod {
    let mut pod = pod(namespace, name, &[(container, image_id)]);
    pod.metadata.annotations =
        Some(BTreeMap::from([(annotations::processed_key(container), image_id.to_string())]));
    pod
}

pub fn with_pull_secret(mut pod: Pod, secret: &str) -> Pod {
    if let Some(spec) = pod.spec.as_mut() {
        spec.image_pull_secrets = Some(vec![LocalObjectReference { name: secret.to_string() }]);
    }
    pod
}

pub fn docker_config_secret(namespace: &str, name: &str, content: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        type_: Some("kubernetes.io/dockerconfigjson".to_string()),
        data: Some(BTreeMap::from([(
            ".dockerconfigjson".to_string(),
            ByteString(content.as_bytes().to_vec()),
        )])),
        ..Secret::default()
    }
}

/// A log shared by several fakes, to observe how their calls interleave.
#[derive(Clone, Default)]
pub struct Timeline(Arc<Mutex<Vec<String>>>);

impl Timeline {
    fn record(&self, entry: String) { self.0.lock().unwrap().push(entry); }

    pub fn entries(&self) -> Vec<String> { self.0.lock().unwrap().clone() }
}

#[derive(Default)]
struct Records {
    annotations: Mutex<Vec<(PodReference, String)>>,
    secrets: Mutex<Vec<Secret>>,
    jobs: Mutex<Vec<Job>>,
    job_outcomes: Mutex<VecDeque<JobOutcome>>,
    job_polls: AtomicUsize,
    namespace_listings: AtomicUsize,
}

/// A cluster backed by fixed namespaces, pods and secrets. Clones share what
/// they record.
#[derive(Clone, Default)]
pub struct FakeCluster {
    namespaces: Vec<String>,
    pods: Vec<Pod>,
    secrets: Vec<Secret>,
    failing_listing: bool,
    failing_annotations: Vec<String>,
    timeline: Option<Timeline>,
    records: Arc<Records>,
}

impl FakeCluster {
    pub fn new<const N: usize>(namespaces: [&str; N], pods: Vec<Pod>) -> Self {
        Self {
            namespaces: namespaces.iter().map(ToString::to_string).collect(),
            pods,
            ..Self::default()
        }
    }

    pub fn failing_listing(self) -> Self { Self { failing_listing: true, ..self } }

    /// Annotating pod `name` fails.
    pub fn failing_annotation(mut self, name: &str) -> Self {
        self.failing_annotations.push(name.to_string());
        self
    }

    /// Successful annotations are also logged to `timeline`.
    pub fn recording_to(self, timeline: Timeline) -> Self {
        Self { timeline: Some(timeline), ..self }
    }

    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secrets.push(secret);
        self
    }

    /// Outcomes returned by successive job status reads. Reads past the last
    /// one fail.
    pub fn with_job_outcomes(self, outcomes: impl IntoIterator<Item = JobOutcome>) -> Self {
        self.records.job_outcomes.lock().unwrap().extend(outcomes);
        self
    }

    pub fn annotations(&self) -> Vec<(PodReference, String)> {
        self.records.annotations.lock().unwrap().clone()
    }

    /// `namespace/pod` of every annotated pod, in annotation order.
    pub fn annotated_pods(&self) -> Vec<String> {
        self.annotations()
            .into_iter()
            .map(|(pod, _image_id)| format!("{}/{}", pod.namespace, pod.name))
            .collect()
    }

    pub fn applied_secrets(&self) -> Vec<Secret> { self.records.secrets.lock().unwrap().clone() }

    pub fn applied_jobs(&self) -> Vec<Job> { self.records.jobs.lock().unwrap().clone() }

    pub fn job_polls(&self) -> usize { self.records.job_polls.load(Ordering::SeqCst) }

    pub fn namespace_listings(&self) -> usize {
        self.records.namespace_listings.load(Ordering::SeqCst)
    }
}

impl ClusterApi for FakeCluster {
    async fn list_namespaces(&self, label_selector: &str) -> Result<Vec<String>, cluster::Error> {
        let _listings = self.records.namespace_listings.fetch_add(1, Ordering::SeqCst);
        if self.failing_listing {
            return Err(cluster::Error::ListNamespaces {
                label_selector: label_selector.to_string(),
                source: injected_failure(),
            });
        }
        Ok(self.namespaces.clone())
    }

    async fn list_pods(
        &self,
        namespace: &str,
        _label_selector: &str,
    ) -> Result<Vec<Pod>, cluster::Error> {
        Ok(self
            .pods
            .iter()
            .filter(|pod| pod.metadata.namespace.as_deref() == Some(namespace))
            .cloned()
            .collect())
    }

    async fn annotate_pod(&self, pod: &PodReference, image_id: &str) -> Result<(), cluster::Error> {
        if self.failing_annotations.contains(&pod.name) {
            return Err(cluster::Error::AnnotatePod {
                namespace: pod.namespace.clone(),
                pod_name: pod.name.clone(),
                source: injected_failure(),
            });
        }
        if let Some(timeline) = &self.timeline {
            timeline.record(format!("annotate {}/{}", pod.namespace, pod.name));
        }
        self.records.annotations.lock().unwrap().push((pod.clone(), image_id.to_string()));
        Ok(())
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>, cluster::Error> {
        Ok(self
            .secrets
            .iter()
            .find(|secret| {
                secret.metadata.namespace.as_deref() == Some(namespace)
                    && secret.metadata.name.as_deref() == Some(name)
            })
            .cloned())
    }
}

impl BatchApi for FakeCluster {
    async fn apply_secret(&self, _namespace: &str, secret: &Secret) -> Result<(), cluster::Error> {
        self.records.secrets.lock().unwrap().push(secret.clone());
        Ok(())
    }

    async fn apply_job(&self, _namespace: &str, job: &Job) -> Result<(), cluster::Error> {
        self.records.jobs.lock().unwrap().push(job.clone());
        Ok(())
    }

    async fn job_outcome(&self, namespace: &str, name: &str) -> Result<JobOutcome, cluster::Error> {
        let _polls = self.records.job_polls.fetch_add(1, Ordering::SeqCst);
        self.records.job_outcomes.lock().unwrap().pop_front().ok_or_else(|| {
            cluster::Error::GetJob {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source: injected_failure(),
            }
        })
    }
}

/// Resolves every image to anonymous access on its registry.
pub struct StaticResolver;

impl CredentialResolver for StaticResolver {
    async fn resolve(
        &self,
        image: &ContainerImage,
    ) -> Result<RegistryCredentials, registry::Error> {
        Ok(RegistryCredentials::anonymous(registry_host(&image.image_id)))
    }
}

pub struct FailingResolver;

impl CredentialResolver for FailingResolver {
    async fn resolve(
        &self,
        _image: &ContainerImage,
    ) -> Result<RegistryCredentials, registry::Error> {
        Err(registry::Error::MalformedAuth {
            namespace: "team-a".to_string(),
            name: "broken".to_string(),
        })
    }
}

/// Lets a test observe that a scan started and decide when it finishes.
#[derive(Clone, Default)]
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[derive(Clone, Default)]
pub struct FakeScanner {
    failing: Vec<String>,
    gate: Option<Gate>,
    scanned: Arc<Mutex<Vec<String>>>,
}

impl FakeScanner {
    pub fn failing_for(image_id: &str) -> Self {
        Self { failing: vec![image_id.to_string()], ..Self::default() }
    }

    pub fn gated(gate: Gate) -> Self { Self { gate: Some(gate), ..Self::default() } }

    pub fn scanned(&self) -> Vec<String> { self.scanned.lock().unwrap().clone() }
}

impl Scanner for FakeScanner {
    async fn scan(&self, image: &ContainerImage) -> Result<Sbom, scanner::Error> {
        self.scanned.lock().unwrap().push(image.image_id.clone());
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if self.failing.contains(&image.image_id) {
            return Err(scanner::Error::SpawnScanner {
                syft_path: PathBuf::from("syft"),
                source: std::io::Error::other("injected failure"),
            });
        }
        Ok(Sbom {
            format: SbomFormat::Json,
            content: format!("sbom of {}", image.image_id).into_bytes(),
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SinkEvent {
    Initialize,
    Process(String),
    Cleanup(Vec<String>),
}

/// A sink that records every call it receives.
#[derive(Clone)]
pub struct RecordingSink {
    name: &'static str,
    invalid: bool,
    failing_initialize: bool,
    failing_for: Vec<String>,
    events: Arc<Mutex<Vec<SinkEvent>>>,
    timeline: Option<Timeline>,
}

impl RecordingSink {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            invalid: false,
            failing_initialize: false,
            failing_for: Vec::new(),
            events: Arc::default(),
            timeline: None,
        }
    }

    /// Every call is also logged to `timeline`, prefixed with the sink name.
    pub fn recording_to(self, timeline: Timeline) -> Self {
        Self { timeline: Some(timeline), ..self }
    }

    fn push(&self, event: SinkEvent) {
        if let Some(timeline) = &self.timeline {
            let entry = match &event {
                SinkEvent::Initialize => "initialize".to_string(),
                SinkEvent::Process(image_id) => format!("process {image_id}"),
                SinkEvent::Cleanup(_) => "cleanup".to_string(),
            };
            timeline.record(format!("{} {entry}", self.name));
        }
        self.events.lock().unwrap().push(event);
    }

    pub fn invalid(self) -> Self { Self { invalid: true, ..self } }

    pub fn failing_initialize(self) -> Self { Self { failing_initialize: true, ..self } }

    pub fn failing_for(mut self, image_id: &str) -> Self {
        self.failing_for.push(image_id.to_string());
        self
    }

    pub fn events(&self) -> Vec<SinkEvent> { self.events.lock().unwrap().clone() }

    pub fn processed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Process(image_id) => Some(image_id),
                _ => None,
            })
            .collect()
    }

    pub fn cleanups(&self) -> Vec<Vec<String>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Cleanup(images) => Some(images),
                _ => None,
            })
            .collect()
    }
}

impl Sink for RecordingSink {
    fn name(&self) -> &str { self.name }

    fn validate_config(&self) -> Result<(), sink::Error> {
        if self.invalid {
            return Err(sink::Error::MissingConfig { target: self.name, key: "endpoint" });
        }
        Ok(())
    }

    async fn initialize(&self) -> Result<(), sink::Error> {
        self.push(SinkEvent::Initialize);
        if self.failing_initialize {
            return Err(sink::Error::SpawnGit { source: std::io::Error::other("injected failure") });
        }
        Ok(())
    }

    async fn process_sbom(&self, image: &ContainerImage, _sbom: &Sbom) -> Result<(), sink::Error> {
        self.push(SinkEvent::Process(image.image_id.clone()));
        if self.failing_for.contains(&image.image_id) {
            return Err(sink::Error::UploadRejected {
                image: image.image_id.clone(),
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: String::new(),
            });
        }
        Ok(())
    }

    async fn cleanup(&self, all_images: &[ContainerImage]) -> Result<(), sink::Error> {
        let images = all_images.iter().map(|image| image.image_id.clone()).collect();
        self.push(SinkEvent::Cleanup(images));
        Ok(())
    }
}
