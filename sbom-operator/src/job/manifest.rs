//! Builds the Kubernetes `Job` and `Secret` for a delegated scan.

use std::collections::BTreeMap;

use k8s_openapi::api::{
    batch::v1::{Job, JobSpec},
    core::v1::{
        Container, LocalObjectReference, PodSpec, PodTemplateSpec, Secret,
        SecretVolumeSource, Volume, VolumeMount,
    },
};
use kube::api::ObjectMeta;
use sbom_operator_base::{PROJECT_NAME, consts::k8s::labels};

use super::JobSettings;
use crate::consts::{
    JOB_CONFIG_KEY, JOB_CONFIG_MOUNT_PATH, JOB_CONFIG_VOLUME, JOB_CONTAINER_NAME, JOB_NAME,
    JOB_SECRET_NAME,
};

const COMPONENT: &str = "scan-job";

/// Name of the payload secret of the job with `suffix`.
pub fn secret_name(suffix: &str) -> String { format!("{JOB_SECRET_NAME}-{suffix}") }

/// Name of the job with `suffix`.
pub fn job_name(suffix: &str) -> String { format!("{JOB_NAME}-{suffix}") }

/// Metadata shared by the secret and the job, labelled as managed by the
/// operator.
fn metadata(name: String, namespace: &str) -> ObjectMeta {
    let labels = BTreeMap::from_iter([
        (labels::NAME.to_string(), JOB_NAME.to_string()),
        (labels::MANAGED_BY.to_string(), PROJECT_NAME.to_string()),
        (labels::COMPONENT.to_string(), COMPONENT.to_string()),
    ]);

    ObjectMeta {
        name: Some(name),
        namespace: Some(namespace.to_string()),
        labels: Some(labels),
        ..ObjectMeta::default()
    }
}

/// The secret holding `payload` under the key the job reads it from.
pub fn build_secret(suffix: &str, namespace: &str, payload: String) -> Secret {
    Secret {
        metadata: metadata(secret_name(suffix), namespace),
        string_data: Some(BTreeMap::from([(JOB_CONFIG_KEY.to_string(), payload)])),
        ..Secret::default()
    }
}

/// The scan job: one pod that never restarts, with no retries, the payload
/// secret mounted and the forwarded environment set.
pub fn build_job(suffix: &str, settings: &JobSettings) -> Job {
    let image_pull_secrets = settings
        .image_pull_secret
        .as_ref()
        .filter(|name| !name.is_empty())
        .map(|name| vec![LocalObjectReference { name: name.clone() }]);

    Job {
        metadata: metadata(job_name(suffix), &settings.namespace),
        spec: Some(JobSpec {
            backoff_limit: Some(0),
            active_deadline_seconds: Some(
                i64::try_from(settings.timeout.as_secs()).unwrap_or(i64::MAX),
            ),
            template: PodTemplateSpec {
                metadata: Some(metadata(job_name(suffix), &settings.namespace)),
                spec: Some(PodSpec {
                    restart_policy: Some("Never".to_string()),
                    image_pull_secrets,
                    containers: vec![Container {
                        name: JOB_CONTAINER_NAME.to_string(),
                        image: Some(settings.image.clone()),
                        env: (!settings.env.is_empty()).then(|| settings.env.clone()),
                        volume_mounts: Some(vec![VolumeMount {
                            name: JOB_CONFIG_VOLUME.to_string(),
                            mount_path: JOB_CONFIG_MOUNT_PATH.to_string(),
                            read_only: Some(true),
                            ..VolumeMount::default()
                        }]),
                        ..Container::default()
                    }],
                    volumes: Some(vec![Volume {
                        name: JOB_CONFIG_VOLUME.to_string(),
                        secret: Some(SecretVolumeSource {
                            secret_name: Some(secret_name(suffix)),
                            ..SecretVolumeSource::default()
                        }),
                        ..Volume::default()
                    }]),
                    ..PodSpec::default()
                }),
            },
            ..JobSpec::default()
        }),
        ..Job::default()
    }
}
