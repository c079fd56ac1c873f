//! Discovery of the container images running in the cluster.
//!
//! Images are keyed by their identity (registry, repository and digest) and
//! carry every pod container that runs them. A single pod may contribute to
//! several images and a single image may be referenced from pods in many
//! namespaces.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::core::v1::Pod;

use crate::{
    cluster::{self, ClusterApi},
    config::Config,
    ext::{ContainerImageStatus, PodExt},
};

/// A container of a pod that runs a given image.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PodReference {
    /// Pod name.
    pub name: String,
    pub namespace: String,
    /// Configured identifier of the cluster the pod runs in.
    pub cluster: String,
    /// Container running the image. Processed annotations are kept per
    /// container.
    pub container: String,
}

/// An image pull secret declared by a pod.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PullSecretRef {
    pub namespace: String,
    pub name: String,
}

/// A distinct image and everything running it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContainerImage {
    /// Image reference with the digest, as reported by the container runtime.
    pub image_id: String,
    /// Pod containers running the image, in discovery order.
    pub pods: Vec<PodReference>,
    /// Pull secrets declared by those pods, for credential lookup.
    pub pull_secrets: BTreeSet<PullSecretRef>,
}

impl ContainerImage {
    /// An image with no pods yet.
    pub fn new(image_id: impl Into<String>) -> Self {
        Self { image_id: image_id.into(), pods: Vec::new(), pull_secrets: BTreeSet::new() }
    }

    /// Records one more container running the image.
    fn add(&mut self, pod: PodReference, pull_secrets: &[PullSecretRef]) {
        if !self.pods.contains(&pod) {
            self.pods.push(pod);
        }
        self.pull_secrets.extend(pull_secrets.iter().cloned());
    }

    /// Splits the image id into the repository and its version, which is the
    /// digest when present, otherwise the tag.
    pub fn name_and_version(&self) -> (&str, &str) {
        if let Some((name, digest)) = self.image_id.split_once('@') {
            return (name, digest);
        }

        let name_start = self.image_id.rfind('/').map_or(0, |index| index + 1);
        match self.image_id[name_start..].rfind(':') {
            Some(index) => {
                let split = name_start + index;
                (&self.image_id[..split], &self.image_id[split + 1..])
            }
            None => (&self.image_id, "latest"),
        }
    }
}

/// The result of one discovery pass.
#[derive(Clone, Debug, Default)]
pub struct Inventory {
    /// Images with at least one container that still has to be catalogued,
    /// restricted to those containers.
    pub images: BTreeMap<String, ContainerImage>,

    /// Every running image with all of its containers.
    pub all_images: Vec<ContainerImage>,
}

/// Selects which pods are inventoried.
#[derive(Clone, Debug, Default)]
pub struct Discovery {
    /// Label selector of the namespaces to inventory. Empty selects all.
    pub namespace_selector: String,
    /// Label selector of the pods to inventory in each namespace.
    pub pod_selector: String,
    /// Recorded with every pod reference.
    pub cluster_id: String,
    /// Treat every image as pending.
    pub ignore_annotations: bool,
}

impl From<&Config> for Discovery {
    fn from(config: &Config) -> Self {
        Self {
            namespace_selector: config.namespace_label_selector.clone(),
            pod_selector: config.pod_label_selector.clone(),
            cluster_id: config.kubernetes_cluster_id.clone(),
            ignore_annotations: config.ignore_annotations,
        }
    }
}

impl Discovery {
    /// Lists the matching namespaces and their matching pods, then groups the
    /// running containers by image.
    ///
    /// # Errors
    ///
    /// Any listing failure is returned as is; nothing is retried.
    pub async fn discover<C: ClusterApi>(&self, cluster: &C) -> Result<Inventory, cluster::Error> {
        let namespaces = cluster.list_namespaces(&self.namespace_selector).await?;
        tracing::debug!("Discovered {} namespaces", namespaces.len());

        let mut pods = Vec::new();
        for namespace in &namespaces {
            pods.extend(cluster.list_pods(namespace, &self.pod_selector).await?);
        }

        let inventory = self.collect(pods);
        tracing::info!(
            namespaces = namespaces.len(),
            images = inventory.all_images.len(),
            pending = inventory.images.len(),
            "Discovered container images"
        );
        Ok(inventory)
    }

    /// Groups the containers of `pods` by image.
    ///
    /// Pods without a name or namespace are skipped, as are containers whose
    /// status reports no image id yet.
    pub fn collect(&self, pods: impl IntoIterator<Item = Pod>) -> Inventory {
        let mut pending = BTreeMap::new();
        let mut all = BTreeMap::new();

        for pod in pods {
            let (Some(name), Some(namespace)) = (&pod.metadata.name, &pod.metadata.namespace)
            else {
                continue;
            };
            let pull_secrets = pod
                .image_pull_secret_names()
                .into_iter()
                .map(|name| PullSecretRef { namespace: namespace.clone(), name })
                .collect::<Vec<_>>();

            for ContainerImageStatus { container, image_id } in pod.container_images() {
                let processed = !self.ignore_annotations
                    && pod.processed_image(&container) == Some(image_id.as_str());
                let reference = PodReference {
                    name: name.clone(),
                    namespace: namespace.clone(),
                    cluster: self.cluster_id.clone(),
                    container,
                };

                if !processed {
                    entry(&mut pending, &image_id).add(reference.clone(), &pull_secrets);
                }
                entry(&mut all, &image_id).add(reference, &pull_secrets);
            }
        }

        Inventory { images: pending, all_images: all.into_values().collect() }
    }
}

fn entry<'m>(
    images: &'m mut BTreeMap<String, ContainerImage>,
    image_id: &str,
) -> &'m mut ContainerImage {
    images.entry(image_id.to_string()).or_insert_with(|| ContainerImage::new(image_id))
}
