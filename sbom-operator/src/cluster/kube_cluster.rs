//! Cluster access backed by a live Kubernetes API server.

use std::collections::BTreeMap;

use k8s_openapi::api::{
    batch::v1::Job,
    core::v1::{Namespace, Pod, Secret},
};
use kube::{
    Api, ResourceExt,
    api::{ListParams, Patch, PatchParams},
};
use sbom_operator_base::consts::k8s::annotations;
use snafu::ResultExt;

use super::{BatchApi, ClusterApi, Error, error};
use crate::{consts::FIELD_MANAGER, ext::JobExt, inventory::PodReference, job::JobOutcome};

/// [`ClusterApi`] and [`BatchApi`] backed by a live Kubernetes API server.
#[derive(Clone)]
pub struct KubeCluster {
    client: kube::Client,
}

impl From<kube::Client> for KubeCluster {
    fn from(client: kube::Client) -> Self { Self { client } }
}

impl KubeCluster {
    /// Namespace of the client's kubeconfig context or service account.
    pub fn default_namespace(&self) -> &str { self.client.default_namespace() }
}

/// An empty selector is sent as no selector at all.
fn list_params(label_selector: &str) -> ListParams {
    ListParams {
        label_selector: (!label_selector.is_empty()).then(|| label_selector.to_string()),
        ..ListParams::default()
    }
}

impl ClusterApi for KubeCluster {
    async fn list_namespaces(&self, label_selector: &str) -> Result<Vec<String>, Error> {
        let namespaces = Api::<Namespace>::all(self.client.clone())
            .list(&list_params(label_selector))
            .await
            .with_context(|_| error::ListNamespacesSnafu {
                label_selector: label_selector.to_string(),
            })?;

        Ok(namespaces.into_iter().map(|namespace| namespace.name_any()).collect())
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, Error> {
        let pods = Api::<Pod>::namespaced(self.client.clone(), namespace)
            .list(&list_params(label_selector))
            .await
            .with_context(|_| error::ListPodsSnafu { namespace: namespace.to_string() })?;

        Ok(pods.items)
    }

    async fn annotate_pod(&self, pod: &PodReference, image_id: &str) -> Result<(), Error> {
        let annotations =
            BTreeMap::from([(annotations::processed_key(&pod.container), image_id.to_string())]);
        let patch = serde_json::json!({ "metadata": { "annotations": annotations } });

        let _pod = Api::<Pod>::namespaced(self.client.clone(), &pod.namespace)
            .patch(&pod.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .with_context(|_| error::AnnotatePodSnafu {
                namespace: pod.namespace.clone(),
                pod_name: pod.name.clone(),
            })?;

        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        Api::<Secret>::namespaced(self.client.clone(), namespace).get_opt(name).await.with_context(
            |_| error::GetSecretSnafu { namespace: namespace.to_string(), name: name.to_string() },
        )
    }
}

impl BatchApi for KubeCluster {
    async fn apply_secret(&self, namespace: &str, secret: &Secret) -> Result<(), Error> {
        let name = secret.name_any();
        let _secret = Api::<Secret>::namespaced(self.client.clone(), namespace)
            .patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(secret))
            .await
            .with_context(|_| error::ApplySecretSnafu {
                namespace: namespace.to_string(),
                name: name.clone(),
            })?;

        Ok(())
    }

    async fn apply_job(&self, namespace: &str, job: &Job) -> Result<(), Error> {
        let name = job.name_any();
        let _job = Api::<Job>::namespaced(self.client.clone(), namespace)
            .patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(job))
            .await
            .with_context(|_| error::ApplyJobSnafu {
                namespace: namespace.to_string(),
                name: name.clone(),
            })?;

        Ok(())
    }

    async fn job_outcome(&self, namespace: &str, name: &str) -> Result<JobOutcome, Error> {
        let job = Api::<Job>::namespaced(self.client.clone(), namespace)
            .get(name)
            .await
            .with_context(|_| error::GetJobSnafu {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;

        Ok(job.outcome())
    }
}
