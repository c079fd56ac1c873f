use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Failed to read pull secret {name} in namespace {namespace}, error: {source}"))]
    GetPullSecret { namespace: String, name: String, source: crate::cluster::Error },

    #[snafu(display(
        "Failed to parse docker config of pull secret {name} in namespace {namespace}, error: \
         {source}"
    ))]
    ParseDockerConfig { namespace: String, name: String, source: serde_json::Error },

    #[snafu(display(
        "Failed to decode registry auth of pull secret {name} in namespace {namespace}, error: \
         {source}"
    ))]
    DecodeAuth { namespace: String, name: String, source: base64::DecodeError },

    #[snafu(display(
        "Registry auth of pull secret {name} in namespace {namespace} is not 'user:password'"
    ))]
    MalformedAuth { namespace: String, name: String },
}
