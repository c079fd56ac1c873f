use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Failed to resolve registry credentials of {image}, error: {source}"))]
    ResolveCredentials {
        image: String,
        #[snafu(source(from(crate::registry::Error, Box::new)))]
        source: Box<crate::registry::Error>,
    },

    #[snafu(display("Failed to serialize job payload, error: {source}"))]
    SerializePayload { source: serde_json::Error },

    #[snafu(display("Failed to create job secret, error: {source}"))]
    CreateSecret { source: crate::cluster::Error },

    #[snafu(display("Failed to create job, error: {source}"))]
    CreateJob { source: crate::cluster::Error },
}
