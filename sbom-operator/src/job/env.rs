use std::ffi::OsString;

use k8s_openapi::api::core::v1::EnvVar;

use crate::consts::JOB_ENV_PREFIX;

/// Picks the variables named `SBOM_JOB_<KEY>` and forwards them to the job as
/// `<KEY>`.
///
/// Keys are restricted to `[A-Za-z0-9-_.]`; values are cut at the first
/// character outside `[A-Za-z0-9-_.=]`.
pub fn forwarded_envs<I, K, V>(vars: I) -> Vec<EnvVar>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    vars.into_iter()
        .filter_map(|(key, value)| {
            let key = key.as_ref().strip_prefix(JOB_ENV_PREFIX)?;
            if key.is_empty() || !key.chars().all(is_key_char) {
                return None;
            }

            let value = value.as_ref();
            let end = value.find(|c: char| !is_value_char(c)).unwrap_or(value.len());
            Some(EnvVar {
                name: key.to_string(),
                value: Some(value[..end].to_string()),
                ..EnvVar::default()
            })
        })
        .collect()
}

/// Keeps the environment pairs whose key and value are both valid UTF-8.
pub fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

const fn is_key_char(c: char) -> bool { c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') }

const fn is_value_char(c: char) -> bool { is_key_char(c) || c == '=' }
