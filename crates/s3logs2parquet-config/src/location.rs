//! `s3://bucket/prefix` and local directory locations.

use anyhow::{anyhow, bail, Result};
use url::Url;

/// A storage location given as a URI in the environment (`RESULT_PATH`,
/// `S3_LOGS_LOCATION`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectLocation {
    S3 {
        bucket: String,
        /// Key prefix, always ending in `/` when present
        prefix: Option<String>,
    },
    Local(String),
}

impl ObjectLocation {
    /// Parse `s3://bucket/some/prefix` (also `s3a://`) or a filesystem path.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            bail!("location must not be empty");
        }

        if !raw.contains("://") {
            return Ok(ObjectLocation::Local(raw.to_string()));
        }

        let url = Url::parse(raw).map_err(|e| anyhow!("invalid location '{}': {}", raw, e))?;
        match url.scheme() {
            "s3" | "s3a" => {
                let bucket = url
                    .host_str()
                    .filter(|b| !b.is_empty())
                    .ok_or_else(|| anyhow!("location '{}' is missing a bucket name", raw))?
                    .to_string();
                let key = url.path().trim_matches('/');
                let prefix = if key.is_empty() {
                    None
                } else {
                    Some(format!("{}/", key))
                };
                Ok(ObjectLocation::S3 { bucket, prefix })
            }
            "file" => Ok(ObjectLocation::Local(url.path().to_string())),
            other => bail!(
                "unsupported location scheme '{}' in '{}'. Use s3://bucket/prefix or a local path",
                other,
                raw
            ),
        }
    }

    /// Render back to a URI (`s3://bucket/prefix/`) or path.
    pub fn uri(&self) -> String {
        match self {
            ObjectLocation::S3 { bucket, prefix } => {
                format!("s3://{}/{}", bucket, prefix.as_deref().unwrap_or(""))
            }
            ObjectLocation::Local(path) => path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_and_prefix() {
        let loc = ObjectLocation::parse("s3://my-logs/access/2024").unwrap();
        assert_eq!(
            loc,
            ObjectLocation::S3 {
                bucket: "my-logs".to_string(),
                prefix: Some("access/2024/".to_string()),
            }
        );
        assert_eq!(loc.uri(), "s3://my-logs/access/2024/");
    }

    #[test]
    fn bucket_only_has_no_prefix() {
        let loc = ObjectLocation::parse("s3://results/").unwrap();
        assert_eq!(
            loc,
            ObjectLocation::S3 {
                bucket: "results".to_string(),
                prefix: None,
            }
        );
    }

    #[test]
    fn plain_paths_are_local() {
        assert_eq!(
            ObjectLocation::parse("./out").unwrap(),
            ObjectLocation::Local("./out".to_string())
        );
        assert_eq!(
            ObjectLocation::parse("file:///var/data").unwrap(),
            ObjectLocation::Local("/var/data".to_string())
        );
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(ObjectLocation::parse("gs://bucket/x").is_err());
        assert!(ObjectLocation::parse("  ").is_err());
    }
}
