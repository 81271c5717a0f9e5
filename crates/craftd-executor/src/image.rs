//! Maps a server version to a concrete runtime image and makes sure it is
//! present locally.

use crate::runtime::ContainerRuntime;
use craftd_common::{CraftdError, Result};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Tag used for any version prefix missing from [`VERSION_IMAGE_TAGS`].
pub const DEFAULT_TAG: &str = "java21";

/// `major.minor` prefix -> image tag.
pub const VERSION_IMAGE_TAGS: &[(&str, &str)] = &[
    ("1.7", "java8"),
    ("1.8", "java8"),
    ("1.9", "java8"),
    ("1.10", "java8"),
    ("1.11", "java8"),
    ("1.12", "java8"),
    ("1.13", "java8"),
    ("1.14", "java8"),
    ("1.15", "java8"),
    ("1.16", "java8"),
    ("1.17", "java16"),
    ("1.18", "java17"),
    ("1.19", "java17"),
    ("1.20", "java17"),
    ("1.21", "java21"),
];

/// `"1.20.1"` -> `Some("1.20")`.
pub fn major_minor(version: &str) -> Option<&str> {
    let mut parts = version.splitn(3, '.');
    let major = parts.next().filter(|p| !p.is_empty())?;
    let minor = parts.next().filter(|p| !p.is_empty())?;
    Some(&version[..major.len() + 1 + minor.len()])
}

pub fn tag_for_version(version: &str) -> &'static str {
    major_minor(version)
        .and_then(|prefix| {
            VERSION_IMAGE_TAGS
                .iter()
                .find(|(known, _)| *known == prefix)
                .map(|(_, tag)| *tag)
        })
        .unwrap_or(DEFAULT_TAG)
}

#[derive(Clone)]
pub struct ImageResolver {
    runtime: Arc<dyn ContainerRuntime>,
    repo: String,
}

impl ImageResolver {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, repo: impl Into<String>) -> Self {
        Self {
            runtime,
            repo: repo.into(),
        }
    }

    /// `repo:tag` for `version`, without touching the runtime.
    pub fn reference(&self, version: &str) -> String {
        format!("{}:{}", self.repo, tag_for_version(version))
    }

    /// Resolves `version` and pulls the image if it is not present yet.
    #[instrument(skip(self))]
    pub async fn ensure(&self, version: &str) -> Result<String> {
        let reference = self.reference(version);

        let present = match self.runtime.list_image_tags().await {
            Ok(tags) => tags.iter().any(|tag| *tag == reference),
            Err(e) => {
                warn!(error = %e, "Failed to list local images, attempting pull");
                false
            }
        };
        if present {
            return Ok(reference);
        }

        info!(%reference, "Image not present locally, pulling...");
        self.runtime
            .pull_image(&reference)
            .await
            .map_err(|e| CraftdError::ImageUnavailable {
                image: reference.clone(),
                reason: e.message(),
            })?;
        info!(%reference, "Image pulled.");

        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRuntime;

    #[test]
    fn test_major_minor() {
        assert_eq!(major_minor("1.20.1"), Some("1.20"));
        assert_eq!(major_minor("1.8"), Some("1.8"));
        assert_eq!(major_minor("1"), None);
        assert_eq!(major_minor(".1.2"), None);
    }

    #[test]
    fn test_known_prefixes_use_table_tag() {
        for (prefix, tag) in VERSION_IMAGE_TAGS {
            let version = format!("{prefix}.3");
            assert_eq!(tag_for_version(&version), *tag, "{version}");
        }
        assert_eq!(tag_for_version("1.20.1"), "java17");
        assert_eq!(tag_for_version("1.8.9"), "java8");
    }

    #[test]
    fn test_unknown_prefixes_use_default() {
        for version in ["1.22.0", "2.0.0", "0.30.1", "1.200.4", "garbage"] {
            assert_eq!(tag_for_version(version), DEFAULT_TAG, "{version}");
        }
    }

    #[tokio::test]
    async fn test_present_image_is_not_pulled() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.add_image("itzg/minecraft-server:java17");
        let resolver = ImageResolver::new(runtime.clone(), "itzg/minecraft-server");

        let reference = resolver.ensure("1.20.1").await.unwrap();

        assert_eq!(reference, "itzg/minecraft-server:java17");
        assert!(runtime.pulls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_image_is_pulled_once() {
        let runtime = Arc::new(FakeRuntime::new());
        let resolver = ImageResolver::new(runtime.clone(), "itzg/minecraft-server");

        resolver.ensure("1.8.9").await.unwrap();

        assert_eq!(runtime.pulls(), vec!["itzg/minecraft-server:java8".to_string()]);
        assert!(runtime.has_image("itzg/minecraft-server:java8"));
    }

    #[tokio::test]
    async fn test_pull_failure_is_image_unavailable() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.fail_pulls("manifest unknown");
        let resolver = ImageResolver::new(runtime.clone(), "itzg/minecraft-server");

        let err = resolver.ensure("1.21.1").await.unwrap_err();

        match err {
            CraftdError::ImageUnavailable { image, reason } => {
                assert_eq!(image, "itzg/minecraft-server:java21");
                assert!(reason.contains("manifest unknown"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(runtime.pulls().len(), 1);
    }
}
