//! Values for the platform operator chart

use serde::Serialize;

use super::ReleaseError;
use crate::crd::{DEFAULT_PULL_POLICY, SecretName, VerrazzanoFleetBindingSpec};
use crate::document::Document;

/// Registry hosting the public Verrazzano images
pub const PUBLIC_REGISTRY: &str = "ghcr.io";

const PLATFORM_OPERATOR_IMAGE: &str = "verrazzano-platform-operator";
const APPLICATION_OPERATOR_IMAGE: &str = "verrazzano-application-operator";
const CLUSTER_OPERATOR_IMAGE: &str = "verrazzano-cluster-operator";

/// An image reference split into `registry/repo/image:tag`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageRef {
    pub registry: String,
    /// Path between the registry and the image name, possibly nested
    pub repo: String,
    pub image: String,
    pub tag: String,
}

impl ImageRef {
    /// Split an image reference.
    ///
    /// The tag is whatever follows the last `:` unless that text contains a
    /// `/`, in which case the colon belonged to a registry port.
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        let (name, tag) = match reference.rsplit_once(':') {
            Some((name, tag)) if !tag.contains('/') => (name, tag),
            _ => (reference, ""),
        };

        let mut segments: Vec<&str> = name.split('/').filter(|s| !s.is_empty()).collect();
        let image = segments.pop().unwrap_or_default();
        let (registry, repo) = match segments.split_first() {
            Some((registry, rest)) => (registry.to_string(), rest.join("/")),
            None => (String::new(), String::new()),
        };

        Self {
            registry,
            repo,
            image: image.to_string(),
            tag: tag.to_string(),
        }
    }

    /// `registry/repo/image` with empty parts skipped
    pub fn name(&self) -> String {
        [&self.registry, &self.repo, &self.image]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Same registry, repo and tag with a different image name
    fn sibling(&self, image: &str) -> String {
        let sibling = ImageRef {
            image: image.to_string(),
            ..self.clone()
        };
        sibling.to_string()
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.tag.is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}:{}", self.name(), self.tag)
        }
    }
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct PlatformOperatorValues {
    #[serde(skip_serializing_if = "String::is_empty")]
    image: String,
    private_registry: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    repository: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    registry: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pull_policy: String,
    image_pull_secrets: Vec<SecretName>,
    #[serde(skip_serializing_if = "String::is_empty")]
    app_operator_image: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    cluster_operator_image: String,
}

/// Render chart values for a binding.
///
/// `default_image` is the image named by the chart's own `values.yaml`.
pub fn render_values(
    spec: &VerrazzanoFleetBindingSpec,
    default_image: &str,
) -> Result<Document, ReleaseError> {
    let mut effective = ImageRef::parse(default_image);
    if effective.image.is_empty() {
        return Err(ReleaseError::Values(format!(
            "chart default image {default_image:?} has no image name"
        )));
    }

    let mut values = PlatformOperatorValues {
        pull_policy: DEFAULT_PULL_POLICY.to_string(),
        ..Default::default()
    };

    if let Some(image) = &spec.image {
        let repository = image
            .repository
            .as_deref()
            .map(|r| r.trim().trim_matches('/'))
            .unwrap_or_default();
        let name = if repository.is_empty() {
            effective.name()
        } else if repository.rsplit('/').next() == Some(effective.image.as_str()) {
            repository.to_string()
        } else {
            format!("{repository}/{}", effective.image)
        };

        let tag = image
            .tag
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&effective.tag);
        values.image = format!("{name}:{tag}");

        if let Some(policy) = image.pull_policy.as_deref().map(str::trim)
            && !policy.is_empty()
        {
            values.pull_policy = policy.to_string();
        }

        effective = ImageRef::parse(&values.image);
    }

    match &spec.private_registry {
        Some(private) if private.enabled => {
            values.private_registry = true;
            values.registry = effective.registry.clone();
            values.repository = effective
                .repo
                .strip_suffix("/verrazzano")
                .unwrap_or(&effective.repo)
                .to_string();
        }
        Some(_) if effective.registry != PUBLIC_REGISTRY => {
            let app = effective.image.replace(PLATFORM_OPERATOR_IMAGE, APPLICATION_OPERATOR_IMAGE);
            let cluster = effective.image.replace(PLATFORM_OPERATOR_IMAGE, CLUSTER_OPERATOR_IMAGE);
            values.app_operator_image = effective.sibling(&app);
            values.cluster_operator_image = effective.sibling(&cluster);
        }
        _ => {}
    }

    values.image_pull_secrets = spec.image_pull_secrets.clone().unwrap_or_default();

    serde_json::to_value(values)
        .map(Document::new)
        .map_err(|e| ReleaseError::Values(e.to_string()))
}
