// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Deployment manifests rendered from `manifest.yml.template`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Placeholder replaced with the buildpack name or URL
pub const BUILDPACK_PLACEHOLDER: &str = "{conjur_buildpack}";
pub const TEMPLATE_FILE: &str = "manifest.yml.template";
pub const MANIFEST_FILE: &str = "manifest.yml";

/// Replace every placeholder in `template` with `buildpack`.
pub fn render_manifest(template: &str, buildpack: &str) -> String {
    template.replace(BUILDPACK_PLACEHOLDER, buildpack)
}

/// Render `app_dir/manifest.yml.template` into `app_dir/manifest.yml`.
///
/// The rendered manifest must still be valid YAML.
pub async fn write_manifest(app_dir: &Path, buildpack: &str) -> Result<PathBuf> {
    let template_path = app_dir.join(TEMPLATE_FILE);
    let template = tokio::fs::read_to_string(&template_path)
        .await
        .with_context(|| format!("Failed to read manifest template: {}", template_path.display()))?;

    let rendered = render_manifest(&template, buildpack);
    serde_yaml::from_str::<serde_yaml::Value>(&rendered).with_context(|| {
        format!(
            "Rendered manifest from {} is not valid YAML",
            template_path.display()
        )
    })?;

    let manifest_path = app_dir.join(MANIFEST_FILE);
    tokio::fs::write(&manifest_path, rendered)
        .await
        .with_context(|| format!("Failed to write manifest: {}", manifest_path.display()))?;

    debug!("Wrote {} with buildpack {}", manifest_path.display(), buildpack);
    Ok(manifest_path)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const TEMPLATE: &str = "\
---
applications:
- name: ruby-app
  buildpacks:
  - {conjur_buildpack}
  - ruby_buildpack
";

    #[test]
    fn test_single_placeholder_substitution() {
        let rendered = render_manifest(TEMPLATE, "conjur_buildpack_ci_abc");
        assert_eq!(rendered.matches(BUILDPACK_PLACEHOLDER).count(), 0);
        assert_eq!(rendered.matches("conjur_buildpack_ci_abc").count(), 1);
    }

    #[test]
    fn test_every_placeholder_is_replaced() {
        let template = "{conjur_buildpack} {conjur_buildpack}";
        assert_eq!(render_manifest(template, "x"), "x x");
        assert_eq!(render_manifest("no placeholder", "x"), "no placeholder");
    }

    #[tokio::test]
    async fn test_write_manifest() -> Result<()> {
        let temp_dir = TempDir::new()?;
        tokio::fs::write(temp_dir.path().join(TEMPLATE_FILE), TEMPLATE).await?;

        let url = "https://github.com/cyberark/cloudfoundry-conjur-buildpack#main";
        let path = write_manifest(temp_dir.path(), url).await?;

        let written = tokio::fs::read_to_string(path).await?;
        assert!(written.contains(url));
        assert!(!written.contains(BUILDPACK_PLACEHOLDER));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_template_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = write_manifest(temp_dir.path(), "x").await.unwrap_err();
        assert!(err.to_string().contains("manifest template"));
    }

    #[tokio::test]
    async fn test_invalid_yaml_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(
            temp_dir.path().join(TEMPLATE_FILE),
            "applications:\n  - name: [unclosed\n",
        )
        .await
        .unwrap();

        assert!(write_manifest(temp_dir.path(), "x").await.is_err());
        assert!(!temp_dir.path().join(MANIFEST_FILE).exists());
    }
}
