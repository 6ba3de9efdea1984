pub mod rules;

use crate::error::LaunchError;
use crate::net::Fetcher;
use crate::options::Profile;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// The authoritative recipe for one game version, as persisted under
/// `versions/<id>/<id>.json`. Legacy descriptors carry a flat
/// `minecraftArguments` string, modern ones a structured `arguments` block;
/// [`VersionDescriptor::args_shape`] exposes the split as one accessor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionDescriptor {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
    /// Asset kind tag: "legacy", "pre-1.6", or a modern index id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndexRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads: Option<VersionDownloads>,
    pub libraries: Vec<Library>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Arguments>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub version_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionDownloads {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<RemoteArtifact>,
}

/// Pointer to the asset-index JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetIndexRef {
    pub id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// One downloadable file record as manifests describe them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RemoteArtifact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// One classpath or native contribution.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Library {
    /// Maven coordinate `group:artifact:version[:classifier]`.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    /// Alternate maven root for "simple" libraries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
    /// Classifier template per OS tag, may contain `${arch}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natives: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractRules>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LibraryDownloads {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<RemoteArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<HashMap<String, RemoteArtifact>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractRules {
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<OsClause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<HashMap<String, bool>>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    #[default]
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OsClause {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<Arg>,
    #[serde(default)]
    pub jvm: Vec<Arg>,
}

/// A game/JVM argument entry: either a literal token or a rule-guarded
/// value set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    Token(String),
    Conditional { rules: Vec<Rule>, value: ArgValue },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Single(String),
    Many(Vec<String>),
}

/// Which argument schema a descriptor speaks.
pub enum ArgsShape<'a> {
    Legacy(&'a str),
    Modern(&'a [Arg]),
    Absent,
}

impl VersionDescriptor {
    pub fn is_legacy_assets(&self) -> bool {
        matches!(self.assets.as_deref(), Some("legacy") | Some("pre-1.6"))
    }

    /// Minor component of the id: "1.19.2" -> 19. Zero when unparsable.
    pub fn minor_version(&self) -> u32 {
        self.id
            .split('.')
            .nth(1)
            .and_then(|part| part.parse().ok())
            .unwrap_or(0)
    }

    pub fn args_shape(&self) -> ArgsShape<'_> {
        if let Some(legacy) = self.minecraft_arguments.as_deref() {
            ArgsShape::Legacy(legacy)
        } else if let Some(arguments) = &self.arguments {
            ArgsShape::Modern(&arguments.game)
        } else {
            ArgsShape::Absent
        }
    }
}

#[derive(Debug, Deserialize)]
struct ManifestIndex {
    versions: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    id: String,
    url: String,
}

/// Parse a descriptor from a file on disk.
pub async fn load_descriptor(path: &Path) -> Result<VersionDescriptor> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read descriptor {:?}", path))?;

    serde_json::from_str(&content).with_context(|| format!("parse descriptor {:?}", path))
}

/// Resolve the descriptor for the configured version: local JSON first,
/// then the two-stage remote manifest lookup.
pub async fn resolve_descriptor(fetcher: &Fetcher, profile: &Profile) -> Result<VersionDescriptor> {
    let local = profile.version_json_path();
    if local.exists() {
        match load_descriptor(&local).await {
            Ok(descriptor) => {
                log::debug!("using local descriptor {:?}", local);
                return Ok(descriptor);
            }
            Err(err) => {
                log::warn!("local descriptor {:?} unusable: {:#}", local, err);
            }
        }
    }

    let manifest_url = format!("{}/mc/game/version_manifest.json", profile.urls.meta);
    let manifest: ManifestIndex = fetcher
        .fetch_json(&manifest_url)
        .await
        .context("fetch version manifest")?;

    let entry = manifest
        .versions
        .iter()
        .find(|entry| entry.id == profile.version_number)
        .ok_or_else(|| LaunchError::VersionUnresolvable(profile.version_number.clone()))?;

    fetcher
        .fetch_json(&entry.url)
        .await
        .context(LaunchError::VersionUnresolvable(
            profile.version_number.clone(),
        ))
}

/// Persist the descriptor beside the jar. Idempotent rewrite; called after
/// the client jar lands so a later run resolves offline.
pub async fn persist_descriptor(profile: &Profile, descriptor: &VersionDescriptor) -> Result<()> {
    let dir = profile.version_dir();
    tokio::fs::create_dir_all(&dir).await?;

    let path = dir.join(format!("{}.json", profile.version_number));
    let json = serde_json::to_string_pretty(descriptor)?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("write descriptor {:?}", path))
}
