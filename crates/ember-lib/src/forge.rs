use crate::archive;
use crate::config;
use crate::error::LaunchError;
use crate::events::EventSink;
use crate::materialize::join_maven_url;
use crate::materialize::libraries::maven_parts;
use crate::net::Fetcher;
use crate::options::Profile;
use crate::platform::OsType;
use crate::version::rules::library_verdict;
use crate::version::VersionDescriptor;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;

/// How a modification descriptor layers over vanilla. The three modes are
/// mutually exclusive; one resolver yields main class and classpath shape.
pub enum Overlay {
    Vanilla,
    /// A second descriptor whose libraries and arguments overlay vanilla.
    Custom { descriptor: VersionDescriptor },
    /// Legacy universal jar: the jar and its libraries prefix the
    /// classpath and its main class replaces vanilla's.
    ForgeLegacy {
        descriptor: VersionDescriptor,
        jar: PathBuf,
        libraries: Vec<PathBuf>,
    },
}

impl Overlay {
    pub fn descriptor(&self) -> Option<&VersionDescriptor> {
        match self {
            Overlay::Vanilla => None,
            Overlay::Custom { descriptor } => Some(descriptor),
            Overlay::ForgeLegacy { descriptor, .. } => Some(descriptor),
        }
    }

    /// Entries that go in front of the vanilla libraries.
    pub fn classpath_prefix(&self) -> Vec<PathBuf> {
        match self {
            Overlay::ForgeLegacy {
                jar, libraries, ..
            } => {
                let mut prefix = vec![jar.clone()];
                prefix.extend(libraries.iter().cloned());
                prefix
            }
            _ => Vec::new(),
        }
    }

    pub fn main_class<'a>(&'a self, vanilla: &'a VersionDescriptor) -> &'a str {
        self.descriptor()
            .and_then(|d| d.main_class.as_deref())
            .or(vanilla.main_class.as_deref())
            .unwrap_or("net.minecraft.client.main.Main")
    }
}

/// Apply a Forge archive on top of the vanilla install. Legacy universal
/// jars (no install_profile.json) are unpacked in-process; modern
/// installers run through the ForgeWrapper subprocess and their output
/// descriptor loads as a custom overlay.
pub async fn apply_forge(
    fetcher: &Fetcher,
    sink: &Arc<dyn EventSink>,
    profile: &Profile,
    os: OsType,
    forge_jar: &Path,
) -> Result<Overlay> {
    if archive::zip_contains(forge_jar, "install_profile.json").await? {
        log::info!("modern forge installer detected: {:?}", forge_jar);
        run_forge_wrapper(fetcher, profile, forge_jar).await?;

        let produced = profile.forge_dir().join("version.json");
        let descriptor = crate::version::load_descriptor(&produced)
            .await
            .context("read the descriptor produced by the forge installer")?;
        return Ok(Overlay::Custom { descriptor });
    }

    log::info!("legacy forge universal jar detected: {:?}", forge_jar);
    legacy_overlay(fetcher, sink, profile, os, forge_jar).await
}

async fn legacy_overlay(
    fetcher: &Fetcher,
    sink: &Arc<dyn EventSink>,
    profile: &Profile,
    os: OsType,
    forge_jar: &Path,
) -> Result<Overlay> {
    let bytes = archive::read_zip_entry(forge_jar, "version.json")
        .await
        .context("legacy forge jar carries no version.json")?;

    let forge_dir = profile.forge_dir();
    tokio::fs::create_dir_all(&forge_dir).await?;
    tokio::fs::write(forge_dir.join("version.json"), &bytes).await?;

    let descriptor: VersionDescriptor =
        serde_json::from_slice(&bytes).context("parse forge version.json")?;

    let libraries =
        materialize_forge_libraries(fetcher, sink, profile, os, &descriptor).await?;

    Ok(Overlay::ForgeLegacy {
        descriptor,
        jar: forge_jar.to_path_buf(),
        libraries,
    })
}

/// Forge's own descriptor lists bare maven coordinates. Each one is tried
/// against the configured mirror, the Forge maven, then the fallback
/// search endpoint; 404 moves on to the next root.
async fn materialize_forge_libraries(
    fetcher: &Fetcher,
    sink: &Arc<dyn EventSink>,
    profile: &Profile,
    os: OsType,
    descriptor: &VersionDescriptor,
) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let candidates = [
        profile.urls.maven_forge.as_str(),
        profile.urls.default_repo.as_str(),
        profile.urls.fallback_maven.as_str(),
    ];

    let wanted: Vec<_> = descriptor
        .libraries
        .iter()
        .filter(|library| !library_verdict(library.rules.as_deref(), os).is_excluded())
        .filter(|library| {
            // The universal jar itself is the classpath prefix already.
            let own = library.name.starts_with("net.minecraftforge:forge:")
                || library.name.starts_with("net.minecraftforge:minecraftforge:");
            if own {
                log::debug!("skipping forge's own coordinate: {}", library.name);
            }
            !own
        })
        .collect();

    let total = wanted.len();
    for (index, library) in wanted.iter().enumerate() {
        let (rel_dir, file) = maven_parts(&library.name)?;
        let dir = profile.library_root.join(&rel_dir);
        let target = dir.join(&file);

        if !target.exists() {
            let mut roots: Vec<&str> = Vec::new();
            if let Some(own_root) = library.url.as_deref() {
                roots.push(own_root);
            }
            roots.extend(candidates);

            let mut landed = false;
            for root in roots {
                let url = join_maven_url(root, &format!("{}/{}", rel_dir, file));
                let outcome = fetcher.fetch(&url, &dir, &file, "forge").await?;
                if outcome.completed().is_some() {
                    landed = true;
                    break;
                }
            }
            if !landed {
                log::warn!("forge library unavailable from any maven root: {}", library.name);
                sink.progress("forge", index + 1, total);
                continue;
            }
        }

        paths.push(target);
        sink.progress("forge", index + 1, total);
    }

    Ok(paths)
}

async fn run_forge_wrapper(
    fetcher: &Fetcher,
    profile: &Profile,
    forge_jar: &Path,
) -> Result<()> {
    let version = config::FORGE_WRAPPER_VERSION;
    let wrapper_dir = profile
        .library_root
        .join("io/github/zekerzhayard/ForgeWrapper")
        .join(version);
    let wrapper_name = format!("ForgeWrapper-{}.jar", version);
    let wrapper_jar = wrapper_dir.join(&wrapper_name);

    if !wrapper_jar.exists() {
        let url = format!(
            "{}/{}/{}",
            config::FORGE_WRAPPER_RELEASE_URL,
            version,
            wrapper_name
        );
        let outcome = fetcher
            .fetch(&url, &wrapper_dir, &wrapper_name, "forge-wrapper")
            .await?;
        if outcome.completed().is_none() {
            anyhow::bail!("forge wrapper {} is not available upstream", version);
        }
    }

    let status = Command::new(&profile.java)
        .arg("-jar")
        .arg(&wrapper_jar)
        .arg(format!("--installer={}", forge_jar.display()))
        .arg(format!("--instance={}", profile.root.display()))
        .arg(format!("--saveTo={}", wrapper_dir.display()))
        .status()
        .await
        .context("spawn forge wrapper")?;

    if !status.success() {
        return Err(LaunchError::InstallerFailed(status.code().unwrap_or(-1)).into());
    }

    Ok(())
}
