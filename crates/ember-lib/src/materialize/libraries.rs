use crate::error::LaunchError;
use crate::events::EventSink;
use crate::materialize::join_maven_url;
use crate::net::{hash, Fetcher};
use crate::options::Profile;
use crate::platform::OsType;
use crate::version::rules::library_verdict;
use crate::version::Library;
use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Split a maven coordinate `group:artifact:version[:classifier][@ext]`
/// into its repo-relative directory and file name.
pub fn maven_parts(coordinate: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = coordinate.split(':').collect();
    if parts.len() < 3 {
        return Err(LaunchError::InvalidCoordinate(coordinate.to_string()).into());
    }

    let group = parts[0].replace('.', "/");
    let artifact = parts[1];
    let mut version = parts[2];
    let mut extension = "jar";
    let mut classifier = None;

    if parts.len() == 3 {
        if let Some((v, ext)) = version.split_once('@') {
            version = v;
            extension = ext;
        }
    } else if let Some((clf, ext)) = parts[3].split_once('@') {
        classifier = Some(clf);
        extension = ext;
    } else {
        classifier = Some(parts[3]);
    }

    let file = match classifier {
        Some(clf) => format!("{}-{}-{}.{}", artifact, version, clf, extension),
        None => format!("{}-{}.{}", artifact, version, extension),
    };

    Ok((format!("{}/{}/{}", group, artifact, version), file))
}

struct PlannedLibrary {
    dir: PathBuf,
    file: String,
    url: Option<String>,
    sha1: Option<String>,
}

impl PlannedLibrary {
    fn target(&self) -> PathBuf {
        self.dir.join(&self.file)
    }
}

/// Resolve and download every included library, returning the classpath
/// contributions in input order. Entries that never materialized (404 or
/// URL-less "simple" libraries) are filtered out; the caller deduplicates.
pub async fn materialize_libraries(
    fetcher: &Fetcher,
    sink: &Arc<dyn EventSink>,
    profile: &Profile,
    libraries: &[Library],
    os: OsType,
    event_kind: &str,
) -> Result<Vec<PathBuf>> {
    let mut planned = Vec::new();

    for library in libraries {
        if library_verdict(library.rules.as_deref(), os).is_excluded() {
            log::debug!("excluded by rules: {}", library.name);
            continue;
        }

        let artifact = library
            .downloads
            .as_ref()
            .and_then(|downloads| downloads.artifact.as_ref());

        let (dir, file) = match artifact.and_then(|a| a.path.as_deref()) {
            Some(path) => {
                let rel = Path::new(path);
                let Some(file) = rel.file_name().map(|f| f.to_string_lossy().to_string()) else {
                    log::warn!("artifact path without a file name: {}", path);
                    continue;
                };
                let parent = rel.parent().unwrap_or_else(|| Path::new(""));
                (profile.library_root.join(parent), file)
            }
            None => {
                let (rel_dir, file) = maven_parts(&library.name)?;
                (profile.library_root.join(rel_dir), file)
            }
        };

        let url = match artifact.and_then(|a| a.url.clone()) {
            Some(url) => Some(url),
            None => library.url.as_deref().map(|root| {
                let rel = dir
                    .strip_prefix(&profile.library_root)
                    .unwrap_or(&dir)
                    .to_string_lossy()
                    .replace('\\', "/");
                join_maven_url(root, &format!("{}/{}", rel, file))
            }),
        };

        if url.is_none() && !dir.join(&file).exists() {
            // Simple libraries without any source are dropped silently.
            log::debug!("no source for {}, dropping", library.name);
            continue;
        }

        planned.push(PlannedLibrary {
            dir,
            file,
            url,
            sha1: artifact.and_then(|a| a.sha1.clone()),
        });
    }

    let total = planned.len();
    let settled = Arc::new(AtomicUsize::new(0));
    let order: Vec<PathBuf> = planned.iter().map(|p| p.target()).collect();

    let results: Vec<Result<()>> = stream::iter(planned)
        .map(|entry| {
            let settled = Arc::clone(&settled);
            let sink = Arc::clone(sink);
            let kind = event_kind.to_string();

            async move {
                let target = entry.target();
                let cached = if target.exists() {
                    match &entry.sha1 {
                        Some(expected) => hash::sha1_matches(&target, expected).await,
                        None => true,
                    }
                } else {
                    false
                };

                if !cached {
                    if let Some(url) = &entry.url {
                        fetcher
                            .fetch_checked(url, &entry.dir, &entry.file, &kind, entry.sha1.as_deref())
                            .await?;
                    }
                }

                let task = settled.fetch_add(1, Ordering::SeqCst) + 1;
                sink.progress(&kind, task, total);
                Ok(())
            }
        })
        .buffer_unordered(profile.max_sockets.max(1))
        .collect()
        .await;

    for result in results {
        result?;
    }

    // Keep input order; drop entries that never landed (e.g. 404 skips).
    let mut classpath = Vec::new();
    for path in order {
        if path.exists() {
            classpath.push(path);
        } else {
            log::warn!("library not materialized: {:?}", path);
        }
    }

    Ok(classpath)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::test_support::RecordingSink;
    use crate::events::SilentSink;
    use crate::options::{LaunchOptions, Profile, VersionSelector};
    use crate::version::{LibraryDownloads, RemoteArtifact};
    use tempfile::tempdir;

    fn profile_at(root: &Path) -> Profile {
        Profile::resolve(LaunchOptions {
            root: root.to_path_buf(),
            version: VersionSelector {
                number: "1.8.9".to_string(),
                release_type: "release".to_string(),
                custom: None,
            },
            ..Default::default()
        })
        .unwrap()
    }

    fn fetcher() -> Fetcher {
        Fetcher::new(Arc::new(SilentSink), 2).unwrap()
    }

    #[test]
    fn maven_parts_simple_coordinate() {
        let (dir, file) = maven_parts("com.google.guava:guava:21.0").unwrap();
        assert_eq!(dir, "com/google/guava/guava/21.0");
        assert_eq!(file, "guava-21.0.jar");
    }

    #[test]
    fn maven_parts_with_classifier_and_extension() {
        let (dir, file) = maven_parts("org.lwjgl:lwjgl:3.3.1:natives-linux").unwrap();
        assert_eq!(dir, "org/lwjgl/lwjgl/3.3.1");
        assert_eq!(file, "lwjgl-3.3.1-natives-linux.jar");

        let (_, file) = maven_parts("com.example:lib:1.0:sources@zip").unwrap();
        assert_eq!(file, "lib-1.0-sources.zip");

        let (_, file) = maven_parts("com.example:lib:1.0@zip").unwrap();
        assert_eq!(file, "lib-1.0.zip");
    }

    #[test]
    fn maven_parts_rejects_short_coordinates() {
        assert!(maven_parts("only:two").is_err());
    }

    #[tokio::test]
    async fn existing_files_are_kept_without_a_source() {
        let tmp = tempdir().unwrap();
        let profile = profile_at(tmp.path());

        // Pre-place the jar where the coordinate points.
        let dir = profile.library_root.join("com/example/demo/1.0");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("demo-1.0.jar"), b"jar").unwrap();

        let libraries = vec![Library {
            name: "com.example:demo:1.0".to_string(),
            ..Default::default()
        }];

        let sink: Arc<dyn EventSink> = Arc::new(SilentSink);
        let classpath = materialize_libraries(
            &fetcher(),
            &sink,
            &profile,
            &libraries,
            OsType::Linux,
            "classes",
        )
        .await
        .unwrap();

        assert_eq!(classpath, vec![dir.join("demo-1.0.jar")]);
    }

    #[tokio::test]
    async fn sourceless_missing_libraries_are_dropped_silently() {
        let tmp = tempdir().unwrap();
        let profile = profile_at(tmp.path());

        let libraries = vec![Library {
            name: "com.example:ghost:0.1".to_string(),
            ..Default::default()
        }];

        let sink: Arc<dyn EventSink> = Arc::new(SilentSink);
        let classpath = materialize_libraries(
            &fetcher(),
            &sink,
            &profile,
            &libraries,
            OsType::Linux,
            "classes",
        )
        .await
        .unwrap();

        assert!(classpath.is_empty());
    }

    #[tokio::test]
    async fn artifact_path_naming_and_rule_exclusion() {
        let tmp = tempdir().unwrap();
        let profile = profile_at(tmp.path());

        // Artifact with an explicit path; pre-placed so no fetch happens.
        let rel = "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1.jar";
        let full = profile.library_root.join(rel);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(&full, b"jar").unwrap();

        let placed = Library {
            name: "org.lwjgl:lwjgl:3.3.1".to_string(),
            downloads: Some(LibraryDownloads {
                artifact: Some(RemoteArtifact {
                    path: Some(rel.to_string()),
                    ..Default::default()
                }),
                classifiers: None,
            }),
            ..Default::default()
        };

        // Excluded on linux by the osx-only rule pair.
        let osx_only = Library {
            name: "ca.weblite:java-objc-bridge:1.0.0".to_string(),
            rules: Some(vec![
                crate::version::Rule::default(),
                crate::version::Rule {
                    action: crate::version::RuleAction::Disallow,
                    os: Some(crate::version::OsClause {
                        name: Some("osx".to_string()),
                        ..Default::default()
                    }),
                    features: None,
                },
            ]),
            ..Default::default()
        };

        let sink = Arc::new(RecordingSink::default());
        let sink_dyn: Arc<dyn EventSink> = sink.clone();
        let classpath = materialize_libraries(
            &fetcher(),
            &sink_dyn,
            &profile,
            &[placed, osx_only],
            OsType::Linux,
            "classes",
        )
        .await
        .unwrap();

        assert_eq!(classpath, vec![full]);
        let progress = sink.progress.lock().unwrap();
        assert_eq!(progress.as_slice(), &[("classes".to_string(), 1, 1)]);
    }
}
