use crate::archive;
use crate::events::EventSink;
use crate::net::Fetcher;
use crate::options::Profile;
use crate::platform::{arch_bits, OsType};
use crate::version::rules::library_verdict;
use crate::version::{Library, RemoteArtifact};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Pick the OS-appropriate classifier key for a library. A `natives`
/// template map wins when it resolves to a present key; otherwise the
/// conventional classifier names are probed, with the macos alias as the
/// osx fallback.
fn select_classifier(library: &Library, os: OsType) -> Option<String> {
    let classifiers = library.downloads.as_ref()?.classifiers.as_ref()?;

    if let Some(template) = library
        .natives
        .as_ref()
        .and_then(|natives| natives.get(os.name()))
    {
        let key = template.replace("${arch}", arch_bits());
        if classifiers.contains_key(&key) {
            return Some(key);
        }
    }

    let candidates: &[&str] = match os {
        OsType::Windows => &["natives-windows"],
        OsType::Linux => &["natives-linux"],
        OsType::Osx => &["natives-osx", "natives-macos"],
    };

    candidates
        .iter()
        .find(|key| classifiers.contains_key(**key))
        .map(|key| key.to_string())
}

struct NativeTask {
    name: String,
    artifact: RemoteArtifact,
    file: String,
    exclude: Vec<String>,
}

/// Download, verify and extract every native archive for this OS into the
/// flat per-version natives directory, deleting each archive afterwards.
/// A non-empty natives directory short-circuits the whole phase.
pub async fn materialize_natives(
    fetcher: &Fetcher,
    sink: &Arc<dyn EventSink>,
    profile: &Profile,
    libraries: &[Library],
    os: OsType,
) -> Result<PathBuf> {
    let natives_dir = profile.natives_dir.clone();

    if directory_populated(&natives_dir) {
        log::debug!("natives already extracted at {:?}", natives_dir);
        return Ok(natives_dir);
    }

    tokio::fs::create_dir_all(&natives_dir)
        .await
        .with_context(|| format!("create {:?}", natives_dir))?;

    let mut tasks = Vec::new();
    for library in libraries {
        if library_verdict(library.rules.as_deref(), os).is_excluded() {
            continue;
        }
        let Some(key) = select_classifier(library, os) else {
            continue;
        };
        let Some(artifact) = library
            .downloads
            .as_ref()
            .and_then(|d| d.classifiers.as_ref())
            .and_then(|c| c.get(&key))
        else {
            continue;
        };

        let file = match artifact.path.as_deref() {
            Some(path) => std::path::Path::new(path)
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| format!("{}.jar", key)),
            None => format!("{}-{}.jar", library.name.replace(':', "-"), key),
        };

        tasks.push(NativeTask {
            name: library.name.clone(),
            artifact: artifact.clone(),
            file,
            exclude: library
                .extract
                .as_ref()
                .map(|rules| rules.exclude.clone())
                .unwrap_or_default(),
        });
    }

    let total = tasks.len();
    let settled = Arc::new(AtomicUsize::new(0));

    let results: Vec<Result<()>> = stream::iter(tasks)
        .map(|task| {
            let natives_dir = natives_dir.clone();
            let settled = Arc::clone(&settled);
            let sink = Arc::clone(sink);

            async move {
                if let Some(url) = task.artifact.url.as_deref() {
                    let outcome = fetcher
                        .fetch_checked(
                            url,
                            &natives_dir,
                            &task.file,
                            "natives",
                            task.artifact.sha1.as_deref(),
                        )
                        .await?;

                    if let Some(archive_path) = outcome.completed() {
                        // Vendor natives are known to ship malformed or
                        // duplicated entries; extraction failure is a
                        // warning, not an abort.
                        if let Err(err) =
                            archive::extract_zip(archive_path, &natives_dir, &task.exclude).await
                        {
                            log::warn!("native extraction failed for {}: {:#}", task.name, err);
                        }
                        let _ = tokio::fs::remove_file(archive_path).await;
                    }
                } else {
                    log::warn!("native classifier without url for {}", task.name);
                }

                let done = settled.fetch_add(1, Ordering::SeqCst) + 1;
                sink.progress("natives", done, total);
                Ok(())
            }
        })
        .buffer_unordered(profile.max_sockets.max(1))
        .collect()
        .await;

    for result in results {
        result?;
    }

    Ok(natives_dir)
}

fn directory_populated(dir: &std::path::Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SilentSink;
    use crate::options::{LaunchOptions, Profile, VersionSelector};
    use crate::version::LibraryDownloads;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn profile_at(root: &std::path::Path) -> Profile {
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

    fn library_with_classifiers(keys: &[&str]) -> Library {
        let mut classifiers = HashMap::new();
        for key in keys {
            classifiers.insert(
                key.to_string(),
                RemoteArtifact {
                    url: Some(format!("https://example.invalid/{}.jar", key)),
                    ..Default::default()
                },
            );
        }
        Library {
            name: "org.lwjgl:lwjgl-platform:2.9.4".to_string(),
            downloads: Some(LibraryDownloads {
                artifact: None,
                classifiers: Some(classifiers),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn selects_direct_classifier_per_os() {
        let lib = library_with_classifiers(&["natives-windows", "natives-linux", "natives-osx"]);
        assert_eq!(
            select_classifier(&lib, OsType::Windows).as_deref(),
            Some("natives-windows")
        );
        assert_eq!(
            select_classifier(&lib, OsType::Linux).as_deref(),
            Some("natives-linux")
        );
        assert_eq!(
            select_classifier(&lib, OsType::Osx).as_deref(),
            Some("natives-osx")
        );
    }

    #[test]
    fn osx_falls_back_to_macos_alias() {
        let lib = library_with_classifiers(&["natives-macos"]);
        assert_eq!(
            select_classifier(&lib, OsType::Osx).as_deref(),
            Some("natives-macos")
        );
        assert_eq!(select_classifier(&lib, OsType::Linux), None);
    }

    #[test]
    fn natives_template_map_resolves_arch() {
        let key = format!("natives-windows-{}", arch_bits());
        let mut lib = library_with_classifiers(&[key.as_str()]);
        let mut natives = HashMap::new();
        natives.insert(
            "windows".to_string(),
            "natives-windows-${arch}".to_string(),
        );
        lib.natives = Some(natives);

        assert_eq!(
            select_classifier(&lib, OsType::Windows),
            Some(format!("natives-windows-{}", arch_bits()))
        );
    }

    #[tokio::test]
    async fn populated_natives_dir_skips_the_phase() {
        let tmp = tempdir().unwrap();
        let profile = profile_at(tmp.path());

        std::fs::create_dir_all(&profile.natives_dir).unwrap();
        std::fs::write(profile.natives_dir.join("liblwjgl.so"), b"so").unwrap();

        // The library points at an unreachable host; the phase must not
        // touch the network because the directory is already populated.
        let lib = library_with_classifiers(&["natives-linux"]);
        let sink: Arc<dyn EventSink> = Arc::new(SilentSink);
        let fetcher = Fetcher::new(Arc::new(SilentSink), 2).unwrap();

        let dir = materialize_natives(&fetcher, &sink, &profile, &[lib], OsType::Linux)
            .await
            .unwrap();

        assert_eq!(dir, profile.natives_dir);
        assert!(dir.join("liblwjgl.so").exists());
    }
}
