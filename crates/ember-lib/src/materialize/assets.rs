use crate::error::LaunchError;
use crate::events::EventSink;
use crate::net::{hash, Fetcher};
use crate::options::Profile;
use crate::version::VersionDescriptor;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct AssetIndexFile {
    objects: HashMap<String, AssetObject>,
}

#[derive(Debug, Deserialize)]
struct AssetObject {
    hash: String,
    #[allow(dead_code)]
    size: u64,
}

/// Walk the asset index and settle the content-addressed store: every
/// object missing from `objects/<hh>/<hash>` or failing its digest is
/// fetched from the resource endpoint. Legacy versions additionally get
/// the `assets/legacy/<logicalPath>` mirror.
pub async fn materialize_assets(
    fetcher: &Fetcher,
    sink: &Arc<dyn EventSink>,
    profile: &Profile,
    descriptor: &VersionDescriptor,
) -> Result<()> {
    let Some(index_ref) = &descriptor.asset_index else {
        log::debug!("descriptor {} carries no asset index", descriptor.id);
        return Ok(());
    };

    let indexes_dir = profile.asset_indexes_dir();
    let index_file = format!("{}.json", index_ref.id);
    let index_path = indexes_dir.join(&index_file);

    if !index_path.exists() {
        let outcome = fetcher
            .fetch_checked(
                &index_ref.url,
                &indexes_dir,
                &index_file,
                "asset-index",
                index_ref.sha1.as_deref(),
            )
            .await
            .context("fetch asset index")?;
        if outcome.completed().is_none() {
            return Err(LaunchError::FetchFailed {
                url: index_ref.url.clone(),
            })
            .context("asset index missing upstream");
        }
    }

    let content = tokio::fs::read_to_string(&index_path)
        .await
        .with_context(|| format!("read asset index {:?}", index_path))?;
    let index: AssetIndexFile =
        serde_json::from_str(&content).with_context(|| format!("parse {:?}", index_path))?;

    let objects_dir = profile.asset_objects_dir();
    let resource_base = profile.urls.resource.trim_end_matches('/').to_string();
    let total = index.objects.len();
    let settled = Arc::new(AtomicUsize::new(0));

    let results: Vec<Result<()>> = stream::iter(index.objects.iter())
        .map(|(logical, object)| {
            let objects_dir = objects_dir.clone();
            let resource_base = resource_base.clone();
            let settled = Arc::clone(&settled);
            let sink = Arc::clone(sink);

            async move {
                let prefix = &object.hash[..2];
                let dir = objects_dir.join(prefix);
                let target = dir.join(&object.hash);

                let present =
                    target.exists() && hash::sha1_matches(&target, &object.hash).await;
                if !present {
                    let url = format!("{}/{}/{}", resource_base, prefix, object.hash);
                    let outcome = fetcher
                        .fetch_checked(&url, &dir, &object.hash, "assets", Some(&object.hash))
                        .await
                        .with_context(|| format!("fetch asset object {}", logical))?;
                    // An absent object is never recorded-and-continued:
                    // every indexed object must exist with its hash once
                    // this phase succeeds.
                    if outcome.completed().is_none() {
                        return Err(LaunchError::FetchFailed { url })
                            .with_context(|| format!("asset object {} missing upstream", logical));
                    }
                }

                let done = settled.fetch_add(1, Ordering::SeqCst) + 1;
                sink.progress("assets", done, total);
                Ok(())
            }
        })
        .buffer_unordered(profile.max_sockets.max(1))
        .collect()
        .await;

    for result in results {
        result?;
    }

    if descriptor.is_legacy_assets() {
        mirror_legacy_tree(sink, profile, &index).await?;
    }

    Ok(())
}

/// Copy each object to its logical path under `assets/legacy/`, the layout
/// pre-1.7 clients read directly.
async fn mirror_legacy_tree(
    sink: &Arc<dyn EventSink>,
    profile: &Profile,
    index: &AssetIndexFile,
) -> Result<()> {
    let legacy_root = profile.legacy_assets_dir();
    let objects_dir = profile.asset_objects_dir();
    let total = index.objects.len();
    let mut done = 0;

    for (logical, object) in &index.objects {
        let source = objects_dir.join(&object.hash[..2]).join(&object.hash);
        let dest = legacy_root.join(logical);

        if !dest.exists() {
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(&source, &dest)
                .await
                .with_context(|| format!("mirror asset {} to {:?}", logical, dest))?;
        }

        done += 1;
        sink.progress("assets-copy", done, total);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::test_support::RecordingSink;
    use crate::events::SilentSink;
    use crate::options::{LaunchOptions, Profile, VersionSelector};
    use crate::version::AssetIndexRef;
    use sha1::{Digest, Sha1};

    fn profile_at(root: &std::path::Path) -> Profile {
        Profile::resolve(LaunchOptions {
            root: root.to_path_buf(),
            version: VersionSelector {
                number: "1.7.10".to_string(),
                release_type: "release".to_string(),
                custom: None,
            },
            ..Default::default()
        })
        .unwrap()
    }

    fn sha1_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha1::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    /// With every object already present and hash-valid, the phase settles
    /// without network access and mirrors the legacy tree.
    #[tokio::test]
    async fn settled_store_mirrors_legacy_tree_offline() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = profile_at(tmp.path());

        let body = b"pack.mcmeta content";
        let digest = sha1_hex(body);

        // Content-addressed object already in place.
        let object_dir = profile.asset_objects_dir().join(&digest[..2]);
        std::fs::create_dir_all(&object_dir).unwrap();
        std::fs::write(object_dir.join(&digest), body).unwrap();

        // Index file already in place.
        let index = format!(
            r#"{{"objects": {{"sounds/pig/oink.ogg": {{"hash": "{}", "size": {}}}}}}}"#,
            digest,
            body.len()
        );
        std::fs::create_dir_all(profile.asset_indexes_dir()).unwrap();
        std::fs::write(profile.asset_indexes_dir().join("legacy.json"), index).unwrap();

        let descriptor = VersionDescriptor {
            id: "1.7.10".to_string(),
            assets: Some("legacy".to_string()),
            asset_index: Some(AssetIndexRef {
                id: "legacy".to_string(),
                url: "https://example.invalid/legacy.json".to_string(),
                sha1: None,
                size: None,
            }),
            ..Default::default()
        };

        let sink = Arc::new(RecordingSink::default());
        let sink_dyn: Arc<dyn EventSink> = sink.clone();
        let fetcher = Fetcher::new(Arc::new(SilentSink), 2).unwrap();

        materialize_assets(&fetcher, &sink_dyn, &profile, &descriptor)
            .await
            .unwrap();

        let mirrored = profile.legacy_assets_dir().join("sounds/pig/oink.ogg");
        assert_eq!(std::fs::read(mirrored).unwrap(), body);

        let progress = sink.progress.lock().unwrap();
        assert!(progress.contains(&("assets".to_string(), 1, 1)));
        assert!(progress.contains(&("assets-copy".to_string(), 1, 1)));
    }

    #[tokio::test]
    async fn modern_versions_do_not_mirror() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = profile_at(tmp.path());

        let body = b"texture";
        let digest = sha1_hex(body);

        let object_dir = profile.asset_objects_dir().join(&digest[..2]);
        std::fs::create_dir_all(&object_dir).unwrap();
        std::fs::write(object_dir.join(&digest), body).unwrap();

        let index = format!(
            r#"{{"objects": {{"textures/stone.png": {{"hash": "{}", "size": {}}}}}}}"#,
            digest,
            body.len()
        );
        std::fs::create_dir_all(profile.asset_indexes_dir()).unwrap();
        std::fs::write(profile.asset_indexes_dir().join("1.19.json"), index).unwrap();

        let descriptor = VersionDescriptor {
            id: "1.19.2".to_string(),
            assets: Some("1.19".to_string()),
            asset_index: Some(AssetIndexRef {
                id: "1.19".to_string(),
                url: "https://example.invalid/1.19.json".to_string(),
                sha1: None,
                size: None,
            }),
            ..Default::default()
        };

        let sink: Arc<dyn EventSink> = Arc::new(SilentSink);
        let fetcher = Fetcher::new(Arc::new(SilentSink), 2).unwrap();

        materialize_assets(&fetcher, &sink, &profile, &descriptor)
            .await
            .unwrap();

        assert!(!profile.legacy_assets_dir().exists());
    }

    #[tokio::test]
    async fn descriptor_without_index_is_a_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = profile_at(tmp.path());
        let descriptor = VersionDescriptor::default();

        let sink: Arc<dyn EventSink> = Arc::new(SilentSink);
        let fetcher = Fetcher::new(Arc::new(SilentSink), 2).unwrap();

        materialize_assets(&fetcher, &sink, &profile, &descriptor)
            .await
            .unwrap();
    }
}
