use anyhow::{Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Extract a zip/jar into `dest`, preserving relative paths. Entries whose
/// names escape `dest` or fail to read are logged and skipped; vendor
/// native jars are known to ship malformed or duplicated entries.
pub async fn extract_zip(archive: &Path, dest: &Path, exclude: &[String]) -> Result<()> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    let exclude = exclude.to_vec();

    tokio::task::spawn_blocking(move || extract_zip_sync(&archive, &dest, &exclude))
        .await
        .context("extraction task panicked")?
}

fn extract_zip_sync(archive: &Path, dest: &Path, exclude: &[String]) -> Result<()> {
    let file =
        std::fs::File::open(archive).with_context(|| format!("open archive {:?}", archive))?;
    let mut zip =
        zip::ZipArchive::new(file).with_context(|| format!("read archive {:?}", archive))?;

    std::fs::create_dir_all(dest)?;

    for i in 0..zip.len() {
        let mut entry = match zip.by_index(i) {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("skipping unreadable entry #{} in {:?}: {}", i, archive, err);
                continue;
            }
        };

        let Some(rel) = entry.enclosed_name() else {
            log::warn!(
                "skipping entry with unsafe name {:?} in {:?}",
                entry.name(),
                archive
            );
            continue;
        };

        if exclude.iter().any(|prefix| entry.name().starts_with(prefix)) {
            continue;
        }

        let out = dest.join(rel);
        if entry.is_dir() {
            std::fs::create_dir_all(&out)?;
            continue;
        }

        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut target = std::fs::File::create(&out)?;
        if let Err(err) = std::io::copy(&mut entry, &mut target) {
            log::warn!("failed to extract {:?} from {:?}: {}", out, archive, err);
            let _ = std::fs::remove_file(&out);
        }
    }

    Ok(())
}

/// Read a single entry out of an archive without unpacking the rest.
pub async fn read_zip_entry(archive: &Path, entry_name: &str) -> Result<Vec<u8>> {
    let archive = archive.to_path_buf();
    let entry_name = entry_name.to_string();

    tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
        let file = std::fs::File::open(&archive)?;
        let mut zip = zip::ZipArchive::new(file)?;
        let mut entry = zip
            .by_name(&entry_name)
            .with_context(|| format!("{} not found in {:?}", entry_name, archive))?;

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(bytes)
    })
    .await
    .context("archive read task panicked")?
}

/// Whether the archive carries an entry with this exact name.
pub async fn zip_contains(archive: &Path, entry_name: &str) -> Result<bool> {
    let archive = archive.to_path_buf();
    let entry_name = entry_name.to_string();

    tokio::task::spawn_blocking(move || -> Result<bool> {
        let file = std::fs::File::open(&archive)?;
        let mut zip = zip::ZipArchive::new(file)?;
        let found = zip.by_name(&entry_name).is_ok();
        Ok(found)
    })
    .await
    .context("archive probe task panicked")?
}
