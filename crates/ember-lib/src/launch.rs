use crate::archive;
use crate::arguments::{self, SynthesisInput};
use crate::error::LaunchError;
use crate::events::{emit_debug, EventSink};
use crate::forge::{self, Overlay};
use crate::materialize::assets::materialize_assets;
use crate::materialize::libraries::materialize_libraries;
use crate::materialize::natives::materialize_natives;
use crate::net::Fetcher;
use crate::options::{LaunchOptions, Profile};
use crate::platform::OsType;
use crate::process_ext::CommandDetachExt;
use crate::version::{self, VersionDescriptor};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use url::Url;

/// Handle to the spawned game. Output relaying and exit monitoring keep
/// running in background tasks; the exit code arrives as a `close` event.
#[derive(Debug)]
pub struct GameProcess {
    pub pid: u32,
}

/// Drives the whole pipeline: resolve, materialize, synthesize, spawn.
pub struct Launcher {
    profile: Profile,
    sink: Arc<dyn EventSink>,
    fetcher: Fetcher,
}

impl Launcher {
    pub fn new(options: LaunchOptions, sink: Arc<dyn EventSink>) -> Result<Self> {
        let profile = Profile::resolve(options)?;
        let fetcher = Fetcher::new(sink.clone(), profile.max_sockets)?;
        Ok(Self {
            profile,
            sink,
            fetcher,
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Prepare the installation and spawn the game. Returns once the child
    /// process is running; everything it prints flows out as `data` events
    /// until `close` delivers the exit code.
    pub async fn launch(&self) -> Result<GameProcess> {
        let profile = &self.profile;
        let os = OsType::current();

        if let Err(err) = self.probe_java().await {
            self.sink.close(1);
            return Err(err);
        }

        fs::create_dir_all(&profile.root)
            .await
            .with_context(|| format!("create root {:?}", profile.root))?;

        if let Some(package) = profile.client_package.clone() {
            self.extract_client_package(&package).await?;
        }

        if let Some(installer) = profile.installer.clone() {
            self.run_installer(&installer).await?;
        }

        emit_debug(&self.sink, &format!("resolving version {}", profile.version_number));
        let vanilla = version::resolve_descriptor(&self.fetcher, profile).await?;

        materialize_natives(&self.fetcher, &self.sink, profile, &vanilla.libraries, os).await?;

        let client_jar = self.ensure_client_jar(&vanilla).await?;
        version::persist_descriptor(profile, &vanilla).await?;

        let overlay = self.resolve_overlay(&vanilla, os).await?;

        let vanilla_libraries = materialize_libraries(
            &self.fetcher,
            &self.sink,
            profile,
            &vanilla.libraries,
            os,
            "classes",
        )
        .await?;

        let custom_libraries = match &overlay {
            Overlay::Custom { descriptor } => {
                materialize_libraries(
                    &self.fetcher,
                    &self.sink,
                    profile,
                    &descriptor.libraries,
                    os,
                    "classes-custom",
                )
                .await?
            }
            _ => Vec::new(),
        };

        materialize_assets(&self.fetcher, &self.sink, profile, &vanilla).await?;

        let tokens = arguments::synthesize(&SynthesisInput {
            profile,
            vanilla: &vanilla,
            overlay: &overlay,
            vanilla_libraries: &vanilla_libraries,
            custom_libraries: &custom_libraries,
            client_jar: &client_jar,
            natives_dir: &profile.natives_dir,
            os,
        });
        self.sink.arguments(&tokens);

        self.spawn(tokens).await
    }

    async fn probe_java(&self) -> Result<()> {
        let java = &self.profile.java;
        let output = Command::new(java)
            .arg("-version")
            .output()
            .await
            .map_err(|err| LaunchError::JavaUnavailable(format!("{}: {}", java.display(), err)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(LaunchError::JavaUnavailable(stderr).into());
        }

        // `java -version` reports on stderr.
        if let Some(line) = String::from_utf8_lossy(&output.stderr).lines().next() {
            emit_debug(&self.sink, line);
        }
        Ok(())
    }

    async fn extract_client_package(&self, package: &str) -> Result<()> {
        let profile = &self.profile;

        let zip_path = match Url::parse(package) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                let name = url
                    .path_segments()
                    .and_then(|segments| segments.last())
                    .filter(|segment| !segment.is_empty())
                    .unwrap_or("client-package.zip")
                    .to_string();

                let outcome = self
                    .fetcher
                    .fetch(package, &profile.root, &name, "client-package")
                    .await?;
                match outcome.completed() {
                    Some(path) => path.to_path_buf(),
                    None => anyhow::bail!("client package not found at {}", package),
                }
            }
            _ => PathBuf::from(package),
        };

        emit_debug(&self.sink, &format!("extracting client package {:?}", zip_path));
        archive::extract_zip(&zip_path, &profile.root, &[]).await?;
        self.sink.package_extract();

        if profile.remove_package {
            let _ = fs::remove_file(&zip_path).await;
        }
        Ok(())
    }

    async fn run_installer(&self, installer: &Path) -> Result<()> {
        let profile = &self.profile;

        // Installers expect a profiles stub to register themselves into.
        let profiles = profile.root.join("launcher_profiles.json");
        if !profiles.exists() {
            fs::write(&profiles, "{}").await?;
        }

        let mut command = if installer.extension().and_then(|ext| ext.to_str()) == Some("jar") {
            let mut command = Command::new(&profile.java);
            command.arg("-jar").arg(installer);
            command
        } else {
            Command::new(installer)
        };

        let status = command
            .current_dir(&profile.root)
            .status()
            .await
            .with_context(|| format!("spawn installer {:?}", installer))?;

        if !status.success() {
            return Err(LaunchError::InstallerFailed(status.code().unwrap_or(-1)).into());
        }
        Ok(())
    }

    async fn ensure_client_jar(&self, vanilla: &VersionDescriptor) -> Result<PathBuf> {
        let profile = &self.profile;
        let client_jar = profile.client_jar_path();
        if client_jar.exists() {
            return Ok(client_jar);
        }

        let record = vanilla
            .downloads
            .as_ref()
            .and_then(|downloads| downloads.client.as_ref())
            .with_context(|| format!("descriptor {} has no client download", vanilla.id))?;
        let url = record
            .url
            .as_deref()
            .with_context(|| format!("descriptor {} client download has no url", vanilla.id))?;

        let dir = client_jar
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| profile.version_dir());
        let name = client_jar
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{}.jar", profile.version_number));

        let outcome = self
            .fetcher
            .fetch_checked(url, &dir, &name, "client-jar", record.sha1.as_deref())
            .await
            .context("fetch client jar")?;

        // The client jar is mandatory; a 404 here cannot be skipped.
        if outcome.completed().is_none() {
            return Err(LaunchError::FetchFailed {
                url: url.to_string(),
            })
            .context("client jar missing upstream");
        }

        Ok(client_jar)
    }

    async fn resolve_overlay(&self, vanilla: &VersionDescriptor, os: OsType) -> Result<Overlay> {
        let profile = &self.profile;

        if let Some(forge_jar) = &profile.forge {
            if profile.custom_version.is_some() {
                emit_debug(&self.sink, "forge overlay supersedes version.custom");
            }
            return forge::apply_forge(&self.fetcher, &self.sink, profile, os, forge_jar).await;
        }

        if let Some(path) = profile.load_custom_descriptor_path() {
            let descriptor = version::load_descriptor(&path)
                .await
                .context("load custom version descriptor")?;
            return Ok(Overlay::Custom { descriptor });
        }

        Ok(Overlay::Vanilla)
    }

    async fn spawn(&self, tokens: Vec<String>) -> Result<GameProcess> {
        let profile = &self.profile;
        fs::create_dir_all(&profile.cwd).await?;

        let mut command = Command::new(&profile.java);
        command
            .args(&tokens)
            .current_dir(&profile.cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if profile.detached {
            command.detach();
        }

        let mut child = command.spawn().context("spawn game process")?;
        let pid = child.id().unwrap_or_default();
        log::info!("game process started with pid {}", pid);

        if let Some(stdout) = child.stdout.take() {
            let sink = Arc::clone(&self.sink);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    sink.data(&line);
                }
            });
        }

        if let Some(stderr) = child.stderr.take() {
            let sink = Arc::clone(&self.sink);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    sink.data(&line);
                }
            });
        }

        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    let code = status.code().unwrap_or(-1);
                    log::info!("game process {} exited with {}", pid, code);
                    sink.close(code);
                }
                Err(err) => {
                    log::error!("failed to wait on game process {}: {}", pid, err);
                    sink.close(-1);
                }
            }
        });

        Ok(GameProcess { pid })
    }
}
