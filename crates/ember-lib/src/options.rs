use crate::config;
use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Caller-facing launch configuration. Field names match the JSON shape an
/// embedding launcher would persist, so the whole bag derives `Deserialize`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LaunchOptions {
    /// Root directory; every other path derives from it unless overridden.
    pub root: PathBuf,
    pub version: VersionSelector,
    pub memory: Memory,
    pub java_path: Option<PathBuf>,
    /// Path to a Forge installer or universal jar.
    pub forge: Option<PathBuf>,
    /// Generic installer executed before launch.
    pub installer: Option<PathBuf>,
    /// URL or local path of a zip pre-extracted into `root`.
    pub client_package: Option<String>,
    pub remove_package: bool,
    pub authorization: Authorization,
    pub window: Option<Window>,
    pub server: Option<Server>,
    pub proxy: Option<Proxy>,
    /// Extra JVM tokens, inserted before the classpath.
    pub custom_args: Vec<String>,
    /// Extra game tokens, appended last.
    pub custom_launch_args: Vec<String>,
    pub overrides: Overrides,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VersionSelector {
    pub number: String,
    #[serde(rename = "type")]
    pub release_type: String,
    /// Names a second descriptor under `versions/` layered over vanilla.
    pub custom: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Memory {
    /// `-Xms`, in megabytes.
    pub min: u32,
    /// `-Xmx`, in megabytes.
    pub max: u32,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            min: 512,
            max: 2048,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Authorization {
    pub access_token: String,
    pub name: String,
    pub uuid: String,
    pub user_properties: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Window {
    pub fullscreen: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Proxy {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Overrides {
    /// Game directory handed to the child (`${game_directory}`).
    pub directory: Option<PathBuf>,
    pub natives: Option<PathBuf>,
    pub asset_root: Option<PathBuf>,
    pub library_root: Option<PathBuf>,
    pub cwd: Option<PathBuf>,
    pub minecraft_jar: Option<PathBuf>,
    pub version_json: Option<PathBuf>,
    /// Extra classpath entries appended after the libraries.
    pub classes: Vec<PathBuf>,
    pub max_sockets: Option<usize>,
    pub min_args: Option<usize>,
    pub detached: Option<bool>,
    pub url: UrlOverrides,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UrlOverrides {
    pub meta: Option<String>,
    pub resource: Option<String>,
    pub maven_forge: Option<String>,
    pub default_repo_forge: Option<String>,
    pub fallback_maven: Option<String>,
}

/// Endpoint set after defaulting.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub meta: String,
    pub resource: String,
    pub maven_forge: String,
    pub default_repo: String,
    pub fallback_maven: String,
}

/// Immutable, fully-defaulted view of one launch. Built once by
/// [`Profile::resolve`]; the rest of the pipeline reads only this.
#[derive(Debug, Clone)]
pub struct Profile {
    pub root: PathBuf,
    pub version_number: String,
    pub version_type: String,
    pub custom_version: Option<String>,
    pub memory: Memory,
    pub java: PathBuf,
    pub forge: Option<PathBuf>,
    pub installer: Option<PathBuf>,
    pub client_package: Option<String>,
    pub remove_package: bool,
    pub authorization: Authorization,
    pub window: Option<Window>,
    pub server: Option<Server>,
    pub proxy: Option<Proxy>,
    pub custom_args: Vec<String>,
    pub custom_launch_args: Vec<String>,

    pub game_directory: PathBuf,
    pub natives_dir: PathBuf,
    pub asset_root: PathBuf,
    pub library_root: PathBuf,
    pub cwd: PathBuf,
    pub minecraft_jar: Option<PathBuf>,
    pub version_json: Option<PathBuf>,
    pub extra_classes: Vec<PathBuf>,
    pub max_sockets: usize,
    pub min_args: Option<usize>,
    pub detached: bool,
    pub urls: Endpoints,
}

impl Profile {
    pub fn resolve(options: LaunchOptions) -> Result<Self> {
        anyhow::ensure!(
            !options.version.number.is_empty(),
            "version.number is required"
        );

        let root = options.root.clone();
        let o = options.overrides;

        let java = match options.java_path {
            Some(path) => path,
            None => which::which("java").unwrap_or_else(|_| PathBuf::from("java")),
        };

        let urls = Endpoints {
            meta: o.url.meta.unwrap_or_else(|| config::META_BASE_URL.into()),
            resource: o
                .url
                .resource
                .unwrap_or_else(|| config::RESOURCE_BASE_URL.into()),
            maven_forge: o
                .url
                .maven_forge
                .unwrap_or_else(|| config::FORGE_MAVEN_URL.into()),
            default_repo: o
                .url
                .default_repo_forge
                .unwrap_or_else(|| config::DEFAULT_REPO_URL.into()),
            fallback_maven: o
                .url
                .fallback_maven
                .unwrap_or_else(|| config::FALLBACK_MAVEN_URL.into()),
        };

        Ok(Self {
            game_directory: o.directory.unwrap_or_else(|| root.clone()),
            natives_dir: o
                .natives
                .unwrap_or_else(|| root.join("natives").join(&options.version.number)),
            asset_root: o.asset_root.unwrap_or_else(|| root.join("assets")),
            library_root: o.library_root.unwrap_or_else(|| root.join("libraries")),
            cwd: o.cwd.unwrap_or_else(|| root.clone()),
            minecraft_jar: o.minecraft_jar,
            version_json: o.version_json,
            extra_classes: o.classes,
            max_sockets: o.max_sockets.unwrap_or(config::DEFAULT_MAX_SOCKETS),
            min_args: o.min_args,
            detached: o.detached.unwrap_or(true),
            urls,
            root,
            version_number: options.version.number,
            version_type: options.version.release_type,
            custom_version: options.version.custom,
            memory: options.memory,
            java,
            forge: options.forge,
            installer: options.installer,
            client_package: options.client_package,
            remove_package: options.remove_package,
            authorization: options.authorization,
            window: options.window,
            server: options.server,
            proxy: options.proxy,
            custom_args: options.custom_args,
            custom_launch_args: options.custom_launch_args,
        })
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_dir(&self) -> PathBuf {
        self.versions_dir().join(&self.version_number)
    }

    /// `versions/<id>/<id>.json`, unless overridden.
    pub fn version_json_path(&self) -> PathBuf {
        match &self.version_json {
            Some(path) => path.clone(),
            None => self
                .version_dir()
                .join(format!("{}.json", self.version_number)),
        }
    }

    /// `versions/<id>/<id>.jar`, unless overridden.
    pub fn client_jar_path(&self) -> PathBuf {
        match &self.minecraft_jar {
            Some(path) => path.clone(),
            None => self
                .version_dir()
                .join(format!("{}.jar", self.version_number)),
        }
    }

    pub fn asset_indexes_dir(&self) -> PathBuf {
        self.asset_root.join("indexes")
    }

    pub fn asset_objects_dir(&self) -> PathBuf {
        self.asset_root.join("objects")
    }

    pub fn legacy_assets_dir(&self) -> PathBuf {
        self.asset_root.join("legacy")
    }

    pub fn forge_dir(&self) -> PathBuf {
        self.root.join("forge").join(&self.version_number)
    }

    /// Descriptor path for a named custom version under `versions/`.
    pub fn custom_json_path(&self, name: &str) -> PathBuf {
        self.versions_dir().join(name).join(format!("{}.json", name))
    }

    pub(crate) fn load_custom_descriptor_path(&self) -> Option<PathBuf> {
        self.custom_version
            .as_deref()
            .map(|name| self.custom_json_path(name))
    }
}

pub(crate) fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options_for(root: &str) -> LaunchOptions {
        LaunchOptions {
            root: PathBuf::from(root),
            version: VersionSelector {
                number: "1.8.9".to_string(),
                release_type: "release".to_string(),
                custom: None,
            },
            ..Default::default()
        }
    }

    #[test]
    fn profile_defaults_derive_from_root() {
        let profile = Profile::resolve(options_for("/tmp/mc")).unwrap();

        assert_eq!(profile.library_root, PathBuf::from("/tmp/mc/libraries"));
        assert_eq!(profile.asset_root, PathBuf::from("/tmp/mc/assets"));
        assert_eq!(profile.natives_dir, PathBuf::from("/tmp/mc/natives/1.8.9"));
        assert_eq!(profile.cwd, PathBuf::from("/tmp/mc"));
        assert_eq!(profile.game_directory, PathBuf::from("/tmp/mc"));
        assert_eq!(profile.max_sockets, 2);
        assert!(profile.detached);
        assert_eq!(
            profile.version_json_path(),
            PathBuf::from("/tmp/mc/versions/1.8.9/1.8.9.json")
        );
        assert_eq!(
            profile.client_jar_path(),
            PathBuf::from("/tmp/mc/versions/1.8.9/1.8.9.jar")
        );
    }

    #[test]
    fn profile_requires_version_number() {
        let mut options = options_for("/tmp/mc");
        options.version.number.clear();
        assert!(Profile::resolve(options).is_err());
    }

    #[test]
    fn overrides_win_over_derived_paths() {
        let mut options = options_for("/tmp/mc");
        options.overrides.library_root = Some(PathBuf::from("/data/libs"));
        options.overrides.max_sockets = Some(4);
        options.overrides.url.meta = Some("http://127.0.0.1:8080".to_string());

        let profile = Profile::resolve(options).unwrap();
        assert_eq!(profile.library_root, PathBuf::from("/data/libs"));
        assert_eq!(profile.max_sockets, 4);
        assert_eq!(profile.urls.meta, "http://127.0.0.1:8080");
        assert_eq!(profile.urls.resource, crate::config::RESOURCE_BASE_URL);
    }

    #[test]
    fn options_deserialize_from_json() {
        let doc = r#"{
            "root": "/tmp/mc",
            "version": {"number": "1.19.2", "type": "release", "custom": "fabric-1.19.2"},
            "memory": {"min": 1024, "max": 4096},
            "authorization": {
                "access_token": "T",
                "name": "Steve",
                "uuid": "U",
                "user_properties": "{}"
            },
            "overrides": {"maxSockets": 8, "url": {"resource": "http://localhost"}}
        }"#;

        let options: LaunchOptions = serde_json::from_str(doc).unwrap();
        assert_eq!(options.version.custom.as_deref(), Some("fabric-1.19.2"));
        assert_eq!(options.memory.max, 4096);
        assert_eq!(options.overrides.max_sockets, Some(8));

        let profile = Profile::resolve(options).unwrap();
        assert_eq!(profile.urls.resource, "http://localhost");
        assert_eq!(
            profile.custom_json_path("fabric-1.19.2"),
            PathBuf::from("/tmp/mc/versions/fabric-1.19.2/fabric-1.19.2.json")
        );
    }
}
