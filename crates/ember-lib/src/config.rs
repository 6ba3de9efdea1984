//! Default endpoints and tuning knobs.
//! Every URL here can be overridden per launch through `overrides.url`.

pub const META_BASE_URL: &str = "https://launchermeta.mojang.com";
pub const RESOURCE_BASE_URL: &str = "https://resources.download.minecraft.net";
pub const FORGE_MAVEN_URL: &str = "http://files.minecraftforge.net/maven/";
pub const DEFAULT_REPO_URL: &str = "https://libraries.minecraft.net/";
pub const FALLBACK_MAVEN_URL: &str = "https://search.maven.org/remotecontent?filepath=";

pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Global cap on concurrent HTTP transfers unless overridden.
pub const DEFAULT_MAX_SOCKETS: usize = 2;

/// Pinned ForgeWrapper release used for modern Forge installers.
pub const FORGE_WRAPPER_VERSION: &str = "1.6.0";
pub const FORGE_WRAPPER_RELEASE_URL: &str =
    "https://github.com/ZekerZhayard/ForgeWrapper/releases/download";
