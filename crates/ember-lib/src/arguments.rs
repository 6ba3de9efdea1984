use crate::forge::Overlay;
use crate::options::{path_string, Profile};
use crate::platform::OsType;
use crate::version::rules::{arg_rules_allow, FeatureContext};
use crate::version::{Arg, ArgValue, ArgsShape, VersionDescriptor};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Everything the synthesizer needs to turn a resolved install into the
/// token list handed to the JVM.
pub struct SynthesisInput<'a> {
    pub profile: &'a Profile,
    pub vanilla: &'a VersionDescriptor,
    pub overlay: &'a Overlay,
    /// Vanilla classpath entries, in descriptor order.
    pub vanilla_libraries: &'a [PathBuf],
    /// Custom-overlay classpath entries; empty unless the overlay is
    /// a custom descriptor.
    pub custom_libraries: &'a [PathBuf],
    pub client_jar: &'a Path,
    pub natives_dir: &'a Path,
    pub os: OsType,
}

/// Build the complete argument list: JVM flags, classpath, main class and
/// game arguments, fully substituted.
pub fn synthesize(input: &SynthesisInput) -> Vec<String> {
    let profile = input.profile;
    let mut tokens: Vec<String> = vec![
        "-XX:-UseAdaptiveSizePolicy".to_string(),
        "-XX:-OmitStackTraceInFastThrow".to_string(),
        "-Dfml.ignorePatchDiscrepancies=true".to_string(),
        "-Dfml.ignoreInvalidMinecraftCertificates=true".to_string(),
        format!("-Djava.library.path={}", input.natives_dir.display()),
        format!("-Xmx{}M", profile.memory.max),
        format!("-Xms{}M", profile.memory.min),
    ];

    if let Some(flag) = input.os.jvm_extra_flag(input.vanilla.minor_version()) {
        tokens.push(flag.to_string());
    }

    tokens.extend(profile.custom_args.iter().cloned());

    tokens.push("-cp".to_string());
    tokens.push(compose_classpath(input));

    tokens.push(input.overlay.main_class(input.vanilla).to_string());

    tokens.extend(game_tokens(input));
    tokens
}

/// Overlay-aware classpath: forge jar and libraries first when present,
/// then the modification's libraries, vanilla's, any extra entries, and
/// the client jar last. Deduplicated textually, order preserved.
fn compose_classpath(input: &SynthesisInput) -> String {
    let mut entries: Vec<String> = Vec::new();

    for path in input.overlay.classpath_prefix() {
        entries.push(path_string(&path));
    }
    for path in input.custom_libraries {
        entries.push(path_string(path));
    }
    for path in input.vanilla_libraries {
        entries.push(path_string(path));
    }
    for path in &input.profile.extra_classes {
        entries.push(path_string(path));
    }
    entries.push(path_string(input.client_jar));

    let mut seen = HashSet::new();
    entries.retain(|entry| seen.insert(entry.clone()));

    entries.join(input.os.classpath_separator())
}

fn game_tokens(input: &SynthesisInput) -> Vec<String> {
    let profile = input.profile;
    let features = FeatureContext {
        has_custom_resolution: profile
            .window
            .as_ref()
            .is_some_and(|w| w.width.is_some() && w.height.is_some()),
        is_demo_user: profile.authorization.name == "Player"
            || profile.authorization.uuid == "00000000-0000-0000-0000-000000000000"
            || profile.authorization.access_token == "0",
    };

    let table = substitution_table(input);
    let mut tokens = match input.overlay.descriptor() {
        Some(modification) => {
            let mut tokens = flatten(modification, input.os, &features, &table);
            let threshold = profile.min_args.unwrap_or(if input.vanilla.is_legacy_assets() {
                5
            } else {
                11
            });
            if tokens.len() < threshold {
                tokens.extend(flatten(input.vanilla, input.os, &features, &table));
            }
            tokens
        }
        None => flatten(input.vanilla, input.os, &features, &table),
    };

    if let Some(window) = &profile.window {
        if window.fullscreen {
            tokens.push("--fullscreen".to_string());
        } else if let (Some(width), Some(height)) = (window.width, window.height) {
            tokens.push("--width".to_string());
            tokens.push(width.to_string());
            tokens.push("--height".to_string());
            tokens.push(height.to_string());
        }
    }

    if let Some(server) = &profile.server {
        tokens.push("--server".to_string());
        tokens.push(server.host.clone());
        tokens.push("--port".to_string());
        tokens.push(server.port.unwrap_or(25565).to_string());
    }

    if let Some(proxy) = &profile.proxy {
        tokens.push("--proxyHost".to_string());
        tokens.push(proxy.host.clone());
        tokens.push("--proxyPort".to_string());
        tokens.push(proxy.port.to_string());
        if let Some(user) = &proxy.username {
            tokens.push("--proxyUser".to_string());
            tokens.push(user.clone());
        }
        if let Some(pass) = &proxy.password {
            tokens.push("--proxyPass".to_string());
            tokens.push(pass.clone());
        }
    }

    tokens.extend(profile.custom_launch_args.iter().cloned());
    tokens
}

/// Flatten a descriptor's game arguments into substituted tokens.
/// Structured entries contribute their value(s) only when their rules
/// pass. A token left with an unbound placeholder is dropped together
/// with the flag token that introduced it, and for conditional entries
/// the whole group drops, so no orphan flag survives.
fn flatten(
    descriptor: &VersionDescriptor,
    os: OsType,
    features: &FeatureContext,
    table: &HashMap<&'static str, String>,
) -> Vec<String> {
    match descriptor.args_shape() {
        ArgsShape::Legacy(line) => split_preserving_quotes(line)
            .iter()
            .map(|token| substitute(token, table))
            .collect(),
        ArgsShape::Modern(args) => {
            let mut tokens: Vec<String> = Vec::new();
            for arg in args {
                match arg {
                    Arg::Token(token) => {
                        let substituted = substitute(token, table);
                        if substituted.contains("${") {
                            if tokens.last().is_some_and(|prev| prev.starts_with("--")) {
                                tokens.pop();
                            }
                            log::debug!("dropping token with unbound placeholder: {}", token);
                            continue;
                        }
                        tokens.push(substituted);
                    }
                    Arg::Conditional { rules, value } => {
                        if !arg_rules_allow(rules, os, features) {
                            continue;
                        }
                        let group: Vec<String> = match value {
                            ArgValue::Single(token) => vec![substitute(token, table)],
                            ArgValue::Many(values) => {
                                values.iter().map(|token| substitute(token, table)).collect()
                            }
                        };
                        if group.iter().any(|token| token.contains("${")) {
                            log::debug!("dropping conditional group with unbound placeholder");
                            continue;
                        }
                        tokens.extend(group);
                    }
                }
            }
            tokens
        }
        ArgsShape::Absent => Vec::new(),
    }
}

fn substitution_table(input: &SynthesisInput) -> HashMap<&'static str, String> {
    let profile = input.profile;
    let auth = &profile.authorization;

    let assets_path = if input.vanilla.is_legacy_assets() {
        path_string(&profile.legacy_assets_dir())
    } else {
        path_string(&profile.asset_root)
    };

    let index_name = input
        .vanilla
        .asset_index
        .as_ref()
        .map(|index| index.id.clone())
        .or_else(|| input.vanilla.assets.clone())
        .unwrap_or_default();

    let version_type = if profile.version_type.is_empty() {
        input
            .vanilla
            .version_type
            .clone()
            .unwrap_or_else(|| "release".to_string())
    } else {
        profile.version_type.clone()
    };

    let mut table = HashMap::new();
    if let Some(window) = &profile.window {
        if let (Some(width), Some(height)) = (window.width, window.height) {
            table.insert("resolution_width", width.to_string());
            table.insert("resolution_height", height.to_string());
        }
    }
    table.insert("auth_access_token", auth.access_token.clone());
    table.insert("auth_session", auth.access_token.clone());
    table.insert("auth_player_name", auth.name.clone());
    table.insert("auth_uuid", auth.uuid.clone());
    table.insert("user_properties", auth.user_properties.clone());
    table.insert("user_type", "mojang".to_string());
    table.insert("version_name", profile.version_number.clone());
    table.insert("version_type", version_type);
    table.insert("assets_index_name", index_name);
    table.insert("game_directory", path_string(&profile.game_directory));
    table.insert("assets_root", assets_path.clone());
    table.insert("game_assets", assets_path);
    table
}

fn substitute(token: &str, table: &HashMap<&'static str, String>) -> String {
    let mut result = token.to_string();
    for (key, value) in table {
        let placeholder = format!("${{{}}}", key);
        if result.contains(&placeholder) {
            result = result.replace(&placeholder, value);
        }
    }
    result
}

/// Split on whitespace while honoring single and double quotes; quotes are
/// stripped from the produced tokens.
fn split_preserving_quotes(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut in_double = false;
    let mut in_single = false;

    for c in line.chars() {
        match c {
            '"' if !in_single => in_double = !in_double,
            '\'' if !in_double => in_single = !in_single,
            c if c.is_whitespace() && !in_double && !in_single => {
                if !buf.is_empty() {
                    tokens.push(std::mem::take(&mut buf));
                }
            }
            c => buf.push(c),
        }
    }

    if !buf.is_empty() {
        tokens.push(buf);
    }

    tokens
}
