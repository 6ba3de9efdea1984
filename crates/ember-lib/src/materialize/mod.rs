pub mod assets;
pub mod libraries;
pub mod natives;

/// Join a maven root and a repository-relative path. Roots that end in a
/// path or query delimiter (the fallback search endpoint ends in `=`) are
/// concatenated verbatim.
pub(crate) fn join_maven_url(base: &str, rel: &str) -> String {
    if base.ends_with('/') || base.ends_with('=') {
        format!("{}{}", base, rel)
    } else {
        format!("{}/{}", base, rel)
    }
}

#[cfg(test)]
mod tests {
    use super::join_maven_url;

    #[test]
    fn joins_with_and_without_trailing_slash() {
        assert_eq!(
            join_maven_url("https://libraries.minecraft.net/", "a/b/c.jar"),
            "https://libraries.minecraft.net/a/b/c.jar"
        );
        assert_eq!(
            join_maven_url("https://repo.example.org", "a/b/c.jar"),
            "https://repo.example.org/a/b/c.jar"
        );
        assert_eq!(
            join_maven_url(
                "https://search.maven.org/remotecontent?filepath=",
                "a/b/c.jar"
            ),
            "https://search.maven.org/remotecontent?filepath=a/b/c.jar"
        );
    }
}
