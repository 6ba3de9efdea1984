use crate::platform::OsType;
use crate::version::{Rule, RuleAction};

/// Explicit verdict for library inclusion. The manifest corpus only ever
/// uses two rule shapes; anything else is excluded deliberately rather
/// than falling through an undefined result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleVerdict {
    Include,
    Exclude,
}

impl RuleVerdict {
    pub fn is_excluded(self) -> bool {
        self == RuleVerdict::Exclude
    }
}

/// Evaluate a library's inclusion rules against the current OS.
///
/// Recognized shapes:
/// - no rules: include everywhere
/// - a single `allow` carrying an `os` clause: include off-osx only
/// - `allow` followed by `disallow os=osx`: include on osx only
pub fn library_verdict(rules: Option<&[Rule]>, os: OsType) -> RuleVerdict {
    let Some(rules) = rules else {
        return RuleVerdict::Include;
    };

    match rules {
        [] => RuleVerdict::Include,
        [only] if only.action == RuleAction::Allow && only.os.is_some() => {
            if os != OsType::Osx {
                RuleVerdict::Include
            } else {
                RuleVerdict::Exclude
            }
        }
        [first, second]
            if first.action == RuleAction::Allow
                && second.action == RuleAction::Disallow
                && second
                    .os
                    .as_ref()
                    .and_then(|clause| clause.name.as_deref())
                    == Some("osx") =>
        {
            if os == OsType::Osx {
                RuleVerdict::Include
            } else {
                RuleVerdict::Exclude
            }
        }
        _ => RuleVerdict::Exclude,
    }
}

/// Host facts that feature predicates in argument rules test against.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureContext {
    pub has_custom_resolution: bool,
    pub is_demo_user: bool,
}

/// Match-all evaluation for structured argument rules: every rule whose
/// constraints hold applies its action, last applicable action wins,
/// nothing applicable means drop. Unknown features and os-version
/// expressions never match.
pub fn arg_rules_allow(rules: &[Rule], os: OsType, features: &FeatureContext) -> bool {
    let mut allow = false;

    for rule in rules {
        let mut matches = true;

        if let Some(clause) = &rule.os {
            if let Some(name) = &clause.name {
                if name != os.name() {
                    matches = false;
                }
            }
            if matches {
                if let Some(arch) = &clause.arch {
                    if arch != std::env::consts::ARCH {
                        matches = false;
                    }
                }
            }
            if matches && clause.version.is_some() {
                matches = false;
            }
        }

        if matches {
            if let Some(required) = &rule.features {
                for (key, wanted) in required {
                    let satisfied = match key.as_str() {
                        "has_custom_resolution" => features.has_custom_resolution == *wanted,
                        "is_demo_user" => features.is_demo_user == *wanted,
                        _ => false,
                    };
                    if !satisfied {
                        matches = false;
                        break;
                    }
                }
            }
        }

        if matches {
            allow = rule.action == RuleAction::Allow;
        }
    }

    allow
}
