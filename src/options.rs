use serde::{Deserialize, Serialize};

/// Duplicate key handling policy for mappings.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateKeyPolicy {
    /// Error out on encountering a duplicate key.
    Error,
    /// First key wins: later duplicate pairs are consumed and ignored.
    FirstWins,
    /// Last key wins: later duplicate pairs override earlier ones.
    LastWins,
}

/// Limits applied to alias replay to harden against alias bombs.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AliasLimits {
    /// Maximum total number of **replayed** events injected from aliases across a document.
    pub max_total_replayed_events: usize,
    /// Maximum depth of the alias replay stack (nested alias → injected buffer → alias, etc.).
    pub max_replay_stack_depth: usize,
    /// Maximum number of times a **single anchor id** may be expanded via alias.
    /// Use `usize::MAX` for "unlimited".
    pub max_alias_expansions_per_anchor: usize,
}

impl Default for AliasLimits {
    fn default() -> Self {
        Self {
            max_total_replayed_events: 1_000_000,
            max_replay_stack_depth: 64,
            max_alias_expansions_per_anchor: usize::MAX,
        }
    }
}

/// Deserializer configuration options.
///
/// Example: configure a deserializer with custom `Options`.
///
/// ```rust
/// use saphyr_dispatch::options::DuplicateKeyPolicy;
/// use saphyr_dispatch::{DeserializerBuilder, TypeRef};
///
/// let options = saphyr_dispatch::options! {
///     duplicate_keys: DuplicateKeyPolicy::LastWins,
///     strict_booleans: true,
/// };
///
/// let de = DeserializerBuilder::new().with_options(options).build();
/// let v = de.from_str("a: 1\na: 2\n", &TypeRef::any()).unwrap();
/// assert_eq!(v.as_mapping().unwrap().get_str("a").and_then(|v| v.as_i64()), Some(2));
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Policy for duplicate mapping keys.
    pub duplicate_keys: DuplicateKeyPolicy,
    /// Limits for alias replay to harden against alias bombs.
    pub alias_limits: AliasLimits,
    /// Enable legacy octal parsing where values starting with `00` are treated as base-8.
    /// They are deprecated in YAML 1.2. Default: false.
    pub legacy_octal_numbers: bool,
    /// If true, interpret only the YAML 1.2 literals `true` and `false` as booleans.
    /// YAML 1.1 forms like `yes`/`no`/`on`/`off` will be rejected for boolean targets.
    /// Default: false (accept YAML 1.1 boolean forms).
    pub strict_booleans: bool,
    /// If true, mapping keys that do not match any field of an object type are skipped
    /// instead of failing. Default: false.
    pub ignore_unmatched: bool,
    /// If true (default), node tags that are neither core tags nor registered tag mappings
    /// fail deserialization.
    pub reject_unknown_tags: bool,
    /// Maximum nesting depth of nodes. Default: 256.
    pub max_depth: usize,
    /// If true (default), errors returned from APIs that have the YAML text at hand are
    /// wrapped with a rendered source snippet.
    pub with_snippet: bool,
    /// Horizontal crop radius (in characters) for snippet rendering of long lines.
    pub crop_radius: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            duplicate_keys: DuplicateKeyPolicy::Error,
            alias_limits: AliasLimits::default(),
            legacy_octal_numbers: false,
            strict_booleans: false,
            ignore_unmatched: false,
            reject_unknown_tags: true,
            max_depth: 256,
            with_snippet: true,
            crop_radius: 64,
        }
    }
}
