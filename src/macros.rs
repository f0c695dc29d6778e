//! Public macros for constructing option structs without relying on struct literal syntax.
//!
//! These macros keep call sites ergonomic while allowing the crate to add fields to its
//! option structs without breaking changes.

/// Construct [`crate::Options`] from `Default` and a list of field assignments.
///
/// Example:
///
/// ```rust
/// use saphyr_dispatch::options::DuplicateKeyPolicy;
///
/// let options = saphyr_dispatch::options! {
///     duplicate_keys: DuplicateKeyPolicy::FirstWins,
///     max_depth: 32,
/// };
/// assert_eq!(options.max_depth, 32);
/// ```
#[macro_export]
macro_rules! options {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        let mut opt = $crate::Options::default();
        $(
            #[allow(deprecated)]
            {
                opt.$field = $value;
            }
        )*
        opt
    }};
}

/// Construct [`crate::options::AliasLimits`] from `Default` and a list of field assignments.
///
/// ```rust
/// let limits = saphyr_dispatch::alias_limits! {
///     max_alias_expansions_per_anchor: 2,
/// };
/// assert_eq!(limits.max_alias_expansions_per_anchor, 2);
/// ```
#[macro_export]
macro_rules! alias_limits {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        let mut limits = $crate::options::AliasLimits::default();
        $(
            {
                limits.$field = $value;
            }
        )*
        limits
    }};
}
