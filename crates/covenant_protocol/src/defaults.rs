//! Shared constants and environment-tunable limits.

/// Maximum Object/Array nesting depth a schema may reach.
///
/// Resolution beyond this depth produces an `Invalid` node instead of
/// recursing further, which also terminates cyclic nominal references.
pub const MAX_NESTING_DEPTH: usize = 3;

/// Default in-memory buffer ceiling before streamed rows spill to the
/// columnar store (5 MiB).
pub const AUTO_SPILL_THRESHOLD_BYTES: usize = 5 * 1024 * 1024;

/// Row-count bound per buffered group; reaching it forces a spill even if
/// the byte threshold was not crossed.
pub const ROW_GROUP_SIZE: usize = 10_000;

/// Environment variable overriding [`AUTO_SPILL_THRESHOLD_BYTES`].
pub const MEMORY_THRESHOLD_ENV: &str = "COVENANT_MEMORY_THRESHOLD";

/// Resolve the effective spill threshold, honoring the env override.
pub fn spill_threshold_bytes() -> usize {
    std::env::var(MEMORY_THRESHOLD_ENV)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(AUTO_SPILL_THRESHOLD_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threshold_without_env() {
        // Other tests don't set the env var, so the default applies.
        assert_eq!(spill_threshold_bytes(), AUTO_SPILL_THRESHOLD_BYTES);
    }
}
