//! Render limits.
//!
//! Quotas are the only bound on runaway scripts: there is no wall-clock
//! timeout. Every ceiling trips deterministically.

/// Configured ceilings for one render.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct RenderLimits {
    /// AST node evaluations per render.
    pub max_evaluations: u64,
    /// Nested partial/page renders.
    pub max_stack_depth: usize,
    /// Iterations of a single loop, and the largest generated collection.
    pub max_quota: u64,
    /// Native recursion depth of the Lisp evaluator.
    pub max_lisp_depth: usize,
}

impl Default for RenderLimits {
    fn default() -> Self {
        RenderLimits {
            max_evaluations: 1_000_000,
            max_stack_depth: 25,
            max_quota: 10_000,
            max_lisp_depth: 4_096,
        }
    }
}

impl RenderLimits {
    #[must_use]
    pub fn with_max_evaluations(mut self, max: u64) -> Self {
        self.max_evaluations = max;
        self
    }

    #[must_use]
    pub fn with_max_stack_depth(mut self, max: usize) -> Self {
        self.max_stack_depth = max;
        self
    }

    #[must_use]
    pub fn with_max_quota(mut self, max: u64) -> Self {
        self.max_quota = max;
        self
    }

    #[must_use]
    pub fn with_max_lisp_depth(mut self, max: usize) -> Self {
        self.max_lisp_depth = max;
        self
    }

    /// Defaults overridden by `QUILL_MAX_EVALUATIONS`, `QUILL_MAX_STACK_DEPTH`,
    /// `QUILL_MAX_QUOTA` and `QUILL_MAX_LISP_DEPTH`. Unparseable values are
    /// ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn read<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
            target: &mut T,
        ) {
            let Some(raw) = lookup(key) else { return };
            match raw.trim().parse() {
                Ok(v) => *target = v,
                Err(_) => tracing::warn!(key, value = %raw, "ignoring invalid render limit"),
            }
        }

        let mut limits = RenderLimits::default();
        read(&lookup, "QUILL_MAX_EVALUATIONS", &mut limits.max_evaluations);
        read(&lookup, "QUILL_MAX_STACK_DEPTH", &mut limits.max_stack_depth);
        read(&lookup, "QUILL_MAX_QUOTA", &mut limits.max_quota);
        read(&lookup, "QUILL_MAX_LISP_DEPTH", &mut limits.max_lisp_depth);
        limits
    }
}
