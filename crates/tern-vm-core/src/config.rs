//! Interpreter configuration
//!
//! Defaults can be overridden from the environment:
//!
//! - `TERN_BYTECODE_STRICT_ENTRY`: require `Main.main` at load time
//! - `TERN_BYTECODE_UNTRUSTED`: treat input as untrusted (implies strict entry)
//! - `TERN_BYTECODE_MAX_STEPS`: instruction budget per run
//! - `TERN_VM_MAX_CALL_DEPTH`: maximum frame depth

use serde::Deserialize;
use tern_vm_bytecode::{LoaderOptions, TrustConfig};

/// Default instruction budget
pub const DEFAULT_MAX_STEPS: u64 = 10_000_000;
/// Default frame depth limit
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;
/// Default upper bound for `NewArray` sizes
pub const DEFAULT_MAX_ARRAY_LEN: usize = 1_000_000;

/// Loader and interpreter limits for one run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Trust settings forwarded to the loader
    #[serde(flatten)]
    pub trust: TrustConfig,
    /// Instructions executed across all frames before the run is aborted
    pub max_steps: u64,
    /// Frames allowed on the call stack
    pub max_call_depth: usize,
    /// Largest array `NewArray` may allocate
    pub max_array_len: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            trust: TrustConfig::default(),
            max_steps: DEFAULT_MAX_STEPS,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_array_len: DEFAULT_MAX_ARRAY_LEN,
        }
    }
}

fn parse_env_truthy(value: &str) -> bool {
    let value = value.trim();
    !matches!(value, "" | "0")
        && !value.eq_ignore_ascii_case("false")
        && !value.eq_ignore_ascii_case("off")
        && !value.eq_ignore_ascii_case("no")
}

impl VmConfig {
    /// Defaults with process environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` in place of the process environment
    ///
    /// Unparsable numbers and zero limits are ignored.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("TERN_BYTECODE_STRICT_ENTRY") {
            self.trust.strict_entry = Some(parse_env_truthy(&v));
        }
        if let Some(v) = lookup("TERN_BYTECODE_UNTRUSTED") {
            self.trust.untrusted = parse_env_truthy(&v);
        }
        if let Some(n) = lookup("TERN_BYTECODE_MAX_STEPS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|n| *n > 0)
        {
            self.max_steps = n;
        }
        if let Some(n) = lookup("TERN_VM_MAX_CALL_DEPTH")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
        {
            self.max_call_depth = n;
        }
    }

    /// Loader options implied by the trust settings
    pub fn loader_options(&self) -> LoaderOptions {
        self.trust.loader_options()
    }
}
