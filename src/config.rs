//! Runtime options for the interpreter.
//!
//! Options start from their defaults, are overridden by environment
//! variables, and finally by command-line flags (applied by the binary with
//! the `with_*` builders).

/// Enables the execution trace when truthy.
pub const TRACE_ENV: &str = "LOXBC_TRACE";
/// Enables the post-compile bytecode dump when truthy.
pub const PRINT_CODE_ENV: &str = "LOXBC_PRINT_CODE";
/// Log level for the stderr logger (`error`, `warn`, `info`, `debug`, `trace`, `off`).
pub const LOG_ENV: &str = "LOXBC_LOG";

/// Debug switches for compilation and execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Options {
    /// Print the stack and each instruction before it executes.
    pub trace_execution: bool,
    /// Print the disassembled chunk after a successful compile.
    pub print_code: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `LOXBC_TRACE` and `LOXBC_PRINT_CODE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Options::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).is_some_and(|v| is_truthy(&v));
        Self {
            trace_execution: flag(TRACE_ENV),
            print_code: flag(PRINT_CODE_ENV),
        }
    }

    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace_execution = enabled;
        self
    }

    pub fn with_print_code(mut self, enabled: bool) -> Self {
        self.print_code = enabled;
        self
    }
}

/// `1`, `true`, `yes` and `on`, in any case.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn options_from(vars: &[(&str, &str)]) -> Options {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Options::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_are_off() {
        assert_eq!(options_from(&[]), Options::default());
        assert!(!Options::new().trace_execution);
        assert!(!Options::new().print_code);
    }

    #[test]
    fn test_env_overrides() {
        let options = options_from(&[(TRACE_ENV, "1"), (PRINT_CODE_ENV, "Yes")]);
        assert!(options.trace_execution);
        assert!(options.print_code);

        let options = options_from(&[(TRACE_ENV, "0"), (PRINT_CODE_ENV, "")]);
        assert_eq!(options, Options::default());
    }

    #[test]
    fn test_builders_override_env() {
        let options = options_from(&[(TRACE_ENV, "on")]).with_trace(false).with_print_code(true);
        assert!(!options.trace_execution);
        assert!(options.print_code);
    }

    #[test]
    fn test_truthy_values() {
        for value in ["1", "true", "TRUE", "yes", "On", " on "] {
            assert!(is_truthy(value), "{}", value);
        }
        for value in ["0", "false", "no", "off", "", "2"] {
            assert!(!is_truthy(value), "{}", value);
        }
    }
}
