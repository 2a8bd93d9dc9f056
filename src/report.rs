//! User-facing diagnostics, prefixed with the program name.

use std::fmt::Display;
use std::path::Path;

/// Prints `<program>: <message>` lines, errors to stderr and warnings to stdout.
#[derive(Debug, Clone)]
pub struct Reporter {
    program: String,
}

impl Reporter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Name the reporter after the basename of the running executable.
    pub fn from_args() -> Self {
        let program = std::env::args_os()
            .next()
            .and_then(|arg0| {
                Path::new(&arg0)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
        Self::new(program)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn format(&self, message: impl Display) -> String {
        format!("{}: {}", self.program, message)
    }

    pub fn error(&self, message: impl Display) {
        eprintln!("{}", self.format(message));
    }

    pub fn warning(&self, message: impl Display) {
        println!("{}", self.format(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_prefixes_program() {
        let reporter = Reporter::new("sceneclip");
        assert_eq!(
            reporter.format("invalid trim window"),
            "sceneclip: invalid trim window"
        );
    }

    #[test]
    fn test_from_args_uses_a_basename() {
        let reporter = Reporter::from_args();
        assert!(!reporter.program().is_empty());
        assert!(!reporter.program().contains(std::path::MAIN_SEPARATOR));
    }
}
