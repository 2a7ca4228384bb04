// src/suite/descriptor.rs

use std::fmt;

/// Identifies one execution environment.
///
/// Two units with equal descriptors share a single worker process, so the
/// descriptor is the grouping key for a run. All three fields take part in
/// equality: the same command started with and without debugging is two
/// different environments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnvironmentDescriptor {
    kind: String,
    command: String,
    debug: bool,
}

impl EnvironmentDescriptor {
    pub fn new(kind: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            command: command.into(),
            debug: false,
        }
    }

    /// Copy of this descriptor with the debug flag set to `debug`.
    pub fn with_debug(&self, debug: bool) -> Self {
        Self {
            debug,
            ..self.clone()
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Name under which the environment is logged and reported.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EnvironmentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.command)?;
        if self.debug {
            write!(f, " (debug)")?;
        }
        Ok(())
    }
}
