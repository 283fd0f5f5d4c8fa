use serde::{Deserialize, Serialize};

use crate::model::{Arch, Syntax};

/// Options applied when a binary is loaded.
///
/// Every field has a default, so an empty JSON object (or YAML document) is a
/// valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntrospectConfig {
    /// Decode with this architecture instead of the one recorded in the file header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<Arch>,
    /// Assembly syntax for x86 listings.
    pub syntax: Syntax,
    /// Keep the leading `_` that Mach-O prefixes to C symbol names.
    pub keep_leading_underscore: bool,
}

impl IntrospectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_arch(mut self, arch: Arch) -> Self {
        self.arch = Some(arch);
        self
    }

    pub fn with_syntax(mut self, syntax: Syntax) -> Self {
        self.syntax = syntax;
        self
    }
}
