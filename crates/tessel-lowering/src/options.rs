use std::collections::BTreeMap;

use tessel_schema::Version;

use crate::golden::GoldenTensor;

/// Identity of the build that produced this crate, taken from the `TESSEL_BUILD_IDENTITY` environment variable at
/// compile time.
pub const BUILD_IDENTITY: &str = match option_env!("TESSEL_BUILD_IDENTITY") {
    Some(identity) => identity,
    None => "unknown",
};

/// Options that control the contents of the binaries produced by [`lower_module`](crate::lower_module). The
/// [`Default`] implementation stamps binaries with the version of this crate and [`BUILD_IDENTITY`], and does not embed
/// any optional debug information.
#[derive(Clone, Debug, PartialEq)]
pub struct LoweringOptions {
    /// Version stamped in the header of produced binaries.
    pub version: Version,

    /// Identity of the build that produced the binary (e.g., a revision hash).
    pub build_identity: String,

    /// Source code generated from the same module by another backend, embedded for debugging.
    pub generated_source: Option<String>,

    /// Reference tensors embedded for result checking, keyed by name.
    pub golden_tensors: BTreeMap<String, GoldenTensor>,

    /// Textual snapshots of the module after each compiler pass, as `(pass name, module)` pairs in pass order.
    pub pass_snapshots: Vec<(String, String)>,
}

impl LoweringOptions {
    pub fn with_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.version = Version { major, minor, patch };
        self
    }

    pub fn with_build_identity<S: Into<String>>(mut self, build_identity: S) -> Self {
        self.build_identity = build_identity.into();
        self
    }

    pub fn with_generated_source<S: Into<String>>(mut self, source: S) -> Self {
        self.generated_source = Some(source.into());
        self
    }

    /// Adds a golden tensor, replacing any previously added tensor with the same name.
    pub fn with_golden_tensor(mut self, tensor: GoldenTensor) -> Self {
        self.golden_tensors.insert(tensor.name().to_string(), tensor);
        self
    }

    pub fn with_pass_snapshot<P: Into<String>, S: Into<String>>(mut self, pass: P, module: S) -> Self {
        self.pass_snapshots.push((pass.into(), module.into()));
        self
    }
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self {
            version: Version {
                major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or_default(),
                minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or_default(),
                patch: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or_default(),
            },
            build_identity: BUILD_IDENTITY.to_string(),
            generated_source: None,
            golden_tensors: BTreeMap::new(),
            pass_snapshots: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_options() {
        let options = LoweringOptions::default();
        assert_eq!(options.version, Version { major: 0, minor: 3, patch: 0 });
        assert_eq!(options.build_identity, BUILD_IDENTITY);
        assert!(options.golden_tensors.is_empty());
    }

    #[test]
    fn test_option_builders() {
        let golden = GoldenTensor::new("out", vec![1], &[1.0f32]).unwrap();
        let options = LoweringOptions::default()
            .with_version(1, 2, 3)
            .with_build_identity("deadbeef")
            .with_generated_source("int main() {}")
            .with_golden_tensor(golden.clone())
            .with_pass_snapshot("canonicalize", "module {}");
        assert_eq!(options.version, Version { major: 1, minor: 2, patch: 3 });
        assert_eq!(options.build_identity, "deadbeef");
        assert_eq!(options.generated_source.as_deref(), Some("int main() {}"));
        assert_eq!(options.golden_tensors.get("out"), Some(&golden));
        assert_eq!(options.pass_snapshots, vec![("canonicalize".to_string(), "module {}".to_string())]);
    }
}
