//! Variable interpolation for build commands.
//!
//! Supports variables like:
//! - `${commit.id}` - Full commit id being built
//! - `${commit.short_id}` - Short (7 char) commit id
//! - `${source.url}` - Clone URL of the tracked repository
//! - `${artifact.name}` - Archive file the build task uploads
//! - `${build.output_dir}` - Directory archived into the artifact
//! - `${env.VAR_NAME}` - Variable from the build's environment map

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Variables available to build commands.
#[derive(Debug, Clone, Default)]
pub struct BuildVariables {
    pub commit_id: String,
    pub short_id: String,
    pub source_url: String,
    pub artifact_name: String,
    pub output_dir: String,
    pub env: HashMap<String, String>,
}

// Regex for matching ${...} variables
static VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)?)\}").unwrap()
});

impl BuildVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a variable name to its value.
    pub fn resolve(&self, var_name: &str) -> Option<String> {
        let parts: Vec<&str> = var_name.split('.').collect();

        match parts.as_slice() {
            ["commit", "id"] => Some(self.commit_id.clone()),
            ["commit", "short_id"] => Some(self.short_id.clone()),
            ["source", "url"] => Some(self.source_url.clone()),
            ["artifact", "name"] => Some(self.artifact_name.clone()),
            ["build", "output_dir"] => Some(self.output_dir.clone()),
            ["env", name] => self.env.get(*name).cloned(),
            _ => None,
        }
    }

    /// Interpolate all variables in a string.
    /// Unknown variables are left in place so the shell sees them verbatim.
    pub fn interpolate(&self, input: &str) -> String {
        VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                self.resolve(var_name)
                    .unwrap_or_else(|| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    pub fn interpolate_vec(&self, inputs: &[String]) -> Vec<String> {
        inputs.iter().map(|s| self.interpolate(s)).collect()
    }
}

/// Builder for creating BuildVariables.
pub struct BuildVariablesBuilder {
    vars: BuildVariables,
}

impl BuildVariablesBuilder {
    pub fn new() -> Self {
        Self {
            vars: BuildVariables::new(),
        }
    }

    pub fn with_commit(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.vars.short_id = id.chars().take(7).collect();
        self.vars.commit_id = id;
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.vars.source_url = url.into();
        self
    }

    pub fn with_artifact(mut self, name: impl Into<String>) -> Self {
        self.vars.artifact_name = name.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<String>) -> Self {
        self.vars.output_dir = dir.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.env.insert(key.into(), value.into());
        self
    }

    pub fn with_env_map(mut self, env: &HashMap<String, String>) -> Self {
        self.vars
            .env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn build(self) -> BuildVariables {
        self.vars
    }
}

impl Default for BuildVariablesBuilder {
    fn default() -> Self {
        Self::new()
    }
}
