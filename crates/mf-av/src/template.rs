//! Variable substitution for profile option templates.
//!
//! A profile's `command` is a whitespace-separated list of ffmpeg output
//! options with `{name}` placeholders, e.g. `-c:v libx264 -r {frame_rate}`.
//! Templates are split into arguments *before* substitution, so a value
//! containing spaces (a path, a title) stays one argument.

use std::collections::BTreeMap;
use std::path::Path;

use mf_core::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    vars: BTreeMap<String, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `{input}`, `{output}`, `{workspace}`, `{filename}`, `{filestem}`
    /// and `{extension}`.
    pub fn with_paths(mut self, input: &Path, output: &Path, workspace: &Path) -> Self {
        self.set("input", input.display());
        self.set("output", output.display());
        self.set("workspace", workspace.display());
        if let Some(name) = input.file_name() {
            self.set("filename", name.to_string_lossy());
        }
        if let Some(stem) = input.file_stem() {
            self.set("filestem", stem.to_string_lossy());
        }
        if let Some(ext) = input.extension() {
            self.set("extension", ext.to_string_lossy());
        }
        self
    }

    pub fn with_var(mut self, key: &str, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    pub fn with_vars<'a>(
        mut self,
        vars: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Self {
        for (k, v) in vars {
            self.set(k, v);
        }
        self
    }

    pub fn set(&mut self, key: &str, value: impl ToString) {
        self.vars.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Substitute `{var}` placeholders in one string, left to right. Values
    /// are inserted verbatim and never re-scanned.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an unknown variable or an unclosed brace.
    pub fn substitute(&self, template: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| Error::Config(format!("unclosed '{{' in template '{template}'")))?;
            let name = &after[..close];
            let value = self
                .vars
                .get(name)
                .ok_or_else(|| Error::Config(format!("unknown template variable '{{{name}}}'")))?;
            out.push_str(value);
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Split a template on whitespace and substitute each argument.
    pub fn substitute_args(&self, template: &str) -> Result<Vec<String>> {
        template
            .split_whitespace()
            .map(|arg| self.substitute(arg))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_variables() {
        let ctx = TemplateContext::new().with_paths(
            Path::new("/media/in/movie.mkv"),
            Path::new("/tmp/ws/movie-work.mp4"),
            Path::new("/tmp/ws"),
        );
        assert_eq!(ctx.substitute("{filestem}.mp4").unwrap(), "movie.mp4");
        assert_eq!(ctx.substitute("{workspace}/x.hevc").unwrap(), "/tmp/ws/x.hevc");
        assert_eq!(ctx.get("extension"), Some("mkv"));
    }

    #[test]
    fn args_keep_spaced_values_whole() {
        let ctx = TemplateContext::new().with_var("title", "My Movie");
        let args = ctx
            .substitute_args("-c:v  libx264 -metadata title={title}")
            .unwrap();
        assert_eq!(args, ["-c:v", "libx264", "-metadata", "title=My Movie"]);
    }

    #[test]
    fn values_are_not_rescanned() {
        let ctx = TemplateContext::new()
            .with_var("a", "{b}")
            .with_var("b", "nope");
        assert_eq!(ctx.substitute("x{a}y").unwrap(), "x{b}y");
    }

    #[test]
    fn unknown_variable_is_error() {
        let ctx = TemplateContext::new();
        assert!(matches!(ctx.substitute("-r {frame_rate}"), Err(Error::Config(_))));
        assert!(matches!(ctx.substitute("broken {"), Err(Error::Config(_))));
    }

    #[test]
    fn profile_params_merge() {
        let mut params = BTreeMap::new();
        params.insert("crf".to_string(), "23".to_string());
        let ctx = TemplateContext::new().with_vars(&params);
        assert_eq!(ctx.substitute_args("-crf {crf}").unwrap(), ["-crf", "23"]);
    }
}
