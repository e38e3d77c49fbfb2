//! Compiled rendering template.

use std::path::{Path, PathBuf};

use minijinja::{Environment, UndefinedBehavior, Value};

use crate::model::CATCH_ALL_PATH;
use crate::template::context::TemplateContext;
use crate::template::error::CompileError;

/// A parsed template, ready to render.
///
/// Never mutated after construction; hot reload builds a new one and swaps it in.
#[derive(Debug)]
pub struct CompiledTemplate {
    env: Environment<'static>,
    name: String,
    source_path: Option<PathBuf>,
}

impl CompiledTemplate {
    /// Read and parse the template at `path`.
    pub fn compile(path: &Path) -> Result<Self, CompileError> {
        let source = std::fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "template".to_string());

        let mut compiled = Self::build(name, source, |_| {}).map_err(|source| CompileError::Syntax {
            path: path.display().to_string(),
            source,
        })?;
        compiled.source_path = Some(path.to_path_buf());
        Ok(compiled)
    }

    /// Parse a template held in memory.
    pub fn from_source(name: &str, source: &str) -> Result<Self, CompileError> {
        Self::build(name.to_string(), source.to_string(), |_| {}).map_err(|source| CompileError::Syntax {
            path: name.to_string(),
            source,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_source_with<F>(name: &str, source: &str, configure: F) -> Self
    where
        F: FnOnce(&mut Environment<'static>),
    {
        Self::build(name.to_string(), source.to_string(), configure).unwrap()
    }

    fn build<F>(name: String, source: String, configure: F) -> Result<Self, minijinja::Error>
    where
        F: FnOnce(&mut Environment<'static>),
    {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        env.add_function("empty", empty);
        env.add_function("build_location", build_location);
        env.add_function("redirect_target", redirect_target);
        configure(&mut env);

        env.add_template_owned(name.clone(), source)?;

        Ok(Self {
            env,
            name,
            source_path: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File the template was compiled from, if any.
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Render `ctx` into `out`. On error `out` holds whatever was produced so far.
    pub fn render_into(&self, ctx: &TemplateContext<'_>, out: &mut Vec<u8>) -> Result<(), minijinja::Error> {
        let template = self.env.get_template(&self.name)?;
        template.render_captured_to(ctx, &mut *out)?;
        Ok(())
    }
}

/// True unless `input` is a non-empty string.
fn empty(input: Value) -> bool {
    match input.as_str() {
        Some(s) => s.is_empty(),
        None => true,
    }
}

/// The path directive of a location; `/` for anything that is not a location.
fn build_location(input: Value) -> String {
    let path = input
        .get_attr("path")
        .ok()
        .and_then(|p| p.as_str().map(str::to_string));

    match path {
        Some(path) if !path.is_empty() => path,
        _ => CATCH_ALL_PATH.to_string(),
    }
}

/// The redirect target of a location, or none when the target is empty or
/// equal to the location's own path.
fn redirect_target(input: Value) -> Value {
    let path = input.get_attr("path").ok();
    let target = input
        .get_attr("redirect")
        .ok()
        .and_then(|r| r.get_attr("target").ok());

    let path = path.as_ref().and_then(|p| p.as_str());
    match target.as_ref().and_then(|t| t.as_str()) {
        Some(target) if !target.is_empty() && Some(target) != path => Value::from(target),
        _ => Value::from(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Location;

    #[test]
    fn empty_only_false_for_non_empty_strings() {
        assert!(empty(Value::from("")));
        assert!(!empty(Value::from("x")));
        assert!(empty(Value::from(3)));
        assert!(empty(Value::from(())));
    }

    #[test]
    fn build_location_uses_path() {
        let loc = Value::from_serialize(Location::new("/api", "b1"));
        assert_eq!(build_location(loc), "/api");

        let redirected = Value::from_serialize(Location::new("/", "b1").with_redirect("/login"));
        assert_eq!(build_location(redirected), "/");

        assert_eq!(build_location(Value::from("not a location")), "/");
    }

    #[test]
    fn redirect_target_follows_redirect_rule() {
        let real = Value::from_serialize(Location::new("/", "b1").with_redirect("/login"));
        assert_eq!(redirect_target(real).as_str(), Some("/login"));

        let same = Value::from_serialize(Location::new("/app", "b1").with_redirect("/app"));
        assert!(redirect_target(same).is_none());

        let none = Value::from_serialize(Location::new("/app", "b1"));
        assert!(redirect_target(none).is_none());
    }

    #[test]
    fn syntax_error_is_compile_error() {
        let err = CompiledTemplate::from_source("broken", "{% for x in %}").unwrap_err();
        assert!(matches!(err, CompileError::Syntax { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = CompiledTemplate::compile(Path::new("/nonexistent/Caddyfile.tmpl")).unwrap_err();
        assert!(matches!(err, CompileError::Io { .. }));
    }

    #[test]
    fn compile_remembers_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Caddyfile.tmpl");
        std::fs::write(&path, "{{ healthz_port }}").unwrap();

        let compiled = CompiledTemplate::compile(&path).unwrap();
        assert_eq!(compiled.name(), "Caddyfile.tmpl");
        assert_eq!(compiled.source_path(), Some(path.as_path()));
    }
}
