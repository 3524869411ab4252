//! Per-locale resource list and compiled entries.

use crate::compiler::{self, Entry, Env};
use crate::context::error::ContextError;
use crate::context::resource::{BuildDiagnostic, Resource};
use crate::loader::Loader;
use crate::parser::ast::Ast;

/// The resources and compiled entries of one language.
///
/// `code` is `None` for the sentinel locale used in single-language mode.
/// A locale is built at most once; lookups after that reuse the compiled
/// map.
pub struct Locale {
    pub code: Option<String>,
    resources: Vec<Resource>,
    env: Option<Env>,
    pub is_ready: bool,
}

impl Locale {
    pub(crate) fn new(code: Option<String>) -> Self {
        Locale {
            code,
            resources: Vec::new(),
            env: None,
            is_ready: false,
        }
    }

    pub(crate) fn add_text(&mut self, text: String) {
        self.resources.push(Resource::from_text(text));
    }

    /// Link a URI-addressed resource, deduplicating by URI.
    pub(crate) fn link_uri(&mut self, uri: String) {
        if !self.has_resource(&uri) {
            self.resources.push(Resource::from_uri(uri));
        }
    }

    pub fn has_resource(&self, uri: &str) -> bool {
        self.resources
            .iter()
            .any(|resource| resource.id.as_deref() == Some(uri))
    }

    pub(crate) fn build_sync(
        &mut self,
        loader: &dyn Loader,
        diagnostics: &mut Vec<BuildDiagnostic>,
    ) -> Result<(), ContextError> {
        if self.is_ready {
            return Ok(());
        }
        for resource in &mut self.resources {
            resource.build_sync(0, loader, diagnostics)?;
        }
        self.compile(diagnostics);
        Ok(())
    }

    pub(crate) async fn build_async(
        &mut self,
        loader: &dyn Loader,
        diagnostics: &mut Vec<BuildDiagnostic>,
    ) -> Result<(), ContextError> {
        if self.is_ready {
            return Ok(());
        }
        for resource in &mut self.resources {
            resource.build_async(0, loader, diagnostics).await?;
        }
        self.compile(diagnostics);
        Ok(())
    }

    /// Concatenate the flattened resource bodies in list order and compile
    /// the result.
    fn compile(&mut self, diagnostics: &mut Vec<BuildDiagnostic>) {
        let mut body = Vec::new();
        for resource in &mut self.resources {
            body.append(&mut resource.ast.body);
        }
        let ast = Ast { body };
        let (mut env, errors) = compiler::compile(&ast);
        diagnostics.extend(errors.into_iter().map(BuildDiagnostic::Compilation));
        env.add_builtin_plural(self.code.as_deref().unwrap_or("en"));
        self.env = Some(env);
        self.is_ready = true;
    }

    pub fn entry(&self, id: &str) -> Option<&Entry> {
        self.env.as_ref()?.get(id)
    }

    pub(crate) fn env(&self) -> Option<&Env> {
        self.env.as_ref()
    }
}
