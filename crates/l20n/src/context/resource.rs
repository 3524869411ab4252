//! A single source document and its recursively imported children.

use std::future::Future;
use std::mem;
use std::pin::Pin;

use crate::compiler::CompilationError;
use crate::context::error::ContextError;
use crate::loader::{IoError, Loader};
use crate::parser::ast::{Ast, Entry};
use crate::parser::{self, ParserError};

/// Import depth limit. Exceeding it is a fatal build error, not a silent
/// truncation.
pub(crate) const MAX_IMPORT_NESTING: u8 = 7;

/// A diagnostic collected during a build, emitted by the context afterwards.
#[derive(Debug)]
pub(crate) enum BuildDiagnostic {
    Parser(ParserError),
    Io(IoError),
    Compilation(CompilationError),
}

/// One addressable source document.
///
/// A resource fetches its text at most once, parses it leniently, builds a
/// child resource per `import` statement, and splices the children's
/// flattened bodies into its own AST at the import positions.
pub struct Resource {
    /// The URI this resource was linked from; `None` for inline text.
    pub id: Option<String>,
    source: Option<String>,
    pub ast: Ast,
    children: Vec<Resource>,
    import_positions: Vec<usize>,
    pub is_ready: bool,
}

impl Resource {
    pub fn from_text(text: impl Into<String>) -> Self {
        Resource {
            id: None,
            source: Some(text.into()),
            ast: Ast::default(),
            children: Vec::new(),
            import_positions: Vec::new(),
            is_ready: false,
        }
    }

    pub fn from_uri(uri: impl Into<String>) -> Self {
        Resource {
            id: Some(uri.into()),
            source: None,
            ast: Ast::default(),
            children: Vec::new(),
            import_positions: Vec::new(),
            is_ready: false,
        }
    }

    pub(crate) fn build_sync(
        &mut self,
        nesting: u8,
        loader: &dyn Loader,
        diagnostics: &mut Vec<BuildDiagnostic>,
    ) -> Result<(), ContextError> {
        if nesting >= MAX_IMPORT_NESTING {
            return Err(ContextError::TooManyNestedImports);
        }
        if self.is_ready {
            return Ok(());
        }
        if self.source.is_none() {
            let fetched = match &self.id {
                Some(uri) => loader.fetch_sync(uri),
                None => Ok(String::new()),
            };
            self.store_fetched(fetched, diagnostics);
        }
        self.parse(diagnostics);
        self.discover_imports();
        for child in &mut self.children {
            child.build_sync(nesting + 1, loader, diagnostics)?;
        }
        self.flatten();
        Ok(())
    }

    /// The async twin of [`Resource::build_sync`], with identical splicing
    /// semantics. Boxed for recursion through nested imports; children are
    /// awaited in declaration order.
    pub(crate) fn build_async<'a>(
        &'a mut self,
        nesting: u8,
        loader: &'a dyn Loader,
        diagnostics: &'a mut Vec<BuildDiagnostic>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ContextError>> + 'a>> {
        Box::pin(async move {
            if nesting >= MAX_IMPORT_NESTING {
                return Err(ContextError::TooManyNestedImports);
            }
            if self.is_ready {
                return Ok(());
            }
            if self.source.is_none() {
                let fetched = match &self.id {
                    Some(uri) => loader.fetch_async(uri).await,
                    None => Ok(String::new()),
                };
                self.store_fetched(fetched, diagnostics);
            }
            self.parse(diagnostics);
            self.discover_imports();
            for child in &mut self.children {
                child.build_async(nesting + 1, loader, diagnostics).await?;
            }
            self.flatten();
            Ok(())
        })
    }

    /// A fetch failure degrades to empty source; the entry simply parses to
    /// nothing. The failure is still reported.
    fn store_fetched(
        &mut self,
        fetched: Result<String, IoError>,
        diagnostics: &mut Vec<BuildDiagnostic>,
    ) {
        match fetched {
            Ok(text) => self.source = Some(text),
            Err(err) => {
                diagnostics.push(BuildDiagnostic::Io(err));
                self.source = Some(String::new());
            }
        }
    }

    fn parse(&mut self, diagnostics: &mut Vec<BuildDiagnostic>) {
        let source = self.source.as_deref().unwrap_or("");
        let (ast, errors) = parser::parse(source);
        self.ast = ast;
        diagnostics.extend(errors.into_iter().map(BuildDiagnostic::Parser));
    }

    fn discover_imports(&mut self) {
        let mut positions = Vec::new();
        let mut children = Vec::new();
        for (pos, entry) in self.ast.body.iter().enumerate() {
            if let Entry::Import(uri) = entry {
                positions.push(pos);
                children.push(Resource::from_uri(relative_to(self.id.as_deref(), uri)));
            }
        }
        self.import_positions = positions;
        self.children = children;
    }

    /// Splice each child's flattened body over its originating import
    /// statement. Splicing in reverse declaration order keeps the earlier
    /// recorded positions valid.
    fn flatten(&mut self) {
        for i in (0..self.children.len()).rev() {
            let pos = self.import_positions.get(i).copied().unwrap_or(0);
            let body = mem::take(&mut self.children[i].ast.body);
            self.ast.body.splice(pos..pos + 1, body);
        }
        self.is_ready = true;
    }
}

/// Resolve an import URI relative to the importing resource.
///
/// Absolute URIs (leading `/`) and imports from inline text pass through
/// unchanged.
fn relative_to(base: Option<&str>, url: &str) -> String {
    let Some(base) = base else {
        return url.to_string();
    };
    if url.starts_with('/') {
        return url.to_string();
    }
    let dirname = match base.rfind('/') {
        Some(slash) => &base[..slash],
        None => "",
    };
    if dirname.is_empty() {
        format!("./{url}")
    } else {
        format!("{}/{url}", dirname.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_uris_resolve_against_the_importer() {
        assert_eq!(relative_to(Some("locales/en/app.lol"), "shared.lol"), "locales/en/shared.lol");
        assert_eq!(relative_to(Some("app.lol"), "shared.lol"), "./shared.lol");
        assert_eq!(relative_to(Some("locales/app.lol"), "/abs.lol"), "/abs.lol");
        assert_eq!(relative_to(None, "shared.lol"), "shared.lol");
    }
}
