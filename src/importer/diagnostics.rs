//! Diagnostic collection for the import pipeline.
//!
//! Every extraction function receives a mutable [`Diagnostics`] collector.
//! Errors accumulate as a list instead of overwriting each other; the
//! error latch stays set once any error has been recorded, which is what
//! drives the fail-fast-at-parent behavior of the grammar walker.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One recorded problem, qualified by the XML path it occurred under.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.severity {
            Severity::Warning => write!(f, "warning: {}", self.message),
            Severity::Error => write!(f, "error: {}", self.message),
        }
    }
}

/// Child tags that carry free text and are never part of the grammar
/// dispatch, so their presence is not worth a warning.
const IGNORED_TAGS: &[&str] = &["comments", "description", "errorMessage", "name"];

/// Accumulates diagnostics during one import.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    has_error: bool,
}

/// Breadcrumb of ancestor tag names from the root down to the node's
/// parent, e.g. `<drugModel><covariates><covariate>`.
fn ancestor_path(node: roxmltree::Node) -> String {
    let mut path = String::new();
    for ancestor in node.ancestors().skip(1) {
        let name = ancestor.tag_name().name();
        if !name.is_empty() {
            path = format!("<{}>{}", name, path);
        }
    }
    path
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error against a specific node, describing its value.
    pub fn node_error(&mut self, node: roxmltree::Node) {
        let value = node.text().unwrap_or("").trim().to_string();
        let name = node.tag_name().name();
        let message = if value.is_empty() {
            format!("{}<{}> contains an empty value.", ancestor_path(node), name)
        } else {
            format!(
                "{}<{}> contains an invalid value : {}",
                ancestor_path(node),
                name,
                value
            )
        };
        self.error(message);
    }

    /// Records an error against a specific node with a custom message.
    pub fn node_error_with(&mut self, node: roxmltree::Node, message: &str) {
        let name = node.tag_name().name();
        self.error(format!(
            "{}<{}> {}",
            ancestor_path(node),
            name,
            message
        ));
    }

    /// Records an error not tied to a node.
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(%message, "import error");
        self.entries.push(Diagnostic {
            severity: Severity::Error,
            message,
        });
        self.has_error = true;
    }

    /// Records a soft warning for a child tag outside the grammar
    /// vocabulary. Tags in the ignored list are skipped silently.
    pub fn unexpected_tag(&mut self, tag_name: &str) {
        if IGNORED_TAGS.contains(&tag_name) {
            return;
        }
        tracing::warn!(tag = tag_name, "unexpected tag");
        self.entries.push(Diagnostic {
            severity: Severity::Warning,
            message: format!("Unexpected tag <{}>", tag_name),
        });
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }

    /// The most recently recorded error message, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|d| d.severity == Severity::Error)
            .map(|d| d.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_error_includes_ancestor_breadcrumb() {
        let xml = "<root><drugModel><covariates><covariate><covariateType>foo\
                   </covariateType></covariate></covariates></drugModel></root>";
        let doc = roxmltree::Document::parse(xml).unwrap();
        let node = doc
            .descendants()
            .find(|n| n.has_tag_name("covariateType"))
            .unwrap();

        let mut diags = Diagnostics::new();
        diags.node_error(node);

        assert!(diags.has_error());
        assert_eq!(
            diags.last_error().unwrap(),
            "<root><drugModel><covariates><covariate><covariateType> contains an invalid value : foo"
        );
    }

    #[test]
    fn empty_value_gets_dedicated_message() {
        let xml = "<root><value></value></root>";
        let doc = roxmltree::Document::parse(xml).unwrap();
        let node = doc.descendants().find(|n| n.has_tag_name("value")).unwrap();

        let mut diags = Diagnostics::new();
        diags.node_error(node);
        assert_eq!(
            diags.last_error().unwrap(),
            "<root><value> contains an empty value."
        );
    }

    #[test]
    fn ignored_tags_produce_no_warning() {
        let mut diags = Diagnostics::new();
        diags.unexpected_tag("comments");
        diags.unexpected_tag("description");
        assert!(diags.entries().is_empty());

        diags.unexpected_tag("bogus");
        assert_eq!(diags.entries().len(), 1);
        assert!(!diags.has_error());
    }

    #[test]
    fn warnings_never_set_the_error_latch() {
        let mut diags = Diagnostics::new();
        diags.unexpected_tag("whatever");
        assert!(!diags.has_error());
        diags.error("boom");
        assert!(diags.has_error());
    }
}
