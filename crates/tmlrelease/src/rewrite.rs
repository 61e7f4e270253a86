use serde::Serialize;

use crate::document::{Content, ContentKind, TableReference, TableReferences, TmlDocument};
use crate::error::ReleaseError;
use crate::identity_map::GuidMap;
use crate::name_index::NameIndex;

/// What the destination environment will do with a rewritten document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum IdentityAction {
    /// A child already exists; the document now carries its identifier.
    Update { child: String },
    /// No child is known; the identifier was removed.
    Create,
}

/// Swaps identifiers and `tables` references from the source environment to a destination.
pub struct ReferenceRewriter<'a> {
    guids: &'a GuidMap,
    names: &'a NameIndex,
}

impl<'a> ReferenceRewriter<'a> {
    pub fn new(guids: &'a GuidMap, names: &'a NameIndex) -> Self {
        Self { guids, names }
    }

    /// Rewrites `document` in place.
    ///
    /// Every reference is resolved before anything changes, so an
    /// [`ReleaseError::UnresolvedReference`] leaves the document as it was.
    pub fn rewrite(&self, document: &mut TmlDocument) -> Result<IdentityAction, ReleaseError> {
        let label = document
            .identifier()
            .or(document.content_name())
            .unwrap_or("<unnamed>")
            .to_string();

        let referrer = document.kind();
        let mut missing = Vec::new();
        let plan = match document.content() {
            Content::Table(_) => ReferencePlan::None,
            Content::View(refs) | Content::Worksheet(refs) | Content::Answer(refs) => {
                ReferencePlan::Single(self.resolve_all(referrer, refs.tables()?, &mut missing))
            }
            Content::Liveboard(liveboard) => {
                let mut per_viz = Vec::new();
                for viz in liveboard.visualizations() {
                    per_viz.push(self.resolve_all(referrer, viz.tables()?, &mut missing));
                }
                ReferencePlan::PerVisualization(per_viz)
            }
        };
        if !missing.is_empty() {
            return Err(ReleaseError::UnresolvedReference {
                document: label,
                references: missing,
            });
        }

        let action = match document
            .identifier()
            .and_then(|parent| self.guids.get(parent))
        {
            Some(child) => {
                let child = child.clone();
                document.set_identifier(child.clone());
                IdentityAction::Update { child }
            }
            None => {
                document.remove_identifier();
                IdentityAction::Create
            }
        };
        tracing::debug!(document = %label, ?action, "resolved identity");

        match (plan, document.content_mut()) {
            (ReferencePlan::Single(references), Content::View(refs))
            | (ReferencePlan::Single(references), Content::Worksheet(refs))
            | (ReferencePlan::Single(references), Content::Answer(refs)) => {
                refs.set_tables(&references);
            }
            (ReferencePlan::PerVisualization(per_viz), Content::Liveboard(liveboard)) => {
                for (mut viz, references) in liveboard.visualizations_mut().into_iter().zip(per_viz)
                {
                    viz.set_tables(&references);
                }
            }
            _ => {}
        }

        Ok(action)
    }

    fn resolve_all(
        &self,
        referrer: ContentKind,
        references: Vec<TableReference>,
        missing: &mut Vec<String>,
    ) -> Vec<TableReference> {
        references
            .into_iter()
            .map(|reference| match self.resolve(referrer, &reference) {
                Some(resolved) => resolved,
                None => {
                    missing.push(describe(&reference));
                    reference
                }
            })
            .collect()
    }

    fn resolve(&self, referrer: ContentKind, reference: &TableReference) -> Option<TableReference> {
        match reference {
            TableReference::ByName { name, id } => {
                let parent = self.names.resolve(referrer, name)?;
                let child = self.guids.get(parent)?;
                Some(TableReference::ByIdentifier {
                    id: id.clone().unwrap_or_else(|| name.clone()),
                    fqn: child.clone(),
                })
            }
            TableReference::ByIdentifier { id, fqn } => {
                let child = self.guids.get(fqn)?;
                Some(TableReference::ByIdentifier {
                    id: id.clone(),
                    fqn: child.clone(),
                })
            }
        }
    }
}

enum ReferencePlan {
    None,
    Single(Vec<TableReference>),
    PerVisualization(Vec<Vec<TableReference>>),
}

fn describe(reference: &TableReference) -> String {
    match reference {
        TableReference::ByName { name, .. } => format!("'{name}'"),
        TableReference::ByIdentifier { id, fqn } => format!("'{id}' (fqn {fqn})"),
    }
}
