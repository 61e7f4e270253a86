use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Sequence, Value};

use crate::error::ReleaseError;

/// The content families a TML document can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Table,
    View,
    Worksheet,
    Answer,
    Liveboard,
}

impl ContentKind {
    /// Every kind in the order objects must be published.
    pub const PUBLISH_ORDER: [ContentKind; 5] = [
        ContentKind::Table,
        ContentKind::View,
        ContentKind::Worksheet,
        ContentKind::Answer,
        ContentKind::Liveboard,
    ];

    /// Plain name used for directories, filenames and the top-level content key.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Table => "table",
            ContentKind::View => "view",
            ContentKind::Worksheet => "worksheet",
            ContentKind::Answer => "answer",
            ContentKind::Liveboard => "liveboard",
        }
    }

    /// Kinds a `tables` entry of this kind may name, in lookup order.
    pub fn referenced_kinds(self) -> &'static [ContentKind] {
        match self {
            ContentKind::Table => &[],
            ContentKind::View | ContentKind::Worksheet => &[ContentKind::Table, ContentKind::View],
            ContentKind::Answer | ContentKind::Liveboard => &[
                ContentKind::Worksheet,
                ContentKind::View,
                ContentKind::Table,
            ],
        }
    }

    /// Maps a top-level document key to its kind. `pinboard` is the older
    /// spelling of `liveboard`.
    pub fn from_content_key(key: &str) -> Option<Self> {
        match key {
            "table" => Some(ContentKind::Table),
            "view" => Some(ContentKind::View),
            "worksheet" => Some(ContentKind::Worksheet),
            "answer" => Some(ContentKind::Answer),
            "liveboard" | "pinboard" => Some(ContentKind::Liveboard),
            _ => None,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        ContentKind::from_content_key(&normalized).ok_or_else(|| {
            format!(
                "unknown object type '{value}' (expected one of: liveboard, answer, table, worksheet, view)"
            )
        })
    }
}

/// Which top-level key carried the document identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdentifierField {
    #[default]
    Guid,
    Id,
}

impl IdentifierField {
    pub fn key(self) -> &'static str {
        match self {
            IdentifierField::Guid => "guid",
            IdentifierField::Id => "id",
        }
    }
}

/// A reference from one document to another object in its `tables` list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableReference {
    /// Unresolved: `{name}`, with the alias `id` when the entry carries one.
    ByName { name: String, id: Option<String> },
    /// Resolved: `{id, fqn}` where `fqn` is the target identifier.
    ByIdentifier { id: String, fqn: String },
}

impl TableReference {
    fn from_value(value: &Value) -> Result<Self, ReleaseError> {
        let Value::Mapping(entry) = value else {
            return Err(ReleaseError::format("tables entry must be a mapping"));
        };
        let name = scalar_string(entry.get("name"));
        let id = scalar_string(entry.get("id"));
        let fqn = scalar_string(entry.get("fqn"));

        match (fqn, id, name) {
            (Some(fqn), Some(id), _) => Ok(TableReference::ByIdentifier { id, fqn }),
            (Some(fqn), None, Some(name)) => Ok(TableReference::ByIdentifier { id: name, fqn }),
            (Some(fqn), None, None) => Err(ReleaseError::format(format!(
                "tables entry with fqn '{fqn}' has neither id nor name"
            ))),
            (None, id, Some(name)) => Ok(TableReference::ByName { name, id }),
            (None, _, None) => Err(ReleaseError::format(
                "tables entry must carry either name or fqn",
            )),
        }
    }

    /// Rebuilds an entry with the reference keys first, keeping any other keys after them.
    fn write_into(&self, entry: &Mapping) -> Mapping {
        let mut out = Mapping::new();
        match self {
            TableReference::ByName { name, id } => {
                if let Some(id) = id {
                    out.insert("id".into(), id.as_str().into());
                }
                out.insert("name".into(), name.as_str().into());
            }
            TableReference::ByIdentifier { id, fqn } => {
                out.insert("id".into(), id.as_str().into());
                out.insert("fqn".into(), fqn.as_str().into());
            }
        }
        for (key, value) in entry {
            if matches!(key.as_str(), Some("name" | "id" | "fqn")) {
                continue;
            }
            out.insert(key.clone(), value.clone());
        }
        out
    }
}

/// Access to a `tables` reference list inside some payload mapping.
pub trait TableReferences {
    fn reference_payload(&self) -> Option<&Mapping>;
    fn reference_payload_mut(&mut self) -> Option<&mut Mapping>;

    fn tables(&self) -> Result<Vec<TableReference>, ReleaseError> {
        match self.reference_payload() {
            Some(payload) => read_tables(payload),
            None => Ok(Vec::new()),
        }
    }

    /// Commits references back into the payload, entry by entry.
    fn set_tables(&mut self, references: &[TableReference]) {
        if let Some(payload) = self.reference_payload_mut() {
            write_tables(payload, references);
        }
    }
}

fn read_tables(payload: &Mapping) -> Result<Vec<TableReference>, ReleaseError> {
    match payload.get("tables") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(entries)) => entries.iter().map(TableReference::from_value).collect(),
        Some(_) => Err(ReleaseError::format("tables must be a sequence")),
    }
}

fn write_tables(payload: &mut Mapping, references: &[TableReference]) {
    let existing: Sequence = match payload.get("tables") {
        Some(Value::Sequence(entries)) => entries.clone(),
        _ => Sequence::new(),
    };
    if existing.is_empty() && references.is_empty() {
        return;
    }

    let empty = Mapping::new();
    let entries = references
        .iter()
        .enumerate()
        .map(|(idx, reference)| {
            let base = existing
                .get(idx)
                .and_then(Value::as_mapping)
                .unwrap_or(&empty);
            Value::Mapping(reference.write_into(base))
        })
        .collect();
    payload.insert("tables".into(), Value::Sequence(entries));
}

/// Payload of a Table document.
#[derive(Clone, Debug, PartialEq)]
pub struct TableContent {
    payload: Mapping,
}

impl TableContent {
    pub fn new(payload: Mapping) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &Mapping {
        &self.payload
    }

    pub fn connection_name(&self) -> Option<&str> {
        self.payload.get("connection")?.get("name")?.as_str()
    }

    pub fn set_connection_name(&mut self, name: impl Into<String>) {
        self.set_connection_field("name", name.into());
    }

    pub fn connection_type(&self) -> Option<&str> {
        self.payload.get("connection")?.get("type")?.as_str()
    }

    pub fn set_connection_type(&mut self, kind: impl Into<String>) {
        self.set_connection_field("type", kind.into());
    }

    pub fn db_name(&self) -> Option<&str> {
        self.payload.get("db")?.as_str()
    }

    pub fn set_db_name(&mut self, db: impl Into<String>) {
        self.payload.insert("db".into(), Value::String(db.into()));
    }

    pub fn schema(&self) -> Option<&str> {
        self.payload.get("schema")?.as_str()
    }

    pub fn set_schema(&mut self, schema: impl Into<String>) {
        self.payload
            .insert("schema".into(), Value::String(schema.into()));
    }

    pub fn db_table(&self) -> Option<&str> {
        self.payload.get("db_table")?.as_str()
    }

    pub fn set_db_table(&mut self, table: impl Into<String>) {
        self.payload
            .insert("db_table".into(), Value::String(table.into()));
    }

    pub fn columns(&self) -> Option<&Sequence> {
        self.payload.get("columns")?.as_sequence()
    }

    pub fn joins_with(&self) -> Option<&Sequence> {
        self.payload.get("joins_with")?.as_sequence()
    }

    fn set_connection_field(&mut self, field: &str, value: String) {
        let slot = self
            .payload
            .entry("connection".into())
            .or_insert(Value::Null);
        if !slot.is_mapping() {
            *slot = Value::Mapping(Mapping::new());
        }
        if let Value::Mapping(connection) = slot {
            connection.insert(field.into(), Value::String(value));
        }
    }
}

/// Payload of Worksheet, View and Answer documents: anything with a `tables` list.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceContent {
    payload: Mapping,
}

impl ReferenceContent {
    pub fn new(payload: Mapping) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &Mapping {
        &self.payload
    }
}

impl TableReferences for ReferenceContent {
    fn reference_payload(&self) -> Option<&Mapping> {
        Some(&self.payload)
    }

    fn reference_payload_mut(&mut self) -> Option<&mut Mapping> {
        Some(&mut self.payload)
    }
}

/// Payload of a Liveboard (or legacy Pinboard) document.
#[derive(Clone, Debug, PartialEq)]
pub struct LiveboardContent {
    payload: Mapping,
}

impl LiveboardContent {
    pub fn new(payload: Mapping) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &Mapping {
        &self.payload
    }

    pub fn visualizations(&self) -> Vec<Visualization<'_>> {
        match self.payload.get("visualizations") {
            Some(Value::Sequence(entries)) => entries
                .iter()
                .filter_map(Value::as_mapping)
                .map(|entry| Visualization { entry })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn visualizations_mut(&mut self) -> Vec<VisualizationMut<'_>> {
        match self.payload.get_mut("visualizations") {
            Some(Value::Sequence(entries)) => entries
                .iter_mut()
                .filter_map(Value::as_mapping_mut)
                .map(|entry| VisualizationMut { entry })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn validate(&self) -> Result<(), ReleaseError> {
        match self.payload.get("visualizations") {
            None | Some(Value::Null) => Ok(()),
            Some(Value::Sequence(entries)) => {
                if entries.iter().any(|entry| !entry.is_mapping()) {
                    return Err(ReleaseError::format(
                        "visualizations entries must be mappings",
                    ));
                }
                for viz in self.visualizations() {
                    viz.tables()?;
                }
                Ok(())
            }
            Some(_) => Err(ReleaseError::format("visualizations must be a sequence")),
        }
    }
}

/// Read-only view over one embedded visualization.
pub struct Visualization<'a> {
    entry: &'a Mapping,
}

impl Visualization<'_> {
    /// Visualizations use `id` rather than `guid`; either is accepted.
    pub fn id(&self) -> Option<&str> {
        self.entry
            .get("id")
            .or_else(|| self.entry.get("guid"))?
            .as_str()
    }

    pub fn answer_name(&self) -> Option<&str> {
        self.entry.get("answer")?.get("name")?.as_str()
    }
}

impl TableReferences for Visualization<'_> {
    fn reference_payload(&self) -> Option<&Mapping> {
        self.entry.get("answer")?.as_mapping()
    }

    fn reference_payload_mut(&mut self) -> Option<&mut Mapping> {
        None
    }
}

/// Mutable view over one embedded visualization.
pub struct VisualizationMut<'a> {
    entry: &'a mut Mapping,
}

impl VisualizationMut<'_> {
    pub fn id(&self) -> Option<&str> {
        self.entry
            .get("id")
            .or_else(|| self.entry.get("guid"))?
            .as_str()
    }
}

impl TableReferences for VisualizationMut<'_> {
    fn reference_payload(&self) -> Option<&Mapping> {
        self.entry.get("answer")?.as_mapping()
    }

    fn reference_payload_mut(&mut self) -> Option<&mut Mapping> {
        self.entry.get_mut("answer")?.as_mapping_mut()
    }
}

/// Kind-specific payload of a document.
#[derive(Clone, Debug, PartialEq)]
pub enum Content {
    Table(TableContent),
    View(ReferenceContent),
    Worksheet(ReferenceContent),
    Answer(ReferenceContent),
    Liveboard(LiveboardContent),
}

impl Content {
    fn from_payload(kind: ContentKind, payload: Mapping) -> Result<Self, ReleaseError> {
        let content = match kind {
            ContentKind::Table => Content::Table(TableContent::new(payload)),
            ContentKind::View => Content::View(ReferenceContent::new(payload)),
            ContentKind::Worksheet => Content::Worksheet(ReferenceContent::new(payload)),
            ContentKind::Answer => Content::Answer(ReferenceContent::new(payload)),
            ContentKind::Liveboard => Content::Liveboard(LiveboardContent::new(payload)),
        };
        match &content {
            Content::Table(_) => {}
            Content::View(refs) | Content::Worksheet(refs) | Content::Answer(refs) => {
                refs.tables()?;
            }
            Content::Liveboard(liveboard) => liveboard.validate()?,
        }
        Ok(content)
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            Content::Table(_) => ContentKind::Table,
            Content::View(_) => ContentKind::View,
            Content::Worksheet(_) => ContentKind::Worksheet,
            Content::Answer(_) => ContentKind::Answer,
            Content::Liveboard(_) => ContentKind::Liveboard,
        }
    }

    pub fn payload(&self) -> &Mapping {
        match self {
            Content::Table(table) => &table.payload,
            Content::View(refs) | Content::Worksheet(refs) | Content::Answer(refs) => &refs.payload,
            Content::Liveboard(liveboard) => &liveboard.payload,
        }
    }

    fn payload_mut(&mut self) -> &mut Mapping {
        match self {
            Content::Table(table) => &mut table.payload,
            Content::View(refs) | Content::Worksheet(refs) | Content::Answer(refs) => {
                &mut refs.payload
            }
            Content::Liveboard(liveboard) => &mut liveboard.payload,
        }
    }
}

/// One exported content object: an optional identifier plus exactly one payload.
#[derive(Clone, Debug, PartialEq)]
pub struct TmlDocument {
    identifier: Option<String>,
    identifier_field: IdentifierField,
    content_key: String,
    content: Content,
}

impl TmlDocument {
    /// Parses a published document; the identifier is required.
    pub fn parse(raw: &str) -> Result<Self, ReleaseError> {
        Self::parse_inner(raw, true)
    }

    /// Parses a document that may have had its identifier stripped.
    pub fn parse_draft(raw: &str) -> Result<Self, ReleaseError> {
        Self::parse_inner(raw, false)
    }

    fn parse_inner(raw: &str, require_identifier: bool) -> Result<Self, ReleaseError> {
        let root: Value = serde_yaml::from_str(raw)
            .map_err(|err| ReleaseError::format(format!("invalid YAML: {err}")))?;
        let Value::Mapping(root) = root else {
            return Err(ReleaseError::format("document root must be a mapping"));
        };

        let mut identifier: Option<(IdentifierField, String)> = None;
        let mut content: Option<(String, Content)> = None;

        for (key, value) in root {
            let Some(key) = key.as_str() else {
                return Err(ReleaseError::format("top-level keys must be strings"));
            };
            let field = match key {
                "guid" => Some(IdentifierField::Guid),
                "id" => Some(IdentifierField::Id),
                _ => None,
            };
            if let Some(field) = field {
                if identifier.is_some() {
                    return Err(ReleaseError::format(
                        "document carries both guid and id identifiers",
                    ));
                }
                let value = scalar_string(Some(&value)).ok_or_else(|| {
                    ReleaseError::format(format!("{key} must be a scalar identifier"))
                })?;
                identifier = Some((field, value));
                continue;
            }

            let Some(kind) = ContentKind::from_content_key(key) else {
                return Err(ReleaseError::format(format!(
                    "unrecognized top-level key '{key}'"
                )));
            };
            if let Some((existing, _)) = &content {
                return Err(ReleaseError::format(format!(
                    "document has more than one content key ('{existing}' and '{key}')"
                )));
            }
            let Value::Mapping(payload) = value else {
                return Err(ReleaseError::format(format!("{key} content must be a mapping")));
            };
            content = Some((key.to_string(), Content::from_payload(kind, payload)?));
        }

        let Some((content_key, content)) = content else {
            return Err(ReleaseError::format("no recognizable content key found"));
        };
        if require_identifier && identifier.is_none() {
            return Err(ReleaseError::format("document has no guid"));
        }
        let (identifier_field, identifier) = match identifier {
            Some((field, value)) => (field, Some(value)),
            None => (IdentifierField::default(), None),
        };

        Ok(Self {
            identifier,
            identifier_field,
            content_key,
            content,
        })
    }

    pub fn kind(&self) -> ContentKind {
        self.content.kind()
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn set_identifier(&mut self, identifier: impl Into<String>) {
        self.identifier = Some(identifier.into());
    }

    /// Drops the identifier so the next import creates a new object.
    pub fn remove_identifier(&mut self) {
        self.identifier = None;
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut Content {
        &mut self.content
    }

    pub fn content_name(&self) -> Option<&str> {
        self.content.payload().get("name")?.as_str()
    }

    pub fn set_content_name(&mut self, name: impl Into<String>) {
        self.content
            .payload_mut()
            .insert("name".into(), Value::String(name.into()));
    }

    pub fn as_table(&self) -> Option<&TableContent> {
        match &self.content {
            Content::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut TableContent> {
        match &mut self.content {
            Content::Table(table) => Some(table),
            _ => None,
        }
    }

    /// Serializes back to the wire format: identifier first, then the content key.
    pub fn to_yaml_string(&self) -> Result<String, ReleaseError> {
        let mut root = Mapping::new();
        if let Some(identifier) = &self.identifier {
            root.insert(
                self.identifier_field.key().into(),
                Value::String(identifier.clone()),
            );
        }
        root.insert(
            Value::String(self.content_key.clone()),
            Value::Mapping(self.content.payload().clone()),
        );
        Ok(serde_yaml::to_string(&Value::Mapping(root))?)
    }
}

fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
