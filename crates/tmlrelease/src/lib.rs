pub mod config;
pub mod document;
pub mod error;
pub mod identity_map;
pub mod name_index;
pub mod publish;
pub mod release;
pub mod rewrite;
pub mod table_properties;
pub mod workspace;

pub use config::{DEFAULT_CONFIG_FILE, PrefixChanges, ReleaseConfig, RunConfig};
pub use document::{
    Content, ContentKind, IdentifierField, LiveboardContent, ReferenceContent, TableContent,
    TableReference, TableReferences, TmlDocument, Visualization, VisualizationMut,
};
pub use error::{PUBLISH_ORDER, ReleaseError};
pub use identity_map::{GuidMap, IdentityMap};
pub use name_index::NameIndex;
pub use publish::{
    DUPLICATE_TABLE_ERROR, ImportOutcome, PublishReport, PublishedDocument, RejectedDocument,
    TmlPublisher, outcomes_from_import_response, publish_release,
};
pub use release::{
    BuildReport, PrefixRule, ReleaseRequest, SkippedDocument, WrittenDocument, build_release,
};
pub use rewrite::{IdentityAction, ReferenceRewriter};
pub use table_properties::{MAX_DEPTH, TableAttribute, TablePropertyMap};
pub use workspace::{
    ReleasePaths, TML_MARKER, connection_dir_name, is_tml_file_name, list_tml_files,
    parent_identifier_from_filename, tml_file_name,
};
