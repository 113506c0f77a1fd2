//! Annotation and card generation pipeline

pub mod batch_annotator;
pub mod card_generator;
pub mod importer;
pub mod json_extract;
pub mod line_cards;
pub mod prompts;
pub mod spans;

pub use batch_annotator::{AnnotatedLine, BatchAnnotator};
pub use card_generator::{CardDraft, CardGenerationError, CardGenerator, LineContext};
pub use importer::{ImportOptions, ImportReport, ImportRequest, SongImporter};
pub use json_extract::extract_json;
pub use line_cards::{generate_line_cards, LineCardError};
