// src/checker/mod.rs
// =============================================================================
// Everything a fetch worker does with a page body once it has one.
//
// Submodules:
// - extract: candidate link extraction and relative-link resolution
// - content: required-content pattern validation
// =============================================================================

mod content;
mod extract;

pub use content::check_required_content;
pub use extract::{extractor_for, resolve_href, ExtractorKind, LinkExtractor};

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why is LinkExtractor a trait?
//    - The worker only needs "give me hrefs from these bytes"
//    - Swapping the regex for a real HTML parser touches nothing else
//
// 2. What is Arc<dyn LinkExtractor>?
//    - A shared pointer to "some type implementing LinkExtractor"
//    - Every worker task holds a clone; the extractor itself is never copied
// -----------------------------------------------------------------------------
