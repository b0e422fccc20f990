/// Data layer: filename parsing, grouping, queries and persistence.
///
/// Architecture:
/// ```text
///  "0001_2_UD.tif", "Map Data 3.tif", ...
///        │
///        ▼
///   ┌────────────┐
///   │  parser     │  stem → vocabulary scan + group digits → ParsedFilename
///   └────────────┘
///        │
///        ▼
///   ┌────────────┐
///   │  index      │  ImageIndex: groups[key].members / ungrouped, unmatched
///   └────────────┘
///        │                       │
///        ▼                       ▼
///   ┌────────────┐        ┌────────────┐
///   │  filter     │        │  record     │  IndexState ⇄ JSON (loader)
///   └────────────┘        └────────────┘
/// ```

pub mod filter;
pub mod index;
pub mod loader;
pub mod model;
pub mod parser;
pub mod record;
pub mod vocabulary;
