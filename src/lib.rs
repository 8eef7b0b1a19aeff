//! # mdxclude
//!
//! A library and CLI tool for resolving markdown transclusion references:
//! `![[file]]` markers that pull another document (or a heading-scoped slice
//! of it) into place, recursively, with cycle detection, a depth cap, and a
//! path security boundary. Failed references degrade to inline error
//! comments instead of aborting the document.
//!
//! ## Features
//!
//! - Expand `![[file]]`, `![[file#Heading]]` and `![[file#Start:End]]` markers
//! - Recursive expansion with per-branch cycle detection and a depth limit
//! - Security: rejects absolute/UNC paths and resolution outside the base dir
//! - `{{variable}}` substitution in reference paths
//! - Streaming mode with bounded memory and front-matter stripping
//! - Pluggable file cache capability
//!
//! ## Usage
//!
//! ### As a Library
//!
//! ```no_run
//! use mdxclude::{transclude, TranscludeOptions};
//!
//! let doc = "# Guide\n\n![[sections/intro]]\n\n![[api#Usage]]";
//! let options = TranscludeOptions::default();
//!
//! let output = transclude(doc, &options);
//! println!("{}", output.content);
//! for error in &output.errors {
//!     eprintln!("{:?}: {}", error.code, error.message);
//! }
//! ```
//!
//! ### As a CLI Tool
//!
//! ```bash
//! # Expand a document
//! mdxclude book.md
//!
//! # Process from stdin, streaming
//! cat book.md | mdxclude -
//!
//! # Validate references without producing output
//! mdxclude book.md --validate-only
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod heading;
pub mod resolver;
pub mod security;
pub mod stream;
pub mod token;

// Re-export main types and functions for convenience
pub use cache::{CacheStats, FileCache, MemoryCache, NoopCache};
pub use engine::{TranscludeOptions, TranscludeOutput, transclude, transclude_file};
pub use error::{ErrorCode, ProcessingError, Result, TranscludeError};
pub use heading::{extract_range, extract_single};
pub use resolver::{ResolveContext, resolve_reference, substitute_variables};
pub use security::{is_within_root, validate_reference};
pub use stream::{FrontmatterFilter, StreamTransclusion, transclude_stream};
pub use token::{
    CommentTracker, FenceTracker, HeadingSelector, ReferenceToken, find_references,
    find_references_tracked,
};
