use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::FileCache;
use crate::error::{ProcessingError, Result, TranscludeError};
use crate::heading::{extract_range, extract_single};
use crate::resolver::{ResolveContext, resolve_reference};
use crate::security::normalize_path;
use crate::stream::FrontmatterFilter;
use crate::token::{
    CommentTracker, FenceTracker, HeadingSelector, ReferenceToken, find_references_tracked,
};

/// Configuration for one transclusion call. Immutable while the call runs;
/// only the injected cache outlives it.
#[derive(Debug, Clone)]
pub struct TranscludeOptions {
    /// Base directory for resolving references; also the security boundary
    pub base_path: PathBuf,
    /// Extensions probed when a reference carries none
    pub extensions: Vec<String>,
    /// Flat variable map for `{{name}}` substitution in reference paths
    pub variables: HashMap<String, String>,
    /// Escalate per-reference failures to a failed call (caller's decision)
    pub strict: bool,
    /// Maximum recursion depth before references become error markers
    pub max_depth: usize,
    /// Run the full pipeline but emit no content
    pub validate_only: bool,
    /// Strip leading YAML/TOML front matter from documents
    pub strip_frontmatter: bool,
    /// Optional file-content cache; a miss degrades to a direct read
    pub cache: Option<Arc<dyn FileCache>>,
    /// Path of the top-level document, for resolving its relative references
    pub initial_file_path: Option<PathBuf>,
}

impl Default for TranscludeOptions {
    fn default() -> Self {
        Self {
            base_path: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            extensions: vec![".md".to_string(), ".markdown".to_string()],
            variables: HashMap::new(),
            strict: false,
            max_depth: 10,
            validate_only: false,
            strip_frontmatter: false,
            cache: None,
            initial_file_path: None,
        }
    }
}

/// Result of one transclusion call.
#[derive(Debug, Clone, Default)]
pub struct TranscludeOutput {
    /// Fully expanded document (empty under `validate_only`)
    pub content: String,
    /// Every diagnostic accumulated during the call, in encounter order
    pub errors: Vec<ProcessingError>,
    /// Absolute path of every file opened, deduplicated, insertion order
    pub processed_files: Vec<PathBuf>,
}

/// Expands all transclusion references in `input`.
///
/// Failures are local to the reference that caused them: the offending
/// marker is replaced by an inline error comment, the diagnostic is appended
/// to the error list, and processing continues. The call itself never fails.
pub fn transclude(input: &str, options: &TranscludeOptions) -> TranscludeOutput {
    let mut engine = Engine::new(options);
    let content = engine.process_document(input);
    engine.into_output(content)
}

/// Reads `path` and expands it, resolving its relative references against
/// its own directory.
///
/// # Errors
///
/// `TranscludeError::Read` when the top-level file itself cannot be read;
/// everything downstream is accumulated in the output instead.
pub fn transclude_file(path: &Path, options: &TranscludeOptions) -> Result<TranscludeOutput> {
    let absolute = absolutize(path);
    let input = fs::read_to_string(&absolute).map_err(|source| TranscludeError::Read {
        path: absolute.clone(),
        source,
    })?;

    let mut options = options.clone();
    options.initial_file_path = Some(absolute.clone());

    let mut engine = Engine::new(&options);
    engine.mark_processed(&absolute);
    let content = engine.process_document(&input);
    Ok(engine.into_output(content))
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        normalize_path(&cwd.join(path))
    }
}

/// Inline replacement for a failed reference. Comment-delimited so that
/// downstream renderers can recognize and strip it.
fn error_marker(error: &TranscludeError) -> String {
    format!("<!-- Error: {error} -->")
}

/// Depth-first expansion over the inclusion graph. One instance per
/// top-level call; owns the error list and the processed-file set.
pub(crate) struct Engine<'a> {
    options: &'a TranscludeOptions,
    root: PathBuf,
    errors: Vec<ProcessingError>,
    processed: Vec<PathBuf>,
    processed_set: HashSet<PathBuf>,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(options: &'a TranscludeOptions) -> Self {
        Self {
            options,
            root: absolutize(&options.base_path),
            errors: Vec::new(),
            processed: Vec::new(),
            processed_set: HashSet::new(),
        }
    }

    /// Expands a whole document: front-matter filtering (when configured),
    /// fence masking, then per-line expansion. Line structure is preserved
    /// exactly for content that expands to itself.
    pub(crate) fn process_document(&mut self, input: &str) -> String {
        let mut frontmatter = FrontmatterFilter::new(self.options.strip_frontmatter);
        let mut fence = FenceTracker::new();
        let mut comments = CommentTracker::new();
        let mut lines = Vec::new();
        for (index, line) in input.split('\n').enumerate() {
            if frontmatter.suppress(line) {
                continue;
            }
            if fence.observe(line) {
                lines.push(line.to_string());
            } else {
                lines.push(self.expand_line(line, Some(index + 1), &mut comments));
            }
        }
        lines.join("\n")
    }

    /// Expands one line at recursion depth zero. `comments` belongs to the
    /// document the line came from; fenced lines never reach it.
    pub(crate) fn expand_line(
        &mut self,
        line: &str,
        line_no: Option<usize>,
        comments: &mut CommentTracker,
    ) -> String {
        let parent = self.options.initial_file_path.clone();
        let mut visited = Vec::new();
        self.expand(line, 0, &mut visited, parent.as_deref(), line_no, comments)
    }

    pub(crate) fn processed_files(&self) -> &[PathBuf] {
        &self.processed
    }

    pub(crate) fn errors(&self) -> &[ProcessingError] {
        &self.errors
    }

    pub(crate) fn into_output(self, content: String) -> TranscludeOutput {
        TranscludeOutput {
            content: if self.options.validate_only {
                String::new()
            } else {
                content
            },
            errors: self.errors,
            processed_files: self.processed,
        }
    }

    /// Core recursion. `visited` is the ordered set of absolute paths on the
    /// current branch, pushed before descending into a file and popped after,
    /// so sibling branches never observe each other's visits and diamond
    /// inclusion stays legal.
    fn expand(
        &mut self,
        line: &str,
        depth: usize,
        visited: &mut Vec<PathBuf>,
        parent: Option<&Path>,
        line_no: Option<usize>,
        comments: &mut CommentTracker,
    ) -> String {
        let tokens = find_references_tracked(line, comments);
        if tokens.is_empty() {
            return line.to_string();
        }

        let max_depth = self.options.max_depth;
        let mut output = String::with_capacity(line.len());
        let mut cursor = 0;
        for token in &tokens {
            // offsets index the original line, so a running cursor keeps
            // them valid regardless of how earlier replacements grew
            output.push_str(&line[cursor..token.start]);
            cursor = token.end;

            let replacement = if depth >= max_depth {
                let err = TranscludeError::MaxDepthExceeded {
                    max_depth,
                    path: token.path.clone(),
                };
                self.record(&err, line_no);
                error_marker(&err)
            } else {
                match self.process_token(token, depth, visited, parent, line_no) {
                    Ok(expanded) => expanded,
                    Err(err) => {
                        self.record(&err, line_no);
                        error_marker(&err)
                    }
                }
            };
            output.push_str(&replacement);
        }
        output.push_str(&line[cursor..]);
        output
    }

    /// Resolves, reads, scopes, and recursively expands one reference.
    fn process_token(
        &mut self,
        token: &ReferenceToken,
        depth: usize,
        visited: &mut Vec<PathBuf>,
        parent: Option<&Path>,
        line_no: Option<usize>,
    ) -> Result<String> {
        let path = {
            let ctx = ResolveContext {
                root: &self.root,
                extensions: &self.options.extensions,
                variables: &self.options.variables,
                strict: self.options.strict,
                parent,
            };
            resolve_reference(&token.path, &ctx)?
        };

        let content = self.read_file(&path)?;
        let content = match &token.heading {
            Some(HeadingSelector::Section(name)) => {
                extract_single(&content, name).ok_or_else(|| TranscludeError::HeadingNotFound {
                    path: path.clone(),
                    heading: name.clone(),
                })?
            }
            Some(HeadingSelector::Range { start, end }) => {
                extract_range(&content, start.as_deref(), end.as_deref()).ok_or_else(|| {
                    TranscludeError::HeadingNotFound {
                        path: path.clone(),
                        heading: format!(
                            "{}:{}",
                            start.as_deref().unwrap_or_default(),
                            end.as_deref().unwrap_or_default()
                        ),
                    }
                })?
            }
            None => content,
        };

        if visited.iter().any(|seen| seen == &path) {
            let chain = visited
                .iter()
                .chain(std::iter::once(&path))
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(TranscludeError::CircularReference { chain });
        }

        self.mark_processed(&path);
        let content = if self.options.strip_frontmatter {
            strip_leading_frontmatter(&content)
        } else {
            content
        };

        visited.push(path.clone());
        let mut fence = FenceTracker::new();
        let mut comments = CommentTracker::new();
        let mut expanded = String::with_capacity(content.len());
        for (index, inner) in content.split('\n').enumerate() {
            if index > 0 {
                expanded.push('\n');
            }
            if fence.observe(inner) {
                expanded.push_str(inner);
            } else {
                let rendered =
                    self.expand(inner, depth + 1, visited, Some(&path), line_no, &mut comments);
                expanded.push_str(&rendered);
            }
        }
        visited.pop();
        Ok(expanded)
    }

    /// Reads through the cache capability when one is configured. Cache
    /// lookups cannot fail; any miss is a direct read.
    fn read_file(&mut self, path: &Path) -> Result<String> {
        if let Some(cache) = &self.options.cache
            && let Some(content) = cache.get(path)
        {
            return Ok(content);
        }

        let content = fs::read_to_string(path).map_err(|source| TranscludeError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(cache) = &self.options.cache {
            cache.set(path, &content);
        }
        Ok(content)
    }

    pub(crate) fn mark_processed(&mut self, path: &Path) {
        if self.processed_set.insert(path.to_path_buf()) {
            self.processed.push(path.to_path_buf());
        }
    }

    fn record(&mut self, error: &TranscludeError, line: Option<usize>) {
        self.errors.push(ProcessingError::from_error(error, line));
    }
}

/// Strips a leading YAML/TOML front-matter block. Idempotent: content whose
/// block was already removed no longer starts with a delimiter, so a second
/// pass changes nothing.
fn strip_leading_frontmatter(content: &str) -> String {
    let mut filter = FrontmatterFilter::new(true);
    let kept: Vec<&str> = content
        .split('\n')
        .filter(|line| !filter.suppress(line))
        .collect();
    kept.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::ErrorCode;
    use std::fs;
    use tempfile::TempDir;

    fn options_for(base: &Path) -> TranscludeOptions {
        TranscludeOptions {
            base_path: base.to_path_buf(),
            ..TranscludeOptions::default()
        }
    }

    fn write(base: &Path, name: &str, content: &str) {
        let path = base.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_identity_without_references() {
        let temp = TempDir::new().unwrap();
        let options = options_for(temp.path());

        for line in ["", "plain text", "  indented  ", "no ![[ here", "逆 text"] {
            let output = transclude(line, &options);
            assert_eq!(output.content, line);
            assert!(output.errors.is_empty());
        }
    }

    #[test]
    fn test_simple_inclusion() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "inner.md", "included body");
        let options = options_for(temp.path());

        let output = transclude("before\n![[inner]]\nafter", &options);
        assert_eq!(output.content, "before\nincluded body\nafter");
        assert!(output.errors.is_empty());
        assert_eq!(output.processed_files.len(), 1);
    }

    #[test]
    fn test_inclusion_preserves_surrounding_text() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "x.md", "X");
        let options = options_for(temp.path());

        let output = transclude("a ![[x]] b ![[x]] c", &options);
        assert_eq!(output.content, "a X b X c");
    }

    #[test]
    fn test_nested_inclusion() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "outer.md", "outer says ![[middle]]");
        write(temp.path(), "middle.md", "middle says ![[leaf]]");
        write(temp.path(), "leaf.md", "leaf");
        let options = options_for(temp.path());

        let output = transclude("![[outer]]", &options);
        assert_eq!(output.content, "outer says middle says leaf");
        assert_eq!(output.processed_files.len(), 3);
    }

    #[test]
    fn test_heading_scoped_inclusion() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "api.md",
            "# API\n\n## Usage\n\ncall it\n\n## Internals\n\nsecret",
        );
        let options = options_for(temp.path());

        let output = transclude("![[api#Usage]]", &options);
        assert!(output.content.contains("call it"));
        assert!(!output.content.contains("secret"));
        assert!(output.errors.is_empty());
    }

    #[test]
    fn test_heading_not_found_is_local() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "api.md", "# API\n\nbody");
        let options = options_for(temp.path());

        let output = transclude("![[api#Missing]] and ![[api]]", &options);
        assert!(output.content.contains("<!-- Error:"));
        assert!(output.content.contains("Missing"));
        // the sibling reference on the same line still expanded
        assert!(output.content.contains("body"));
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].code, ErrorCode::HeadingNotFound);
    }

    #[test]
    fn test_missing_file_leaves_visible_trace() {
        let temp = TempDir::new().unwrap();
        let options = options_for(temp.path());

        let output = transclude("see ![[ghost]] here", &options);
        assert!(output.content.starts_with("see <!-- Error:"));
        assert!(output.content.contains("ghost"));
        assert!(output.content.ends_with(" here"));
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].code, ErrorCode::FileNotFound);
        assert_eq!(output.errors[0].line, Some(1));
    }

    #[test]
    fn test_error_line_numbers() {
        let temp = TempDir::new().unwrap();
        let options = options_for(temp.path());

        let output = transclude("fine\n\n![[ghost]]", &options);
        assert_eq!(output.errors[0].line, Some(3));
    }

    #[test]
    fn test_circular_reference_detected() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.md", "A then ![[b]]");
        write(temp.path(), "b.md", "B then ![[a]]");
        let options = options_for(temp.path());

        let output = transclude("![[a]]", &options);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].code, ErrorCode::CircularReference);
        // chain names both files
        assert!(output.errors[0].message.contains("a.md"));
        assert!(output.errors[0].message.contains("b.md"));
        assert!(output.content.contains("<!-- Error:"));
    }

    #[test]
    fn test_self_inclusion_is_circular() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "self.md", "me: ![[self]]");
        let options = options_for(temp.path());

        let output = transclude("![[self]]", &options);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].code, ErrorCode::CircularReference);
    }

    #[test]
    fn test_diamond_inclusion_is_not_circular() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "top.md", "![[left]]\n![[right]]");
        write(temp.path(), "left.md", "L ![[shared]]");
        write(temp.path(), "right.md", "R ![[shared]]");
        write(temp.path(), "shared.md", "S");
        let options = options_for(temp.path());

        let output = transclude("![[top]]", &options);
        assert!(output.errors.is_empty(), "diamond raised: {:?}", output.errors);
        assert_eq!(output.content, "L S\nR S");
        // shared file reported once despite two inclusions
        let shared_count = output
            .processed_files
            .iter()
            .filter(|p| p.ends_with("shared.md"))
            .count();
        assert_eq!(shared_count, 1);
    }

    #[test]
    fn test_max_depth_terminates() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "loop.md", "x ![[loop2]]");
        write(temp.path(), "loop2.md", "y ![[loop]]");

        for max_depth in [1, 3, 10, 50] {
            let options = TranscludeOptions {
                max_depth,
                ..options_for(temp.path())
            };
            let output = transclude("![[loop]]", &options);
            assert!(
                output
                    .errors
                    .iter()
                    .any(|e| e.code == ErrorCode::MaxDepthExceeded
                        || e.code == ErrorCode::CircularReference),
                "no terminating error at depth {max_depth}"
            );
        }
    }

    #[test]
    fn test_long_chain_hits_depth_cap() {
        let temp = TempDir::new().unwrap();
        for i in 0..6 {
            write(
                temp.path(),
                &format!("chain{i}.md"),
                &format!("c{i} ![[chain{}]]", i + 1),
            );
        }
        write(temp.path(), "chain6.md", "end");
        let options = TranscludeOptions {
            max_depth: 3,
            ..options_for(temp.path())
        };

        let output = transclude("![[chain0]]", &options);
        assert!(
            output
                .errors
                .iter()
                .any(|e| e.code == ErrorCode::MaxDepthExceeded)
        );
        assert!(output.content.contains("<!-- Error:"));
        assert!(!output.content.contains("end"));
    }

    #[test]
    fn test_depth_cap_leaves_marker_per_token() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "deep.md", "![[a]] ![[b]]");
        write(temp.path(), "a.md", "A");
        write(temp.path(), "b.md", "B");
        let options = TranscludeOptions {
            max_depth: 1,
            ..options_for(temp.path())
        };

        let output = transclude("![[deep]]", &options);
        let markers = output.content.matches("<!-- Error:").count();
        assert_eq!(markers, 2);
        assert_eq!(
            output
                .errors
                .iter()
                .filter(|e| e.code == ErrorCode::MaxDepthExceeded)
                .count(),
            2
        );
    }

    #[test]
    fn test_processed_files_insertion_order() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "first.md", "1 ![[second]]");
        write(temp.path(), "second.md", "2");
        write(temp.path(), "third.md", "3");
        let options = options_for(temp.path());

        let output = transclude("![[first]]\n![[third]]\n![[first]]", &options);
        let names: Vec<String> = output
            .processed_files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["first.md", "second.md", "third.md"]);
    }

    #[test]
    fn test_parent_relative_resolution_in_nested_file() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "sections/chapter.md", "chapter ![[detail]]");
        write(temp.path(), "sections/detail.md", "detail text");
        let options = options_for(temp.path());

        let output = transclude("![[sections/chapter]]", &options);
        assert_eq!(output.content, "chapter detail text");
        assert!(output.errors.is_empty());
    }

    #[test]
    fn test_security_rejection_surfaces_inline() {
        let temp = TempDir::new().unwrap();
        let options = options_for(temp.path());

        let output = transclude("![[/etc/passwd]]", &options);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].code, ErrorCode::AbsolutePath);
        assert!(output.content.contains("<!-- Error:"));
        assert!(output.content.contains("/etc/passwd"));
    }

    #[test]
    fn test_escape_outside_root_rejected() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        fs::create_dir(&docs).unwrap();
        fs::write(temp.path().join("secret.md"), "secret").unwrap();
        let options = options_for(&docs);

        let output = transclude("![[../secret]]", &options);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].code, ErrorCode::OutsideRoot);
        assert!(!output.content.contains("secret\n"));
    }

    #[test]
    fn test_fenced_block_suppresses_references() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "x.md", "X");
        let options = options_for(temp.path());

        let input = "```\n![[x]]\n```\n![[x]]";
        let output = transclude(input, &options);
        assert_eq!(output.content, "```\n![[x]]\n```\nX");
    }

    #[test]
    fn test_fence_state_inside_included_file() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "doc.md", "```\n![[x]]\n```\n![[x]]");
        write(temp.path(), "x.md", "X");
        let options = options_for(temp.path());

        let output = transclude("![[doc]]", &options);
        assert_eq!(output.content, "```\n![[x]]\n```\nX");
    }

    #[test]
    fn test_multiline_html_comment_suppresses_references() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "x.md", "X");
        let options = options_for(temp.path());

        let input = "<!--\n![[x]]\n-->\n![[x]]";
        let output = transclude(input, &options);
        assert_eq!(output.content, "<!--\n![[x]]\n-->\nX");
        assert!(output.errors.is_empty());
    }

    #[test]
    fn test_comment_state_scoped_to_each_file() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "open.md", "note <!--");
        write(temp.path(), "x.md", "X");
        let options = options_for(temp.path());

        // an unterminated comment inside an included file does not mask
        // the including document's later lines
        let output = transclude("![[open]]\n![[x]]", &options);
        assert_eq!(output.content, "note <!--\nX");
        assert!(output.errors.is_empty());
    }

    #[test]
    fn test_inline_code_passes_through() {
        let temp = TempDir::new().unwrap();
        let options = options_for(temp.path());

        let line = "literal `![[nope]]` stays";
        let output = transclude(line, &options);
        assert_eq!(output.content, line);
        assert!(output.errors.is_empty());
    }

    #[test]
    fn test_frontmatter_stripped_from_included_file() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "fm.md",
            "---\ntitle: Inner\n---\nactual body",
        );
        let options = TranscludeOptions {
            strip_frontmatter: true,
            ..options_for(temp.path())
        };

        let output = transclude("![[fm]]", &options);
        assert_eq!(output.content, "actual body");
    }

    #[test]
    fn test_frontmatter_left_alone_without_flag() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "fm.md", "---\ntitle: Inner\n---\nbody");
        let options = options_for(temp.path());

        let output = transclude("![[fm]]", &options);
        assert!(output.content.contains("title: Inner"));
    }

    #[test]
    fn test_validate_only_reports_without_content() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "ok.md", "fine");
        let options = TranscludeOptions {
            validate_only: true,
            ..options_for(temp.path())
        };

        let output = transclude("![[ok]]\n![[ghost]]", &options);
        assert!(output.content.is_empty());
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.processed_files.len(), 1);
    }

    #[test]
    fn test_cache_hit_skips_reread() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "cached.md", "cached body");
        let cache = Arc::new(MemoryCache::new());
        let options = TranscludeOptions {
            cache: Some(cache.clone()),
            ..options_for(temp.path())
        };

        let first = transclude("![[cached]] ![[cached]]", &options);
        assert_eq!(first.content, "cached body cached body");
        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert!(stats.hits >= 1);

        // second call served from the shared cache
        let second = transclude("![[cached]]", &options);
        assert_eq!(second.content, "cached body");
        assert!(cache.stats().hits > stats.hits);
    }

    #[test]
    fn test_variables_in_references() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "en/intro.md", "hello");
        let options = TranscludeOptions {
            variables: HashMap::from([("lang".to_string(), "en".to_string())]),
            ..options_for(temp.path())
        };

        let output = transclude("![[{{lang}}/intro]]", &options);
        assert_eq!(output.content, "hello");
    }

    #[test]
    fn test_transclude_file_resolves_relative_to_itself() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "book/main.md", "main ![[part]]");
        write(temp.path(), "book/part.md", "part");
        let options = options_for(temp.path());

        let output = transclude_file(&temp.path().join("book/main.md"), &options).unwrap();
        assert_eq!(output.content, "main part");
        // the top-level file itself is reported first
        assert!(output.processed_files[0].ends_with("book/main.md"));
        assert_eq!(output.processed_files.len(), 2);
    }

    #[test]
    fn test_transclude_file_missing_is_hard_error() {
        let temp = TempDir::new().unwrap();
        let options = options_for(temp.path());
        let result = transclude_file(&temp.path().join("absent.md"), &options);
        assert!(matches!(result, Err(TranscludeError::Read { .. })));
    }

    #[test]
    fn test_multiline_included_content_expands_per_line() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "multi.md", "one ![[a]]\ntwo ![[b]]");
        write(temp.path(), "a.md", "A");
        write(temp.path(), "b.md", "B");
        let options = options_for(temp.path());

        let output = transclude("![[multi]]", &options);
        assert_eq!(output.content, "one A\ntwo B");
    }
}
