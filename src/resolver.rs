use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, TranscludeError};
use crate::security::{is_within_root, normalize_path, validate_reference};

/// `{{name}}` placeholder inside a reference path
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.-]+)\s*\}\}").unwrap());

/// Cap on nested variable-in-variable expansion
const MAX_VARIABLE_DEPTH: usize = 10;

/// Everything the resolver needs from the caller for one reference.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    /// Absolute base directory; resolved paths must stay inside it
    pub root: &'a Path,
    /// Candidate extensions, tried in order when the reference has none
    pub extensions: &'a [String],
    /// Flat variable map for `{{name}}` substitution
    pub variables: &'a HashMap<String, String>,
    /// Escalate substitution failures instead of leaving placeholders literal
    pub strict: bool,
    /// File containing this reference, when it appears inside an included file
    pub parent: Option<&'a Path>,
}

/// Replaces `{{name}}` placeholders in a reference with their configured
/// values. A value may itself contain placeholders; expansion recurses with a
/// visited-name set and a depth cap, so circular definitions cannot loop.
///
/// In strict mode an undefined or circular variable is an error; otherwise
/// the placeholder is left literal in the output.
///
/// # Errors
///
/// `TranscludeError::Resolve` in strict mode for an undefined variable, a
/// circular definition, or expansion deeper than the cap.
pub fn substitute_variables(
    input: &str,
    variables: &HashMap<String, String>,
    strict: bool,
) -> Result<String> {
    let mut visiting = Vec::new();
    substitute_inner(input, variables, strict, &mut visiting, 0)
}

fn substitute_inner(
    input: &str,
    variables: &HashMap<String, String>,
    strict: bool,
    visiting: &mut Vec<String>,
    depth: usize,
) -> Result<String> {
    if depth >= MAX_VARIABLE_DEPTH {
        if strict {
            return Err(TranscludeError::Resolve {
                reference: input.to_string(),
                message: format!("variable expansion exceeded {MAX_VARIABLE_DEPTH} levels"),
            });
        }
        return Ok(input.to_string());
    }

    let mut output = String::with_capacity(input.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(input) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        output.push_str(&input[last..whole.start()]);
        last = whole.end();
        let name = name.as_str();

        if visiting.iter().any(|seen| seen == name) {
            if strict {
                return Err(TranscludeError::Resolve {
                    reference: input.to_string(),
                    message: format!("circular variable definition: {name}"),
                });
            }
            output.push_str(whole.as_str());
            continue;
        }

        match variables.get(name) {
            Some(value) if PLACEHOLDER.is_match(value) => {
                visiting.push(name.to_string());
                let expanded = substitute_inner(value, variables, strict, visiting, depth + 1)?;
                visiting.pop();
                output.push_str(&expanded);
            }
            Some(value) => output.push_str(value),
            None => {
                if strict {
                    return Err(TranscludeError::Resolve {
                        reference: input.to_string(),
                        message: format!("undefined variable: {name}"),
                    });
                }
                output.push_str(whole.as_str());
            }
        }
    }
    output.push_str(&input[last..]);

    Ok(output)
}

/// Resolves a raw reference path to the first existing file among its
/// candidates.
///
/// Pipeline: variable substitution, security validation, candidate
/// generation (a reference already carrying a configured extension is tried
/// exactly; otherwise the bare path first, then each extension in order),
/// parent-relative lookup before base-relative lookup, and a containment
/// recheck on every absolute candidate before its existence check.
///
/// # Errors
///
/// - substitution and security errors from the earlier pipeline stages;
/// - `TranscludeError::OutsideRoot` when every candidate normalizes to a
///   location outside the base directory;
/// - `TranscludeError::FileNotFound` when no candidate exists, carrying the
///   first candidate path that was tried.
pub fn resolve_reference(reference: &str, ctx: &ResolveContext<'_>) -> Result<PathBuf> {
    let substituted = substitute_variables(reference, ctx.variables, ctx.strict)?;
    let trimmed = substituted.trim();
    if trimmed.is_empty() {
        return Err(TranscludeError::FileNotFound {
            path: ctx.root.to_path_buf(),
        });
    }

    validate_reference(trimmed)?;

    let names = candidate_names(trimmed, ctx.extensions);
    let root = normalize_path(ctx.root);

    // parent-relative first: a reference inside an included file resolves
    // against that file's own directory before falling back to the base
    let mut bases: Vec<&Path> = Vec::with_capacity(2);
    if let Some(parent_dir) = ctx.parent.and_then(Path::parent) {
        bases.push(parent_dir);
    }
    bases.push(&root);

    let mut first_candidate: Option<PathBuf> = None;
    let mut any_contained = false;
    for base in bases {
        for name in &names {
            let candidate = normalize_path(&base.join(name));
            if first_candidate.is_none() {
                first_candidate = Some(candidate.clone());
            }
            if !is_within_root(&candidate, &root) {
                continue;
            }
            any_contained = true;
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    // first_candidate is always set: names is never empty
    let tried = first_candidate.unwrap_or_else(|| root.clone());
    if any_contained {
        Err(TranscludeError::FileNotFound { path: tried })
    } else {
        Err(TranscludeError::OutsideRoot { path: tried })
    }
}

/// Ordered relative candidates for a reference. A recognized extension means
/// the exact path only; otherwise the bare path is tried before each
/// configured extension.
fn candidate_names(reference: &str, extensions: &[String]) -> Vec<String> {
    if extensions.iter().any(|ext| reference.ends_with(ext.as_str())) {
        return vec![reference.to_string()];
    }
    let mut names = Vec::with_capacity(extensions.len() + 1);
    names.push(reference.to_string());
    for ext in extensions {
        names.push(format!("{reference}{ext}"));
    }
    names
}
