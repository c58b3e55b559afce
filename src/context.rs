//! Assessment directory context
//!
//! `autolab download` creates a directory per assessment and drops a small
//! `.autolab-asmt` file into it. Commands run anywhere below that directory
//! find the file by walking up the tree and use it when the user did not
//! name the course and assessment explicitly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AutolabError, Result};

/// Name of the context file inside an assessment directory
pub const CONTEXT_FILE_NAME: &str = ".autolab-asmt";

/// How many parent directories are searched for the context file
pub const MAX_SEARCH_DEPTH: usize = 8;

/// A course/assessment pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentContext {
    pub course: String,
    pub assessment: String,
}

impl AssessmentContext {
    /// Parses `course:assessment`, splitting on the first `:`
    ///
    /// # Examples
    ///
    /// ```
    /// use autolab::context::AssessmentContext;
    ///
    /// let ctx = AssessmentContext::parse("15213-f16:datalab").unwrap();
    /// assert_eq!(ctx.course, "15213-f16");
    /// assert_eq!(ctx.assessment, "datalab");
    /// assert!(AssessmentContext::parse("datalab").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.split_once(':') {
            Some((course, assessment)) if !course.is_empty() && !assessment.is_empty() => {
                Ok(Self {
                    course: course.to_string(),
                    assessment: assessment.to_string(),
                })
            }
            _ => Err(AutolabError::Usage(format!(
                "Failed to parse course name and assessment name: {} (expected course:assessment)",
                raw
            ))
            .into()),
        }
    }
}

impl std::fmt::Display for AssessmentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.course, self.assessment)
    }
}

/// Writes the context file into `directory`
pub fn write_context(directory: &Path, context: &AssessmentContext) -> Result<PathBuf> {
    let path = directory.join(CONTEXT_FILE_NAME);
    let contents = serde_yaml::to_string(context)?;
    std::fs::write(&path, contents).map_err(|e| AutolabError::file_system(&path, e))?;
    Ok(path)
}

/// Finds the nearest context file at or above `start`
///
/// At most [`MAX_SEARCH_DEPTH`] parents are visited.
pub fn find_context(start: &Path) -> Result<Option<AssessmentContext>> {
    for directory in start.ancestors().take(MAX_SEARCH_DEPTH + 1) {
        let path = directory.join(CONTEXT_FILE_NAME);
        if path.is_file() {
            let contents =
                std::fs::read_to_string(&path).map_err(|e| AutolabError::file_system(&path, e))?;
            let context: AssessmentContext = serde_yaml::from_str(&contents)?;
            tracing::debug!(path = %path.display(), %context, "Found assessment context");
            return Ok(Some(context));
        }
    }
    Ok(None)
}

fn not_in_assessment_dir() -> anyhow::Error {
    AutolabError::Usage(
        "Not inside an autolab assessment directory.\n\
         Please change directory or specify the course and assessment names."
            .to_string(),
    )
    .into()
}

/// Explicit `course:assessment` wins; otherwise the context file is used
pub fn resolve(explicit: Option<&str>, cwd: &Path) -> Result<AssessmentContext> {
    match explicit {
        Some(raw) => AssessmentContext::parse(raw),
        None => find_context(cwd)?.ok_or_else(not_in_assessment_dir),
    }
}

/// Like [`resolve`], but explicit names must agree with the context file
///
/// With `force`, the context file is ignored and explicit names are
/// required.
pub fn resolve_checked(
    explicit: Option<&str>,
    force: bool,
    cwd: &Path,
) -> Result<AssessmentContext> {
    if force {
        let raw = explicit.ok_or_else(|| {
            AutolabError::Usage(
                "The '--force' option can only be used when the course and assessment names are also specified."
                    .to_string(),
            )
        })?;
        return AssessmentContext::parse(raw);
    }

    let configured = find_context(cwd)?;
    match (explicit, configured) {
        (Some(raw), Some(configured)) => {
            let provided = AssessmentContext::parse(raw)?;
            if provided != configured {
                return Err(AutolabError::Usage(format!(
                    "The provided names and the configured names for this autolab assessment directory do not match:\n\
                     Provided names:   {}\n\
                     Configured names: {}\n\n\
                     Please resolve this conflict, or use the '--force' option to force the use of the provided names.",
                    provided, configured
                ))
                .into());
            }
            Ok(provided)
        }
        (Some(raw), None) => AssessmentContext::parse(raw),
        (None, Some(configured)) => Ok(configured),
        (None, None) => Err(not_in_assessment_dir()),
    }
}
