//! Typed views of the `/api/v1` responses

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub major: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
}

/// A course the user is enrolled in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Short name used in URLs
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    pub late_slack: Option<i64>,
    #[serde(default)]
    pub grace_days: Option<i64>,
    /// `student`, `course_assistant` or `instructor`
    #[serde(default)]
    pub auth_level: Option<String>,
}

/// An assessment as listed for a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Short name used in URLs
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
}

/// Full details of one assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentDetails {
    #[serde(flatten)]
    pub assessment: Assessment,
    #[serde(default)]
    pub description: Option<String>,
    /// Negative means unlimited
    #[serde(default = "unlimited")]
    pub max_submissions: i64,
    #[serde(default)]
    pub max_grace_days: i64,
    #[serde(default)]
    pub disable_handins: bool,
    #[serde(default)]
    pub group_size: Option<u32>,
}

fn unlimited() -> i64 {
    -1
}

impl AssessmentDetails {
    /// `None` when submissions are unlimited
    pub fn submission_limit(&self) -> Option<u32> {
        u32::try_from(self.max_submissions).ok()
    }
}

/// A graded problem of an assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub optional: bool,
}

/// One submission and the scores it received so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub version: u32,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Problem name to score; `None` while ungraded
    #[serde(default)]
    pub scores: HashMap<String, Option<f64>>,
}

impl Submission {
    /// Score for `problem`, if graded
    pub fn score(&self, problem: &str) -> Option<f64> {
        self.scores.get(problem).copied().flatten()
    }
}

/// Where a handout or writeup can be found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// The assessment has none
    None,
    /// Hosted elsewhere
    Url(String),
    /// Downloaded to this path
    File(PathBuf),
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubmitResponse {
    pub version: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FeedbackResponse {
    pub feedback: String,
}
