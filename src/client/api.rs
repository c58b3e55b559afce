//! Typed wrappers over the `/api/v1` endpoints
//!
//! Each wrapper builds an [`ApiRequest`], sends it through
//! [`AutolabClient::request`] and converts the body. A non-200 response
//! carrying `{"error": ...}` becomes [`AutolabError::Api`]; a 200 response
//! of an unexpected shape becomes [`AutolabError::Protocol`].
//!
//! Course and assessment names are caller input; they are percent-encoded
//! as single path segments, so `/`, `?` and `#` never change the route.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::client::types::{FeedbackResponse, SubmitResponse};
use crate::client::{
    ApiRequest, ApiResponse, Assessment, AssessmentDetails, Attachment, AutolabClient, Course,
    Problem, Submission, User,
};
use crate::error::{AutolabError, Result};

const API_PREFIX: [&str; 2] = ["api", "v1"];

/// `/api/v1/` followed by `segments`, each percent-encoded
fn api_path(segments: &[&str]) -> Result<String> {
    let mut url = Url::parse("http://localhost/")
        .map_err(|e| AutolabError::Protocol(format!("invalid API path: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| AutolabError::Protocol("invalid API path".to_string()))?
        .pop_if_empty()
        .extend(API_PREFIX)
        .extend(segments);
    Ok(url.path().to_string())
}

fn assessment_path(course: &str, assessment: &str, rest: &[&str]) -> Result<String> {
    let mut segments = vec!["courses", course, "assessments", assessment];
    segments.extend_from_slice(rest);
    api_path(&segments)
}

/// Turns a non-200 response into an error
fn ensure_ok(response: &ApiResponse) -> Result<()> {
    if response.is_ok() {
        return Ok(());
    }
    let message = response
        .api_error()
        .unwrap_or_else(|| String::from_utf8_lossy(&response.body).trim().to_string());
    Err(AutolabError::Api {
        status: response.status,
        message: if message.is_empty() {
            "request failed".to_string()
        } else {
            message
        },
    }
    .into())
}

fn decode<T: DeserializeOwned>(response: &ApiResponse, what: &str) -> Result<T> {
    ensure_ok(response)?;
    serde_json::from_value(response.json()?).map_err(|e| {
        AutolabError::Protocol(format!("unexpected {} response: {}", what, e)).into()
    })
}

impl AutolabClient {
    async fn get_json<T: DeserializeOwned>(&mut self, request: ApiRequest, what: &str) -> Result<T> {
        let response = self.json_request(&request).await?;
        decode(&response, what)
    }

    /// `GET /user`
    pub async fn get_user_info(&mut self) -> Result<User> {
        self.get_json(ApiRequest::get(api_path(&["user"])?), "user")
            .await
    }

    /// `GET /courses?state=current`
    pub async fn get_courses(&mut self) -> Result<Vec<Course>> {
        let request = ApiRequest::get(api_path(&["courses"])?).param("state", "current");
        self.get_json(request, "courses").await
    }

    /// `GET /courses/{course}/assessments`
    pub async fn get_assessments(&mut self, course: &str) -> Result<Vec<Assessment>> {
        let request = ApiRequest::get(api_path(&["courses", course, "assessments"])?);
        self.get_json(request, "assessments").await
    }

    /// `GET /courses/{course}/assessments/{assessment}`
    pub async fn get_assessment_details(
        &mut self,
        course: &str,
        assessment: &str,
    ) -> Result<AssessmentDetails> {
        let request = ApiRequest::get(assessment_path(course, assessment, &[])?);
        self.get_json(request, "assessment").await
    }

    /// `GET .../problems`
    pub async fn get_problems(&mut self, course: &str, assessment: &str) -> Result<Vec<Problem>> {
        let request = ApiRequest::get(assessment_path(course, assessment, &["problems"])?);
        self.get_json(request, "problems").await
    }

    /// `GET .../submissions`, newest first
    pub async fn get_submissions(
        &mut self,
        course: &str,
        assessment: &str,
    ) -> Result<Vec<Submission>> {
        let request = ApiRequest::get(assessment_path(course, assessment, &["submissions"])?);
        let mut submissions: Vec<Submission> = self.get_json(request, "submissions").await?;
        submissions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(submissions)
    }

    /// `GET .../submissions/{version}/feedback?problem=...`
    pub async fn get_feedback(
        &mut self,
        course: &str,
        assessment: &str,
        version: u32,
        problem: &str,
    ) -> Result<String> {
        let version = version.to_string();
        let request = ApiRequest::get(assessment_path(
            course,
            assessment,
            &["submissions", &version, "feedback"],
        )?)
        .param("problem", problem);
        let feedback: FeedbackResponse = self.get_json(request, "feedback").await?;
        Ok(feedback.feedback)
    }

    /// `POST .../submit` with `submission[file]`; returns the new version
    pub async fn submit_assessment(
        &mut self,
        course: &str,
        assessment: &str,
        file: &Path,
    ) -> Result<u32> {
        let request = ApiRequest::post(assessment_path(course, assessment, &["submit"])?)
            .upload("submission[file]", file);
        let response = self.json_request(&request).await?;
        let submitted: SubmitResponse = decode(&response, "submit")?;
        tracing::info!(version = submitted.version, "Submission accepted");
        Ok(submitted.version)
    }

    /// `GET .../handout`, downloading into `directory` when it is a file
    pub async fn download_handout(
        &mut self,
        directory: &Path,
        course: &str,
        assessment: &str,
    ) -> Result<Attachment> {
        let request = ApiRequest::get(assessment_path(course, assessment, &["handout"])?);
        self.download_attachment(directory, "handout", request).await
    }

    /// `GET .../writeup`, downloading into `directory` when it is a file
    pub async fn download_writeup(
        &mut self,
        directory: &Path,
        course: &str,
        assessment: &str,
    ) -> Result<Attachment> {
        let request = ApiRequest::get(assessment_path(course, assessment, &["writeup"])?);
        self.download_attachment(directory, "writeup", request).await
    }

    async fn download_attachment(
        &mut self,
        directory: &Path,
        default_filename: &str,
        request: ApiRequest,
    ) -> Result<Attachment> {
        let response = self
            .download_request(directory, default_filename, &request)
            .await?;
        ensure_ok(&response)?;

        if let Some(path) = response.downloaded {
            tracing::debug!(path = %path.display(), "Completed file download");
            return Ok(Attachment::File(path));
        }

        match response.json()?.get("url").and_then(Value::as_str) {
            Some(url) if !url.is_empty() => Ok(Attachment::Url(url.to_string())),
            _ => Ok(Attachment::None),
        }
    }
}
