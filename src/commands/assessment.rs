//! Status, download and submit handlers

use std::path::Path;

use chrono::{DateTime, Local, Utc};
use colored::Colorize;

use crate::client::{AssessmentDetails, Attachment, AutolabClient};
use crate::context::{self, AssessmentContext};
use crate::error::{AutolabError, Result};

fn format_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%a %b %e %Y, %H:%M %Z")
        .to_string()
}

fn describe_attachment(kind: &str, attachment: &Attachment) -> String {
    match attachment {
        Attachment::None => format!("No {} for this assessment.", kind),
        Attachment::Url(url) => format!("The {} is hosted at {}", kind, url),
        Attachment::File(path) => format!("Downloaded {} to {}", kind, path.display()),
    }
}

/// Lines `status` prints for the assessment configured in `ctx`
fn status_lines(ctx: &AssessmentContext, details: &AssessmentDetails) -> Vec<String> {
    let assessment = &details.assessment;
    let title = if assessment.display_name.is_empty() {
        assessment.name.clone()
    } else {
        assessment.display_name.clone()
    };
    let due = assessment
        .due_at
        .as_ref()
        .map(format_time)
        .unwrap_or_else(|| "not set".to_string());
    let max_submissions = details
        .submission_limit()
        .map(|limit| limit.to_string())
        .unwrap_or_else(|| "Infinite".to_string());

    vec![
        format!("Assessment Config: {}", ctx),
        String::new(),
        title,
        format!("Due: {}", due),
        format!("Max submissions: {}", max_submissions),
        format!("Max grace days: {}", details.max_grace_days),
    ]
}

/// Describes the assessment directory `cwd` is in
///
/// Outside an assessment directory this only prints a notice and makes no
/// request.
pub async fn show_status(client: &mut AutolabClient, cwd: &Path) -> Result<()> {
    let Some(ctx) = context::find_context(cwd)? else {
        println!("{}", "Not currently in any assessment directory".yellow());
        println!();
        println!(
            "Failed to find an assessment config file in the current directory or any of its parent directories (up to {} levels).",
            context::MAX_SEARCH_DEPTH
        );
        return Ok(());
    };

    tracing::debug!(context = %ctx, "Found assessment context");
    let details = client
        .get_assessment_details(&ctx.course, &ctx.assessment)
        .await?;
    for line in status_lines(&ctx, &details) {
        println!("{}", line);
    }
    Ok(())
}

/// Creates `<cwd>/<assessment>` and fills it with the handout and writeup
pub async fn download(client: &mut AutolabClient, ctx: &AssessmentContext, cwd: &Path) -> Result<()> {
    let details = client
        .get_assessment_details(&ctx.course, &ctx.assessment)
        .await?;

    let directory = cwd.join(&ctx.assessment);
    if directory.exists() {
        return Err(AutolabError::Usage(format!(
            "Directory '{}' already exists. Remove it or download from another directory.",
            directory.display()
        ))
        .into());
    }
    std::fs::create_dir_all(&directory).map_err(|e| AutolabError::file_system(&directory, e))?;
    tracing::debug!(directory = %directory.display(), "Created assessment directory");

    println!(
        "Downloading {} into {}",
        details.assessment.display_name.cyan(),
        directory.display()
    );

    let handout = client
        .download_handout(&directory, &ctx.course, &ctx.assessment)
        .await?;
    println!("{}", describe_attachment("handout", &handout));

    let writeup = client
        .download_writeup(&directory, &ctx.course, &ctx.assessment)
        .await?;
    println!("{}", describe_attachment("writeup", &writeup));

    context::write_context(&directory, ctx)?;

    if let Some(due_at) = &details.assessment.due_at {
        println!("Due: {}", format_time(due_at).yellow());
    }
    if let Some(limit) = details.submission_limit() {
        println!("Submission limit: {}", limit);
    }
    Ok(())
}

pub async fn submit(client: &mut AutolabClient, ctx: &AssessmentContext, file: &Path) -> Result<()> {
    if !file.is_file() {
        return Err(AutolabError::file_system(
            file,
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        )
        .into());
    }

    let version = client
        .submit_assessment(&ctx.course, &ctx.assessment, file)
        .await?;
    println!(
        "{}",
        format!(
            "Successfully submitted {} to {} (version {})",
            file.display(),
            ctx,
            version
        )
        .green()
    );
    println!(
        "Use {} to check your score.",
        format!("autolab scores {}", ctx).cyan()
    );
    Ok(())
}
