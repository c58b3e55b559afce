//! Scores and feedback handlers

use colored::Colorize;
use prettytable::{format, Cell, Row, Table};

use crate::client::{AutolabClient, Problem, Submission};
use crate::context::AssessmentContext;
use crate::error::{AutolabError, Result};

/// Placeholder for ungraded or missing scores
const NO_SCORE: &str = "--";

fn score_cell(score: Option<f64>) -> String {
    score
        .map(|s| format!("{}", s))
        .unwrap_or_else(|| NO_SCORE.to_string())
}

/// Builds the scores table
///
/// One column per problem, one row per submission (newest first). Only
/// the latest submission is shown unless `all` is set.
pub fn render_scores(problems: &[Problem], submissions: &[Submission], all: bool) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);

    let mut titles = vec![Cell::new("Version")];
    for problem in problems {
        let title = match problem.max_score {
            Some(max) => format!("{} ({})", problem.name, max),
            None => problem.name.clone(),
        };
        titles.push(Cell::new(&title));
    }
    titles.push(Cell::new("Total"));
    table.set_titles(Row::new(titles));

    let shown = if all {
        submissions
    } else {
        &submissions[..submissions.len().min(1)]
    };

    for submission in shown {
        let mut cells = vec![Cell::new(&submission.version.to_string())];
        let mut total = None;
        for problem in problems {
            let score = submission.score(&problem.name);
            if let Some(s) = score {
                total = Some(total.unwrap_or(0.0) + s);
            }
            cells.push(Cell::new(&score_cell(score)));
        }
        cells.push(Cell::new(&score_cell(total)));
        table.add_row(Row::new(cells));
    }
    table
}

pub async fn show_scores(client: &mut AutolabClient, ctx: &AssessmentContext, all: bool) -> Result<()> {
    let problems = client.get_problems(&ctx.course, &ctx.assessment).await?;
    let submissions = client.get_submissions(&ctx.course, &ctx.assessment).await?;

    if submissions.is_empty() {
        println!("{}", format!("No submissions for {} yet.", ctx).yellow());
        return Ok(());
    }

    println!("\nScores for {}:", ctx.to_string().cyan());
    render_scores(&problems, &submissions, all).printstd();
    if !all && submissions.len() > 1 {
        println!("Use {} to show all {} submissions.", "-a".cyan(), submissions.len());
    }
    println!();
    Ok(())
}

/// Prints the feedback of one problem of one submission
///
/// Defaults to the latest submission and the first problem.
pub async fn show_feedback(
    client: &mut AutolabClient,
    ctx: &AssessmentContext,
    problem: Option<&str>,
    version: Option<u32>,
) -> Result<()> {
    let version = match version {
        Some(version) => version,
        None => client
            .get_submissions(&ctx.course, &ctx.assessment)
            .await?
            .first()
            .map(|s| s.version)
            .ok_or_else(|| AutolabError::Usage(format!("No submissions for {} yet.", ctx)))?,
    };

    let problem = match problem {
        Some(problem) => problem.to_string(),
        None => client
            .get_problems(&ctx.course, &ctx.assessment)
            .await?
            .into_iter()
            .next()
            .map(|p| p.name)
            .ok_or_else(|| AutolabError::Usage(format!("{} has no problems.", ctx)))?,
    };

    tracing::debug!(version, problem = %problem, "Fetching feedback");
    let feedback = client
        .get_feedback(&ctx.course, &ctx.assessment, version, &problem)
        .await?;

    println!(
        "Feedback for {} (version {}, problem {}):\n",
        ctx.to_string().cyan(),
        version,
        problem.cyan()
    );
    println!("{}", feedback);
    Ok(())
}
