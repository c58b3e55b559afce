use std::path::Path;

use colored::Colorize;
use prettytable::{format, Cell, Row, Table};

use crate::client::{Assessment, AutolabClient, Course, Problem};
use crate::context::{self, AssessmentContext};
use crate::error::Result;

/// Prefixes the entry matching `current` with `*` and highlights it
fn mark_current(name: &str, label: String, current: Option<&str>) -> String {
    match current {
        Some(current) if current.eq_ignore_ascii_case(name) => format!("* {}", label.green()),
        _ => format!("  {}", label),
    }
}

/// One line per course, the course of the current directory marked
pub fn render_courses(courses: &[Course], current: Option<&AssessmentContext>) -> Vec<String> {
    let current = current.map(|ctx| ctx.course.as_str());
    courses
        .iter()
        .map(|course| {
            let label = format!("{} ({})", course.name, course.display_name);
            mark_current(&course.name, label, current)
        })
        .collect()
}

/// One line per assessment sorted by name
///
/// The assessment of the current directory is marked when it belongs to
/// `course`.
pub fn render_assessments(
    course: &str,
    assessments: &[Assessment],
    current: Option<&AssessmentContext>,
) -> Vec<String> {
    let current = current
        .filter(|ctx| ctx.course.eq_ignore_ascii_case(course))
        .map(|ctx| ctx.assessment.as_str());

    let mut sorted: Vec<&Assessment> = assessments.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    sorted
        .into_iter()
        .map(|asmt| {
            let label = format!("{} ({})", asmt.name, asmt.display_name);
            mark_current(&asmt.name, label, current)
        })
        .collect()
}

/// Problems table with name, maximum score and description
pub fn render_problems(problems: &[Problem]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.set_titles(Row::new(vec![
        Cell::new("Name"),
        Cell::new("Max Score"),
        Cell::new("Description"),
    ]));

    for problem in problems {
        let max_score = problem
            .max_score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "--".to_string());
        let mut name = problem.name.clone();
        if problem.optional {
            name.push_str(" (optional)");
        }
        table.add_row(Row::new(vec![
            Cell::new(&name),
            Cell::new(&max_score),
            Cell::new(problem.description.as_deref().unwrap_or("")),
        ]));
    }
    table
}

pub async fn list_courses(client: &mut AutolabClient, cwd: &Path) -> Result<()> {
    let courses = client.get_courses().await?;
    if courses.is_empty() {
        println!("{}", "No current courses.".yellow());
        return Ok(());
    }

    let current = context::find_context(cwd)?;
    for line in render_courses(&courses, current.as_ref()) {
        println!("{}", line);
    }
    Ok(())
}

pub async fn list_assessments(client: &mut AutolabClient, course: &str, cwd: &Path) -> Result<()> {
    let assessments = client.get_assessments(course).await?;
    if assessments.is_empty() {
        println!("{}", format!("No assessments in {}.", course).yellow());
        return Ok(());
    }

    let current = context::find_context(cwd)?;
    for line in render_assessments(course, &assessments, current.as_ref()) {
        println!("{}", line);
    }
    Ok(())
}

pub async fn list_problems(client: &mut AutolabClient, ctx: &AssessmentContext) -> Result<()> {
    let problems = client.get_problems(&ctx.course, &ctx.assessment).await?;
    if problems.is_empty() {
        println!("{}", format!("{} has no problems.", ctx).yellow());
        return Ok(());
    }

    println!("\nProblems of {}:", ctx.to_string().cyan());
    render_problems(&problems).printstd();
    println!();
    Ok(())
}
