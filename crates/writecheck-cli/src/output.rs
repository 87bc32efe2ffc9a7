use std::io::Write;

use owo_colors::OwoColorize;
use writecheck_core::{DuplicatePair, Phase, RemoteFile, WorkflowState};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print the status line, colored by how the last operation went.
pub fn print_status(w: &mut dyn Write, state: &WorkflowState, color: ColorMode) -> std::io::Result<()> {
    let msg = &state.status_message;
    if !color.enabled() {
        return writeln!(w, "{}", msg);
    }
    let lower = msg.to_lowercase();
    if state.phase != Phase::Idle {
        writeln!(w, "{}", msg.cyan())
    } else if lower.contains("failed") || lower.contains("could not") || lower.contains("not found") {
        writeln!(w, "{}", msg.red())
    } else if lower.contains("excluded") || lower.contains("not confirmed") {
        writeln!(w, "{}", msg.yellow())
    } else {
        writeln!(w, "{}", msg.green())
    }
}

/// Print the stored collection in service order.
pub fn print_files(w: &mut dyn Write, files: &[RemoteFile], color: ColorMode) -> std::io::Result<()> {
    if files.is_empty() {
        if color.enabled() {
            writeln!(w, "{}", "(collection is empty)".dimmed())?;
        } else {
            writeln!(w, "(collection is empty)")?;
        }
        return Ok(());
    }
    for (i, f) in files.iter().enumerate() {
        if color.enabled() {
            writeln!(w, "{:>3}. {}", (i + 1).dimmed(), f.name)?;
        } else {
            writeln!(w, "{:>3}. {}", i + 1, f.name)?;
        }
    }
    Ok(())
}

/// Print a short summary of the whole session state.
pub fn print_state(w: &mut dyn Write, state: &WorkflowState, color: ColorMode) -> std::io::Result<()> {
    writeln!(w, "Collection type: {}", state.collection_type)?;
    if state.staged.is_empty() {
        writeln!(w, "Staged: none")?;
    } else {
        let names: Vec<&str> = state.staged.iter().map(|f| f.name.as_str()).collect();
        writeln!(w, "Staged: {}", names.join(", "))?;
    }
    writeln!(w, "Stored files: {}", state.files.len())?;
    writeln!(w, "Duplicate pairs: {}", state.duplicates.len())?;
    print_status(w, state, color)
}

/// Options for presenting a duplicate report.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportView {
    pub min_score: Option<f64>,
    pub collapse: bool,
}

/// Merge `(a, b)` and `(b, a)` into one entry, keeping the higher score.
/// First-seen order is kept.
pub fn collapse_symmetric(pairs: &[DuplicatePair]) -> Vec<DuplicatePair> {
    let mut out: Vec<DuplicatePair> = Vec::with_capacity(pairs.len());
    for p in pairs {
        let existing = out.iter_mut().find(|q| {
            (q.file_a == p.file_a && q.file_b == p.file_b)
                || (q.file_a == p.file_b && q.file_b == p.file_a)
        });
        match existing {
            Some(q) => q.score = q.score.max(p.score),
            None => out.push(p.clone()),
        }
    }
    out
}

/// Presentation order: highest score first, ties by name.
pub fn arrange(pairs: &[DuplicatePair], view: ReportView) -> Vec<DuplicatePair> {
    let mut rows = if view.collapse {
        collapse_symmetric(pairs)
    } else {
        pairs.to_vec()
    };
    if let Some(min) = view.min_score {
        rows.retain(|p| p.score >= min);
    }
    rows.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.file_a.cmp(&b.file_a))
            .then_with(|| a.file_b.cmp(&b.file_b))
    });
    rows
}

/// Print the duplicate report as a table.
pub fn print_duplicates(
    w: &mut dyn Write,
    pairs: &[DuplicatePair],
    view: ReportView,
    color: ColorMode,
) -> std::io::Result<()> {
    let rows = arrange(pairs, view);
    if rows.is_empty() {
        return Ok(());
    }

    let width_a = rows.iter().map(|p| p.file_a.len()).max().unwrap_or(0).max(6);
    let width_b = rows.iter().map(|p| p.file_b.len()).max().unwrap_or(0).max(6);
    writeln!(w, "{:<width_a$}  {:<width_b$}  SCORE", "FILE A", "FILE B")?;
    for p in &rows {
        let score = format!("{:>5.1}%", p.score * 100.0);
        if color.enabled() {
            let score = if p.score >= 0.95 {
                score.red().bold().to_string()
            } else {
                score.yellow().to_string()
            };
            writeln!(w, "{:<width_a$}  {:<width_b$}  {}", p.file_a, p.file_b, score)?;
        } else {
            writeln!(w, "{:<width_a$}  {:<width_b$}  {}", p.file_a, p.file_b, score)?;
        }
    }
    if rows.len() < pairs.len() {
        writeln!(w, "({} of {} pairs shown)", rows.len(), pairs.len())?;
    }
    Ok(())
}
