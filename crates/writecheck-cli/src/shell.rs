//! Interactive line-oriented session over one controller.

use std::io::Write;
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};
use writecheck_core::{CollectionType, StagedFile, WorkflowController};

use crate::output::{self, ColorMode, ReportView};

const HELP: &str = "\
Commands:
  type <text|handwritten>   choose the collection type (clears the selection)
  select <path>...          stage local files for upload (quote paths with spaces)
  upload                    send the staged files as one batch
  files                     show the stored collection
  refresh                   re-fetch the stored collection
  delete <name>             delete a stored file
  check                     run the duplicate check
  status                    show the session state
  help                      show this text
  quit                      leave the session";

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Type(CollectionType),
    Select(Vec<PathBuf>),
    Upload,
    Files,
    Refresh,
    Delete(String),
    Check,
    Status,
    Help,
    Quit,
    Empty,
}

/// Parse one input line.
pub fn parse_line(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };

    match word.to_lowercase().as_str() {
        "" => Ok(ShellCommand::Empty),
        "type" => rest.parse().map(ShellCommand::Type),
        "select" => {
            let args = split_args(rest)?;
            if args.is_empty() {
                return Err("usage: select <path>...".into());
            }
            Ok(ShellCommand::Select(
                args.into_iter().map(PathBuf::from).collect(),
            ))
        }
        "upload" | "submit" => Ok(ShellCommand::Upload),
        "files" | "ls" => Ok(ShellCommand::Files),
        "refresh" => Ok(ShellCommand::Refresh),
        "delete" | "rm" => {
            if rest.is_empty() {
                return Err("usage: delete <name>".into());
            }
            // The rest of the line is the name, spaces included.
            Ok(ShellCommand::Delete(rest.to_string()))
        }
        "check" => Ok(ShellCommand::Check),
        "status" => Ok(ShellCommand::Status),
        "help" | "?" => Ok(ShellCommand::Help),
        "quit" | "exit" => Ok(ShellCommand::Quit),
        other => Err(format!("unknown command '{other}' (try 'help')")),
    }
}

/// Split on whitespace, keeping single- or double-quoted runs together.
fn split_args(input: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;

    for c in input.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_arg = true;
            }
            None if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            None => {
                current.push(c);
                in_arg = true;
            }
        }
    }
    if let Some(q) = quote {
        return Err(format!("unterminated {q} quote"));
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}

/// Read commands from stdin until `quit` or end of input.
pub async fn run(ctl: &WorkflowController, color: ColorMode) -> anyhow::Result<()> {
    let mut out = std::io::stdout();
    writeln!(out, "writecheck session. Type 'help' for commands.")?;
    output::print_state(&mut out, &ctl.snapshot(), color)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        write!(out, "writecheck> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };
        let command = match parse_line(&line) {
            Ok(c) => c,
            Err(e) => {
                writeln!(out, "{e}")?;
                continue;
            }
        };
        if command == ShellCommand::Quit {
            break;
        }
        execute(ctl, command, &mut out, color).await?;
    }
    Ok(())
}

/// Run one command. Workflow failures are already in the status line, so
/// only I/O errors on the terminal propagate.
async fn execute(
    ctl: &WorkflowController,
    command: ShellCommand,
    out: &mut dyn Write,
    color: ColorMode,
) -> std::io::Result<()> {
    match command {
        ShellCommand::Type(t) => ctl.set_type(t),
        ShellCommand::Select(paths) => {
            let _ = ctl.select_files(paths.iter().map(StagedFile::from_path).collect());
        }
        ShellCommand::Upload => {
            let _ = ctl.submit_upload().await;
            output::print_status(out, &ctl.snapshot(), color)?;
            return output::print_files(out, &ctl.snapshot().files, color);
        }
        ShellCommand::Files => return output::print_files(out, &ctl.snapshot().files, color),
        ShellCommand::Refresh => {
            let _ = ctl.refresh_collection().await;
            output::print_status(out, &ctl.snapshot(), color)?;
            return output::print_files(out, &ctl.snapshot().files, color);
        }
        ShellCommand::Delete(name) => {
            let _ = ctl.delete_file(&name).await;
        }
        ShellCommand::Check => {
            let _ = ctl.query_duplicates().await;
            let state = ctl.snapshot();
            output::print_status(out, &state, color)?;
            return output::print_duplicates(
                out,
                &state.duplicates,
                ReportView {
                    min_score: None,
                    collapse: true,
                },
                color,
            );
        }
        ShellCommand::Status => return output::print_state(out, &ctl.snapshot(), color),
        ShellCommand::Help => return writeln!(out, "{HELP}"),
        ShellCommand::Quit | ShellCommand::Empty => return Ok(()),
    }
    output::print_status(out, &ctl.snapshot(), color)
}
