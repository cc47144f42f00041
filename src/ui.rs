use crate::types::{ExecutionStatus, Interaction, Interpretation};
use crate::vector_store::Metadata;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    terminal,
};
use std::{env, fs, io::Write, process::Command};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Run,
    Edit,
    Explain,
    Quit,
}

pub fn print_plan(plan: &Interpretation) {
    println!();
    println!("{} [{}, confidence {:.2}]", plan.intent, plan.method(), plan.confidence);

    let commands = plan.executable_commands();
    for (i, cmd) in commands.iter().enumerate() {
        if commands.len() > 1 {
            println!("  {}. {}", i + 1, cmd.command);
        } else {
            println!("  {}", cmd.command);
        }
    }

    for suggestion in plan.commands.iter().filter(|c| c.is_suggestion()) {
        println!("  hint: {}", suggestion.description);
    }

    for warning in plan.warnings() {
        println!("  warning: {}", warning);
    }
}

pub fn show_explanation(plan: &Interpretation) {
    println!();
    println!("explanation: {}", plan.intent);
    println!();
    for cmd in plan.executable_commands() {
        println!("  {}", cmd.command);
        if !cmd.description.is_empty() {
            println!("      {}", cmd.description);
        }
    }
    println!();
}

pub fn print_results(interaction: &Interaction) {
    for result in &interaction.execution_results {
        match result.status {
            ExecutionStatus::Success => {
                if !result.output.is_empty() {
                    println!("{}", result.output);
                }
            }
            _ => {
                if !result.output.is_empty() {
                    println!("{}", result.output);
                }
                eprintln!(
                    "aixos: [{}] {}: {}",
                    result.status,
                    result.command,
                    result.error.as_deref().unwrap_or("")
                );
            }
        }
    }
}

pub fn print_history_entry(entry: &Metadata) {
    let status = match entry.get("success").map(String::as_str) {
        Some("true") => "+",
        _ if entry.get("commands").map_or(true, |c| c.is_empty()) => "-",
        _ => "x",
    };
    println!(
        "{} {}  ({})",
        status,
        entry.get("user_input").map(String::as_str).unwrap_or(""),
        entry.get("timestamp").map(String::as_str).unwrap_or("")
    );
    if let Some(commands) = entry.get("commands").filter(|c| !c.is_empty()) {
        println!("    {}", commands);
    }
}

pub fn prompt_action() -> Option<Action> {
    eprint!("[enter]run [e]dit [?]explain [q]uit ");
    std::io::stderr().flush().ok();
    terminal::enable_raw_mode().ok()?;
    let result = loop {
        match event::poll(std::time::Duration::from_millis(100)) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(_) => break None,
        }
        if let Ok(Event::Key(k)) = event::read() {
            match k.code {
                KeyCode::Enter | KeyCode::Char('y') => break Some(Action::Run),
                KeyCode::Char('e') => break Some(Action::Edit),
                KeyCode::Char('?') => break Some(Action::Explain),
                KeyCode::Char('q') | KeyCode::Char('n') | KeyCode::Esc => break Some(Action::Quit),
                KeyCode::Char('c') if k.modifiers.contains(KeyModifiers::CONTROL) => {
                    break Some(Action::Quit)
                }
                _ => {}
            }
        }
    };
    terminal::disable_raw_mode().ok();
    eprintln!();
    result
}

pub fn edit_command(cmd: &str) -> Option<String> {
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    edit_with(&editor, cmd)
}

/// Opens `cmd` in `editor` through a fresh private temp file; the file is
/// removed when this returns.
fn edit_with(editor: &str, cmd: &str) -> Option<String> {
    let mut file = tempfile::Builder::new()
        .prefix("aixos-edit-")
        .suffix(".sh")
        .tempfile()
        .ok()?;
    file.write_all(cmd.as_bytes()).ok()?;
    file.flush().ok()?;
    let status = Command::new(editor).arg(file.path()).status().ok()?;
    if !status.success() {
        return None;
    }
    fs::read_to_string(file.path()).ok()
}
