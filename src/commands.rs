use crate::assistant::Assistant;
use crate::config::{get_config_path, save_config, Config};
use crate::executor::{CommandExecutor, ShellSpawner};
use crate::interpreter::{FallbackPolicy, Interpreter};
use crate::llm::{build_completion_service, CompletionService};
use crate::memory::MemoryManager;
use crate::ollama::OllamaClient;
use crate::safety::check_command;
use crate::types::{Command as PlanCommand, Interpretation};
use crate::ui::{
    edit_command, print_history_entry, print_plan, print_results, prompt_action, show_explanation,
    Action,
};
use crate::vector_store::{Embedder, HashEmbedder, SqliteVectorStore};
use std::{env, fs, io::Write, process::Command};

pub type AppAssistant =
    Assistant<Box<dyn CompletionService>, ShellSpawner, SqliteVectorStore<Box<dyn Embedder>>>;

fn build_embedder(config: &Config) -> Box<dyn Embedder> {
    match config.memory.embedder.as_str() {
        "ollama" => Box::new(OllamaClient::new(&config.llm)),
        _ => Box::new(HashEmbedder),
    }
}

fn open_memory(
    config: &Config,
) -> Result<MemoryManager<SqliteVectorStore<Box<dyn Embedder>>>, Box<dyn std::error::Error>> {
    Ok(MemoryManager::open(&config.memory, build_embedder(config))?)
}

pub fn build_assistant(config: &Config) -> Result<AppAssistant, Box<dyn std::error::Error>> {
    let interpreter = Interpreter::new(build_completion_service(&config.llm), FallbackPolicy::OnDegraded);
    let executor = CommandExecutor::new(&config.execution);
    let memory = open_memory(config)?;
    Ok(Assistant::new(interpreter, executor, memory))
}

pub fn cmd_query(
    query: &str,
    config: &Config,
    yes: bool,
    explain_only: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let assistant = build_assistant(config)?;

    eprint!("thinking...");
    std::io::stderr().flush().ok();
    let plan = assistant.plan(query);
    eprint!("\r           \r");
    std::io::stderr().flush().ok();

    print_plan(&plan);

    if explain_only {
        show_explanation(&plan);
        return Ok(());
    }

    if plan.executable_commands().is_empty() || yes || !config.execution.safe_mode {
        let interaction = assistant.run_plan(query, plan);
        print_results(&interaction);
        return Ok(());
    }

    loop {
        match prompt_action() {
            Some(Action::Run) => {
                let interaction = assistant.run_plan(query, plan);
                print_results(&interaction);
                break;
            }
            Some(Action::Edit) => {
                let combined = plan
                    .executable_commands()
                    .iter()
                    .map(|c| c.command.clone())
                    .collect::<Vec<_>>()
                    .join(" && ");
                if let Some(edited) = edit_command(&combined) {
                    let edited = edited.trim();
                    if edited.is_empty() {
                        continue;
                    }
                    if let Some(reason) = check_command(edited) {
                        println!("refused: {}", reason);
                        continue;
                    }
                    println!("edited: {}", edited);
                    let edited_plan = Interpretation {
                        intent: plan.intent.clone(),
                        commands: vec![PlanCommand::new(edited, "Edited by user", "edited")],
                        confidence: plan.confidence,
                        outcome: plan.outcome.clone(),
                    };
                    let interaction = assistant.run_plan(query, edited_plan);
                    print_results(&interaction);
                    break;
                }
            }
            Some(Action::Explain) => show_explanation(&plan),
            Some(Action::Quit) | None => {
                assistant.record_skipped(query, plan);
                println!("cancelled.");
                break;
            }
        }
    }

    Ok(())
}

pub fn cmd_history(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let memory = open_memory(config)?;
    let entries = memory.recent_interactions(config.memory.history_size)?;

    if entries.is_empty() {
        println!("no history yet.");
        return Ok(());
    }

    println!("recent requests:");
    println!();
    for entry in &entries {
        print_history_entry(entry);
    }
    Ok(())
}

pub fn cmd_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let memory = open_memory(config)?;
    let stats = memory.stats()?;

    println!("memory stats:");
    println!("  interactions: {}", stats.interactions);
    println!("  patterns:     {}", stats.patterns);
    println!("  path:         {}", config.memory.vector_store_path.display());
    Ok(())
}

pub fn cmd_doctor(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("diagnostics:");
    println!();

    let service = build_completion_service(&config.llm);
    print!("  completion backend {} ... ", service.name());
    std::io::stdout().flush().ok();
    if service.is_available() {
        println!("ok");
    } else {
        println!("failed");
        println!("    endpoint: {}", config.llm.resolved_endpoint());
        println!("    requests will fall back to local rules");
    }

    print!("  memory ({}) ... ", config.memory.vector_store_path.display());
    std::io::stdout().flush().ok();
    match open_memory(config).and_then(|m| Ok(m.stats()?)) {
        Ok(stats) => println!(
            "ok ({} interactions, {} patterns)",
            stats.interactions, stats.patterns
        ),
        Err(e) => {
            println!("failed");
            println!("    error: {}", e);
        }
    }

    print!("  config ... ");
    std::io::stdout().flush().ok();
    if get_config_path().exists() {
        println!("ok");
    } else {
        println!("using defaults");
    }

    println!(
        "  safety: timeout {}s, {} output lines, safe mode {}",
        config.execution.command_timeout,
        config.execution.max_output_lines,
        if config.execution.safe_mode { "on" } else { "off" }
    );
    println!();
    Ok(())
}

pub fn cmd_config() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = get_config_path();

    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        save_config(&Config::default())?;
    }

    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    Command::new(&editor).arg(&config_path).status()?;

    Ok(())
}
