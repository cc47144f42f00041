use crate::executor::{CommandExecutor, Spawner};
use crate::interpreter::Interpreter;
use crate::llm::CompletionService;
use crate::memory::MemoryManager;
use crate::types::{Interaction, Interpretation};
use crate::vector_store::VectorStore;

/// One request end to end: interpret, execute, remember.
pub struct Assistant<S, P, V> {
    pub interpreter: Interpreter<S>,
    pub executor: CommandExecutor<P>,
    pub memory: MemoryManager<V>,
}

impl<S, P, V> Assistant<S, P, V>
where
    S: CompletionService,
    P: Spawner,
    V: VectorStore,
{
    pub fn new(interpreter: Interpreter<S>, executor: CommandExecutor<P>, memory: MemoryManager<V>) -> Self {
        Self {
            interpreter,
            executor,
            memory,
        }
    }

    /// Interprets without executing anything.
    pub fn plan(&self, text: &str) -> Interpretation {
        let known = self.memory.known_patterns(text).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read successful patterns");
            Vec::new()
        });
        self.interpreter.interpret_with_patterns(text, &known)
    }

    pub fn handle(&self, text: &str) -> Interaction {
        let interpretation = self.plan(text);
        self.run_plan(text, interpretation)
    }

    /// Executes an already accepted plan and records the outcome.
    pub fn run_plan(&self, text: &str, interpretation: Interpretation) -> Interaction {
        let results = self.executor.execute(&interpretation.executable_commands());
        let interaction = Interaction::new(text, interpretation, results);
        self.remember(&interaction);
        interaction
    }

    /// Records a plan the user declined to run.
    pub fn record_skipped(&self, text: &str, interpretation: Interpretation) -> Interaction {
        let interaction = Interaction::new(text, interpretation, Vec::new());
        self.remember(&interaction);
        interaction
    }

    fn remember(&self, interaction: &Interaction) {
        if let Err(e) = self.memory.store_interaction(interaction) {
            tracing::warn!(error = %e, "failed to store interaction");
        }
        if let Err(e) = self.memory.update_successful_patterns(interaction) {
            tracing::warn!(error = %e, "failed to update successful patterns");
        }
    }
}
