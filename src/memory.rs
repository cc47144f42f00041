use crate::config::MemoryConfig;
use crate::error::StoreError;
use crate::vector_store::{Embedder, Metadata, QueryResult, SqliteVectorStore, VectorStore};
use crate::types::{Interaction, Pattern};
use std::{fs, path::Path};
use uuid::Uuid;

pub const INTERACTIONS: &str = "interactions";
pub const PATTERNS: &str = "patterns";

const DEFAULT_SIMILAR_INTERACTIONS: usize = 5;
const DEFAULT_SUCCESSFUL_PATTERNS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub interactions: usize,
    pub patterns: usize,
}

/// Sole owner of the interaction and pattern collections.
pub struct MemoryManager<V> {
    store: V,
}

impl<E: Embedder> MemoryManager<SqliteVectorStore<E>> {
    pub fn open(config: &MemoryConfig, embedder: E) -> Result<Self, StoreError> {
        let store = SqliteVectorStore::open(&config.vector_store_path, embedder)?;
        Self::new(&config.vector_store_path, store)
    }
}

impl<V: VectorStore> MemoryManager<V> {
    /// Makes sure `store_path` exists as a directory before handing out the store.
    pub fn new(store_path: &Path, store: V) -> Result<Self, StoreError> {
        fs::create_dir_all(store_path)?;
        Ok(Self { store })
    }

    pub fn store(&self) -> &V {
        &self.store
    }

    /// Records every interaction, successful or not. Returns the new id.
    pub fn store_interaction(&self, interaction: &Interaction) -> Result<String, StoreError> {
        let interaction_id = Uuid::new_v4().to_string();
        let commands: Vec<&str> = interaction
            .interpretation
            .commands
            .iter()
            .filter(|c| !c.is_suggestion())
            .map(|c| c.command.as_str())
            .collect();

        let document = format!(
            "User: {}\nCommands: {}",
            interaction.user_input,
            commands.join("; ")
        );

        let mut metadata = Metadata::new();
        metadata.insert("interaction_id".into(), interaction_id.clone());
        metadata.insert("user_input".into(), interaction.user_input.clone());
        metadata.insert("intent".into(), interaction.interpretation.intent.clone());
        metadata.insert("method".into(), interaction.interpretation.method().to_string());
        metadata.insert("commands".into(), commands.join(" && "));
        metadata.insert("success".into(), interaction.all_succeeded().to_string());
        metadata.insert("timestamp".into(), interaction.timestamp.to_rfc3339());

        self.store.add(
            INTERACTIONS,
            vec![document],
            vec![metadata],
            vec![interaction_id.clone()],
        )?;
        tracing::debug!(id = %interaction_id, "stored interaction");
        Ok(interaction_id)
    }

    /// Learns intent -> command mappings, but only from fully successful runs.
    /// Returns how many patterns were written.
    pub fn update_successful_patterns(&self, interaction: &Interaction) -> Result<usize, StoreError> {
        if !interaction.all_succeeded() {
            return Ok(0);
        }

        let intent = &interaction.interpretation.intent;
        let mut documents = Vec::new();
        let mut metadatas = Vec::new();
        let mut ids = Vec::new();
        for command in interaction.interpretation.commands.iter().filter(|c| !c.is_suggestion()) {
            let mut metadata = Metadata::new();
            metadata.insert("command".into(), command.command.clone());
            metadata.insert("description".into(), command.description.clone());
            documents.push(intent.clone());
            metadatas.push(metadata);
            ids.push(Uuid::new_v4().to_string());
        }

        if documents.is_empty() {
            return Ok(0);
        }
        let written = documents.len();
        self.store.add(PATTERNS, documents, metadatas, ids)?;
        tracing::debug!(intent = %intent, written, "learned successful patterns");
        Ok(written)
    }

    pub fn retrieve_similar_interactions(&self, query: &str) -> Result<Vec<Metadata>, StoreError> {
        self.retrieve_similar_interactions_k(query, DEFAULT_SIMILAR_INTERACTIONS)
    }

    pub fn retrieve_similar_interactions_k(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<Metadata>, StoreError> {
        let result = self.store.query(INTERACTIONS, &[query.to_string()], k)?;
        Ok(flatten(result))
    }

    pub fn retrieve_successful_patterns(&self, intent: &str) -> Result<Vec<Metadata>, StoreError> {
        self.retrieve_successful_patterns_k(intent, DEFAULT_SUCCESSFUL_PATTERNS)
    }

    pub fn retrieve_successful_patterns_k(
        &self,
        intent: &str,
        k: usize,
    ) -> Result<Vec<Metadata>, StoreError> {
        let result = self.store.query(PATTERNS, &[intent.to_string()], k)?;
        Ok(flatten(result))
    }

    /// Successful patterns as typed values, for prompting.
    pub fn known_patterns(&self, text: &str) -> Result<Vec<Pattern>, StoreError> {
        let hits = self.retrieve_successful_patterns(text)?;
        Ok(hits
            .into_iter()
            .filter_map(|mut m| {
                Some(Pattern {
                    command: m.remove("command")?,
                    description: m.remove("description").unwrap_or_default(),
                    intent: m.remove("document").unwrap_or_default(),
                })
            })
            .collect())
    }

    pub fn recent_interactions(&self, limit: usize) -> Result<Vec<Metadata>, StoreError> {
        Ok(flatten(self.store.peek(INTERACTIONS, limit)?))
    }

    pub fn stats(&self) -> Result<MemoryStats, StoreError> {
        Ok(MemoryStats {
            interactions: self.store.count(INTERACTIONS)?,
            patterns: self.store.count(PATTERNS)?,
        })
    }
}

/// Merges the first query's hits into metadata maps carrying `id` and `document`.
fn flatten(result: QueryResult) -> Vec<Metadata> {
    let ids = result.ids.into_iter().next().unwrap_or_default();
    let documents = result.documents.into_iter().next().unwrap_or_default();
    let metadatas = result.metadatas.into_iter().next().unwrap_or_default();

    metadatas
        .into_iter()
        .enumerate()
        .map(|(i, mut metadata)| {
            if let Some(id) = ids.get(i) {
                metadata.insert("id".into(), id.clone());
            }
            if let Some(document) = documents.get(i) {
                metadata.insert("document".into(), document.clone());
            }
            metadata
        })
        .collect()
}
