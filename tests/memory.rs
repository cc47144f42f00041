use aixos::config::MemoryConfig;
use aixos::error::StoreError;
use aixos::memory::{MemoryManager, INTERACTIONS, PATTERNS};
use aixos::types::{
    Command, ExecutionResult, Interaction, Interpretation, InterpretationOutcome,
};
use aixos::vector_store::{HashEmbedder, Metadata, QueryResult, VectorStore};
use std::cell::RefCell;

#[derive(Debug, Clone)]
struct AddCall {
    collection: String,
    documents: Vec<String>,
    metadatas: Vec<Metadata>,
    ids: Vec<String>,
}

/// Records writes and answers every query with a fixed result.
#[derive(Default)]
struct RecordingStore {
    adds: RefCell<Vec<AddCall>>,
    queries: RefCell<Vec<(String, Vec<String>, usize)>>,
    reply: QueryResult,
}

impl RecordingStore {
    fn adds_to(&self, collection: &str) -> Vec<AddCall> {
        self.adds
            .borrow()
            .iter()
            .filter(|c| c.collection == collection)
            .cloned()
            .collect()
    }
}

impl VectorStore for RecordingStore {
    fn add(
        &self,
        collection: &str,
        documents: Vec<String>,
        metadatas: Vec<Metadata>,
        ids: Vec<String>,
    ) -> Result<(), StoreError> {
        self.adds.borrow_mut().push(AddCall {
            collection: collection.to_string(),
            documents,
            metadatas,
            ids,
        });
        Ok(())
    }

    fn query(&self, collection: &str, query_texts: &[String], n_results: usize) -> Result<QueryResult, StoreError> {
        self.queries
            .borrow_mut()
            .push((collection.to_string(), query_texts.to_vec(), n_results));
        Ok(self.reply.clone())
    }

    fn count(&self, collection: &str) -> Result<usize, StoreError> {
        Ok(self.adds_to(collection).len())
    }

    fn peek(&self, _collection: &str, _limit: usize) -> Result<QueryResult, StoreError> {
        Ok(QueryResult::default())
    }
}

fn interaction(input: &str, intent: &str, commands: &[(&str, &str)], results: Vec<ExecutionResult>) -> Interaction {
    Interaction::new(
        input,
        Interpretation {
            intent: intent.to_string(),
            commands: commands
                .iter()
                .map(|(c, d)| Command::new(*c, *d, "command"))
                .collect(),
            confidence: 0.9,
            outcome: InterpretationOutcome::AiInterpretation,
        },
        results,
    )
}

fn single_reply(document: &str, pairs: &[(&str, &str)]) -> QueryResult {
    let metadata: Metadata = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    QueryResult {
        ids: vec![vec!["id1".to_string()]],
        documents: vec![vec![document.to_string()]],
        metadatas: vec![vec![metadata]],
    }
}

fn manager(store: RecordingStore) -> (tempfile::TempDir, MemoryManager<RecordingStore>) {
    let dir = tempfile::tempdir().unwrap();
    let manager = MemoryManager::new(&dir.path().join("test_db"), store).unwrap();
    (dir, manager)
}

#[test]
fn creates_the_store_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a").join("test_db");
    MemoryManager::new(&path, RecordingStore::default()).unwrap();
    assert!(path.is_dir());
}

#[test]
fn store_interaction_writes_composite_document() {
    let (_dir, memory) = manager(RecordingStore::default());
    let i = interaction(
        "list files",
        "List files",
        &[("ls -la", "list")],
        vec![ExecutionResult::success("ls -la", String::new())],
    );
    let id = memory.store_interaction(&i).unwrap();

    let adds = memory.store().adds_to(INTERACTIONS);
    assert_eq!(adds.len(), 1);
    assert!(adds[0].documents[0].contains("list files"));
    assert!(adds[0].documents[0].contains("ls -la"));
    assert_eq!(adds[0].metadatas[0]["interaction_id"], id);
    assert_eq!(adds[0].metadatas[0]["user_input"], "list files");
    assert_eq!(adds[0].ids, vec![id]);
}

#[test]
fn store_interaction_records_failures_too() {
    let (_dir, memory) = manager(RecordingStore::default());
    let i = interaction(
        "remove stuff",
        "Remove",
        &[("rm -rf /", "")],
        vec![ExecutionResult::blocked("rm -rf /", "recursive deletion of the root filesystem")],
    );
    memory.store_interaction(&i).unwrap();
    let adds = memory.store().adds_to(INTERACTIONS);
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].metadatas[0]["success"], "false");
}

#[test]
fn successful_interaction_becomes_pattern() {
    let (_dir, memory) = manager(RecordingStore::default());
    let i = interaction(
        "show directory contents",
        "list files",
        &[("ls -la", "list files")],
        vec![ExecutionResult::success("ls -la", String::new())],
    );
    assert_eq!(memory.update_successful_patterns(&i).unwrap(), 1);

    let adds = memory.store().adds_to(PATTERNS);
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].documents[0], "list files");
    assert_eq!(adds[0].metadatas[0]["command"], "ls -la");
    assert_eq!(adds[0].metadatas[0]["description"], "list files");
}

#[test]
fn any_failure_means_no_pattern_write() {
    let (_dir, memory) = manager(RecordingStore::default());
    let i = interaction(
        "do two things",
        "two things",
        &[("true", ""), ("false", "")],
        vec![
            ExecutionResult::success("true", String::new()),
            ExecutionResult::failed("false", Some(1), String::new(), "exit 1".into()),
        ],
    );
    assert_eq!(memory.update_successful_patterns(&i).unwrap(), 0);
    assert!(memory.store().adds.borrow().is_empty());
}

#[test]
fn retrieve_similar_interactions_queries_five() {
    let store = RecordingStore {
        reply: single_reply("doc1", &[("user_input", "show files")]),
        ..RecordingStore::default()
    };
    let (_dir, memory) = manager(store);

    let results = memory.retrieve_similar_interactions("list all files").unwrap();

    let queries = memory.store().queries.borrow();
    assert_eq!(
        queries[0],
        (INTERACTIONS.to_string(), vec!["list all files".to_string()], 5)
    );
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["user_input"], "show files");
    assert_eq!(results[0]["document"], "doc1");
}

#[test]
fn retrieve_successful_patterns_queries_three() {
    let store = RecordingStore {
        reply: single_reply("list files", &[("command", "ls -la"), ("description", "list files")]),
        ..RecordingStore::default()
    };
    let (_dir, memory) = manager(store);

    let results = memory.retrieve_successful_patterns("list files").unwrap();

    let queries = memory.store().queries.borrow();
    assert_eq!(queries[0], (PATTERNS.to_string(), vec!["list files".to_string()], 3));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["command"], "ls -la");
    drop(queries);

    let known = memory.known_patterns("list files").unwrap();
    assert_eq!(known[0].intent, "list files");
    assert_eq!(known[0].command, "ls -la");
}

#[test]
fn sqlite_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = MemoryConfig {
        vector_store_path: dir.path().join("test_db"),
        ..MemoryConfig::default()
    };
    let memory = MemoryManager::open(&config, HashEmbedder).unwrap();
    assert!(config.vector_store_path.is_dir());

    let i = interaction(
        "create a test file",
        "create file",
        &[("touch test.txt", "create file")],
        vec![ExecutionResult::success("touch test.txt", String::new())],
    );
    memory.store_interaction(&i).unwrap();
    memory.update_successful_patterns(&i).unwrap();

    let similar = memory.retrieve_similar_interactions("make a file").unwrap();
    assert!(!similar.is_empty());
    assert!(similar[0]["document"].contains("create a test file"));

    let patterns = memory.retrieve_successful_patterns("create file").unwrap();
    assert!(!patterns.is_empty());
    assert_eq!(patterns[0]["command"], "touch test.txt");

    let stats = memory.stats().unwrap();
    assert_eq!((stats.interactions, stats.patterns), (1, 1));

    let recent = memory.recent_interactions(10).unwrap();
    assert_eq!(recent[0]["user_input"], "create a test file");
}

#[test]
fn sqlite_prefers_the_closer_interaction() {
    let dir = tempfile::tempdir().unwrap();
    let config = MemoryConfig {
        vector_store_path: dir.path().join("db"),
        ..MemoryConfig::default()
    };
    let memory = MemoryManager::open(&config, HashEmbedder).unwrap();
    for (input, cmd) in [("check disk space usage", "df -h"), ("show running processes", "ps aux")] {
        let i = interaction(input, input, &[(cmd, "")], vec![ExecutionResult::success(cmd, String::new())]);
        memory.store_interaction(&i).unwrap();
    }
    let similar = memory.retrieve_similar_interactions("show running processes please").unwrap();
    assert_eq!(similar[0]["user_input"], "show running processes");
}
