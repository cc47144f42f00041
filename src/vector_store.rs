use crate::error::StoreError;
use rusqlite::{params, Connection};
use std::{collections::BTreeMap, fs, path::Path};

pub type Metadata = BTreeMap<String, String>;

const DB_FILE: &str = "store.db";
const HASH_DIMENSIONS: usize = 256;

/// Nearest-neighbour results, one inner list per query text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub ids: Vec<Vec<String>>,
    pub documents: Vec<Vec<String>>,
    pub metadatas: Vec<Vec<Metadata>>,
}

/// A similarity-searchable store of documents grouped into named collections.
pub trait VectorStore {
    fn add(
        &self,
        collection: &str,
        documents: Vec<String>,
        metadatas: Vec<Metadata>,
        ids: Vec<String>,
    ) -> Result<(), StoreError>;

    fn query(
        &self,
        collection: &str,
        query_texts: &[String],
        n_results: usize,
    ) -> Result<QueryResult, StoreError>;

    fn count(&self, collection: &str) -> Result<usize, StoreError>;

    /// The most recently added records, newest first.
    fn peek(&self, collection: &str, limit: usize) -> Result<QueryResult, StoreError>;
}

pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError>;
}

impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        (**self).embed(text)
    }
}

/// Offline embedder: hashed bag of lowercase word tokens, L2-normalised.
/// Close enough for "same words, similar request" recall without a model.
/// Buckets come from BLAKE3 so stored vectors stay comparable across builds.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashEmbedder;

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        let mut vector = vec![0.0f32; HASH_DIMENSIONS];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
        {
            vector[token_bucket(token)] += 1.0;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(vector)
    }
}

fn token_bucket(token: &str) -> usize {
    let digest = blake3::hash(token.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_le_bytes(head) % HASH_DIMENSIONS as u64) as usize
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks(4)
        .map(|chunk| {
            let arr: [u8; 4] = chunk.try_into().unwrap_or([0; 4]);
            f32::from_le_bytes(arr)
        })
        .collect()
}

struct Row {
    id: String,
    document: String,
    metadata: Metadata,
    embedding: Vec<f32>,
}

/// SQLite-backed store: embeddings kept as little-endian f32 blobs, queries
/// ranked by brute-force cosine similarity.
pub struct SqliteVectorStore<E> {
    conn: Connection,
    embedder: E,
}

impl<E: Embedder> SqliteVectorStore<E> {
    pub fn open(dir: &Path, embedder: E) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        let conn = Connection::open(dir.join(DB_FILE))?;
        Self::with_connection(conn, embedder)
    }

    pub fn in_memory(embedder: E) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, embedder)
    }

    fn with_connection(conn: Connection, embedder: E) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS embeddings (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL,
                collection TEXT NOT NULL,
                document TEXT NOT NULL,
                metadata TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE(collection, id)
            )",
            [],
        )?;
        Ok(Self { conn, embedder })
    }

    fn load_collection(&self, collection: &str) -> Result<Vec<Row>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, document, metadata, embedding FROM embeddings
             WHERE collection = ?1 ORDER BY seq DESC",
        )?;
        let raw = stmt
            .query_map(params![collection], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(id, document, metadata_json, embedding_bytes)| -> Result<Row, StoreError> {
                Ok(Row {
                    id,
                    document,
                    metadata: serde_json::from_str(&metadata_json)?,
                    embedding: from_bytes(&embedding_bytes),
                })
            })
            .collect()
    }
}

impl<E: Embedder> VectorStore for SqliteVectorStore<E> {
    fn add(
        &self,
        collection: &str,
        documents: Vec<String>,
        metadatas: Vec<Metadata>,
        ids: Vec<String>,
    ) -> Result<(), StoreError> {
        if documents.len() != metadatas.len() || documents.len() != ids.len() {
            return Err(StoreError::Mismatched {
                documents: documents.len(),
                metadatas: metadatas.len(),
                ids: ids.len(),
            });
        }
        let now = chrono::Utc::now().timestamp();
        let tx = self.conn.unchecked_transaction()?;
        for ((document, metadata), id) in documents.iter().zip(&metadatas).zip(&ids) {
            let embedding = self.embedder.embed(document)?;
            tx.execute(
                "INSERT OR REPLACE INTO embeddings (id, collection, document, metadata, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    collection,
                    document,
                    serde_json::to_string(metadata)?,
                    to_bytes(&embedding),
                    now
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn query(
        &self,
        collection: &str,
        query_texts: &[String],
        n_results: usize,
    ) -> Result<QueryResult, StoreError> {
        let rows = self.load_collection(collection)?;
        let mut result = QueryResult::default();

        for text in query_texts {
            let query_embedding = self.embedder.embed(text)?;
            // Rows come newest first and the sort is stable, so ties favour recency.
            let mut scored: Vec<(f32, &Row)> = rows
                .iter()
                .map(|row| (cosine_similarity(&query_embedding, &row.embedding), row))
                .collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

            let top: Vec<&Row> = scored.into_iter().take(n_results).map(|(_, r)| r).collect();
            result.ids.push(top.iter().map(|r| r.id.clone()).collect());
            result.documents.push(top.iter().map(|r| r.document.clone()).collect());
            result.metadatas.push(top.iter().map(|r| r.metadata.clone()).collect());
        }

        Ok(result)
    }

    fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM embeddings WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    fn peek(&self, collection: &str, limit: usize) -> Result<QueryResult, StoreError> {
        let rows: Vec<Row> = self.load_collection(collection)?.into_iter().take(limit).collect();
        Ok(QueryResult {
            ids: vec![rows.iter().map(|r| r.id.clone()).collect()],
            documents: vec![rows.iter().map(|r| r.document.clone()).collect()],
            metadatas: vec![rows.into_iter().map(|r| r.metadata).collect()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(key: &str, value: &str) -> Metadata {
        let mut m = Metadata::new();
        m.insert(key.to_string(), value.to_string());
        m
    }

    #[test]
    fn hash_embedder_is_normalised_and_deterministic() {
        let a = HashEmbedder.embed("list all files").unwrap();
        let b = HashEmbedder.embed("list all files").unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(HashEmbedder.embed("").unwrap().iter().all(|x| *x == 0.0));
    }

    #[test]
    fn hash_embedder_buckets_are_pinned() {
        let hello = HashEmbedder.embed("hello").unwrap();
        assert_eq!(hello.len(), 256);
        assert_eq!(hello[234], 1.0);
        assert_eq!(hello.iter().filter(|x| **x != 0.0).count(), 1);

        let list_files = HashEmbedder.embed("List files").unwrap();
        let expected = 1.0 / 2f32.sqrt();
        assert!((list_files[15] - expected).abs() < 1e-6);
        assert!((list_files[220] - expected).abs() < 1e-6);
    }

    #[test]
    fn corrupt_metadata_is_an_error() {
        let store = SqliteVectorStore::in_memory(HashEmbedder).unwrap();
        store
            .add("a", vec!["fine".into()], vec![meta("k", "v")], vec!["1".into()])
            .unwrap();
        store
            .conn
            .execute(
                "INSERT INTO embeddings (id, collection, document, metadata, embedding, created_at)
                 VALUES ('2', 'a', 'broken', '{not json', x'', 0)",
                [],
            )
            .unwrap();

        assert!(matches!(store.peek("a", 10), Err(StoreError::Serde(_))));
        assert!(matches!(
            store.query("a", &["fine".to_string()], 5),
            Err(StoreError::Serde(_))
        ));
    }

    struct FailsOn(&'static str);

    impl Embedder for FailsOn {
        fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError> {
            if text == self.0 {
                Err(StoreError::Embedding("model unavailable".into()))
            } else {
                HashEmbedder.embed(text)
            }
        }
    }

    #[test]
    fn failed_batch_writes_nothing() {
        let store = SqliteVectorStore::in_memory(FailsOn("second")).unwrap();
        let err = store
            .add(
                "a",
                vec!["first".into(), "second".into(), "third".into()],
                vec![Metadata::new(), Metadata::new(), Metadata::new()],
                vec!["1".into(), "2".into(), "3".into()],
            )
            .unwrap_err();

        assert!(matches!(err, StoreError::Embedding(_)));
        assert_eq!(store.count("a").unwrap(), 0);
    }

    #[test]
    fn query_ranks_by_similarity() {
        let store = SqliteVectorStore::in_memory(HashEmbedder).unwrap();
        store
            .add(
                "docs",
                vec!["list files in directory".into(), "install git package".into()],
                vec![meta("k", "list"), meta("k", "install")],
                vec!["1".into(), "2".into()],
            )
            .unwrap();

        let result = store.query("docs", &["install git".to_string()], 1).unwrap();
        assert_eq!(result.ids, vec![vec!["2".to_string()]]);
        assert_eq!(result.metadatas[0][0]["k"], "install");
        assert_eq!(store.count("docs").unwrap(), 2);
        assert_eq!(store.count("other").unwrap(), 0);
    }

    #[test]
    fn collections_are_independent() {
        let store = SqliteVectorStore::in_memory(HashEmbedder).unwrap();
        store
            .add("a", vec!["same text".into()], vec![Metadata::new()], vec!["x".into()])
            .unwrap();
        let result = store.query("b", &["same text".to_string()], 5).unwrap();
        assert_eq!(result.ids, vec![Vec::<String>::new()]);
    }

    #[test]
    fn mismatched_write_is_rejected() {
        let store = SqliteVectorStore::in_memory(HashEmbedder).unwrap();
        let err = store
            .add("a", vec!["doc".into()], vec![], vec!["x".into()])
            .unwrap_err();
        assert!(matches!(err, StoreError::Mismatched { .. }));
    }

    #[test]
    fn peek_returns_newest_first() {
        let store = SqliteVectorStore::in_memory(HashEmbedder).unwrap();
        for i in 0..3 {
            store
                .add("a", vec![format!("doc {}", i)], vec![Metadata::new()], vec![i.to_string()])
                .unwrap();
        }
        let recent = store.peek("a", 2).unwrap();
        assert_eq!(recent.ids[0], vec!["2".to_string(), "1".to_string()]);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store");
        {
            let store = SqliteVectorStore::open(&path, HashEmbedder).unwrap();
            store
                .add("a", vec!["kept".into()], vec![Metadata::new()], vec!["1".into()])
                .unwrap();
        }
        let store = SqliteVectorStore::open(&path, HashEmbedder).unwrap();
        assert_eq!(store.count("a").unwrap(), 1);
    }
}
