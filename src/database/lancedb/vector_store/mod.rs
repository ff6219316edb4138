
use super::{ChunkRecord, RetrievedChunk, SearchFilters, sql_literal};
use crate::config::Config;
use crate::document::DocumentMetadata;
use crate::{RagError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use futures::TryStreamExt;
use lancedb::index::Index;
use lancedb::index::vector::IvfPqIndexBuilder;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType, Table};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const TABLE_NAME: &str = "chunks";
const MANIFEST_FILE: &str = "manifest.json";
const DISTANCE_METRIC: &str = "cosine";

/// Extra candidates fetched beyond k so ties at the cut-off resolve by chunk id
///
/// When the fetched window still ends inside a tie it is doubled and fetched
/// again.
const TIE_MARGIN: usize = 8;

/// Approximate candidates re-scored against the stored vectors per result
const REFINE_FACTOR: u32 = 10;

/// IVF-PQ training needs at least this many rows
const MIN_ROWS_FOR_INDEX: usize = 256;

/// Vector database store using LanceDB for similarity search
///
/// Holds one table of chunk rows keyed by `chunk_id`. All methods take `&self`
/// so a store can be shared between concurrent ingestion tasks.
pub struct VectorStore {
    connection: Connection,
    db_path: PathBuf,
    table_name: String,
    dimension: usize,
    embedding_model: String,
    writable: bool,
}

/// What the stored vectors were produced with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoreManifest {
    embedding_model: String,
    dimension: usize,
    distance: String,
}

impl VectorStore {
    /// Open the store described by the configuration for ingestion
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        Self::open(
            &config.vector_database_path(),
            config.embedding.embedding_dimension as usize,
            &config.embedding.model,
        )
        .await
    }

    /// Open the store described by the configuration for searching only
    #[inline]
    pub async fn open_for_search(config: &Config) -> Result<Self> {
        Self::open_read_only(
            &config.vector_database_path(),
            config.embedding.embedding_dimension as usize,
            &config.embedding.model,
        )
        .await
    }

    /// Open an existing store without changing anything on disk
    ///
    /// A table built with another model or dimension is an error, since only
    /// ingestion may rebuild it. A missing table reads as empty. Write
    /// operations on the returned store fail.
    #[inline]
    pub async fn open_read_only(
        db_path: &Path,
        dimension: usize,
        embedding_model: &str,
    ) -> Result<Self> {
        let store = Self::connect(db_path, dimension, embedding_model, false).await?;
        if store.table_exists().await? {
            store.check_compatible().await?;
        }

        debug!("Vector store opened read-only at {:?}", db_path);
        Ok(store)
    }

    /// Open or create the chunk table at `db_path`
    ///
    /// Vectors written by a different model or with a different dimension are
    /// unusable for search, so in that case the table is dropped and recreated
    /// empty.
    #[inline]
    pub async fn open(db_path: &Path, dimension: usize, embedding_model: &str) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", db_path);
        std::fs::create_dir_all(db_path).map_err(|e| {
            RagError::Store(format!("Failed to create vector database directory: {}", e))
        })?;

        let store = Self::connect(db_path, dimension, embedding_model, true).await?;
        store.initialize_table().await?;

        info!(
            "Vector store initialized with {} dimensions for model {}",
            dimension, embedding_model
        );
        Ok(store)
    }

    async fn connect(
        db_path: &Path,
        dimension: usize,
        embedding_model: &str,
        writable: bool,
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::Store(
                "Vector dimension must be greater than zero".to_string(),
            ));
        }

        let uri = db_path.to_string_lossy();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            db_path: db_path.to_path_buf(),
            table_name: TABLE_NAME.to_string(),
            dimension,
            embedding_model: embedding_model.to_string(),
            writable,
        })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    async fn initialize_table(&self) -> Result<()> {
        if self.table_exists().await? {
            match self.check_compatible().await {
                Ok(()) => {
                    debug!("Chunk table already exists with matching vectors");
                    if self.read_manifest().as_ref() != Some(&self.expected_manifest()) {
                        self.write_manifest()?;
                    }
                    return Ok(());
                }
                Err(e) => {
                    warn!("{}; dropping the index", e);
                    self.drop_table_if_exists().await?;
                }
            }
        }

        self.connection
            .create_empty_table(&self.table_name, self.create_schema())
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to create table: {}", e)))?;

        info!(
            "Chunk table created with {} dimensions",
            self.dimension
        );
        self.write_manifest()
    }

    async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to open table: {}", e)))
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| RagError::Store(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                RagError::Store("Could not find vector column or determine dimension".to_string())
            })
    }

    /// Error unless the stored vectors came from the configured model and dimension
    async fn check_compatible(&self) -> Result<()> {
        let existing_dimension = self.detect_existing_vector_dimension().await?;
        // Without a manifest only the dimension can be checked
        let built_with = self.read_manifest().map(|m| m.embedding_model);
        let model_matches = built_with
            .as_ref()
            .is_none_or(|model| *model == self.embedding_model);

        if existing_dimension == self.dimension && model_matches {
            return Ok(());
        }

        Err(RagError::Store(format!(
            "index was built with model {} / {} dims but {} / {} dims is configured; re-ingest required",
            built_with.as_deref().unwrap_or("unknown"),
            existing_dimension,
            self.embedding_model,
            self.dimension
        )))
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(RagError::Store(
                "Vector store was opened read-only".to_string(),
            ))
        }
    }

    /// The chunk table, or `None` when a read-only store has none yet
    async fn readable_table(&self) -> Result<Option<Table>> {
        if !self.writable && !self.table_exists().await? {
            return Ok(None);
        }
        self.open_table().await.map(Some)
    }

    fn manifest_path(&self) -> PathBuf {
        self.db_path.join(MANIFEST_FILE)
    }

    fn read_manifest(&self) -> Option<StoreManifest> {
        let content = std::fs::read_to_string(self.manifest_path()).ok()?;
        match serde_json::from_str(&content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!("Ignoring unreadable vector store manifest: {}", e);
                None
            }
        }
    }

    fn expected_manifest(&self) -> StoreManifest {
        StoreManifest {
            embedding_model: self.embedding_model.clone(),
            dimension: self.dimension,
            distance: DISTANCE_METRIC.to_string(),
        }
    }

    fn write_manifest(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.expected_manifest())
            .map_err(|e| RagError::Store(format!("Failed to serialize manifest: {}", e)))?;
        std::fs::write(self.manifest_path(), content)?;
        Ok(())
    }

    fn create_schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("chunk_id", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("date", DataType::Utf8, true),
            Field::new("category", DataType::Utf8, true),
            Field::new("club", DataType::Utf8, true),
            Field::new("venue", DataType::Utf8, true),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("start_offset", DataType::UInt32, false),
            Field::new("end_offset", DataType::UInt32, false),
            Field::new("token_count", DataType::UInt32, false),
            Field::new("embedding_model", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                false,
            ),
        ]))
    }

    /// Insert or replace a single chunk
    #[inline]
    pub async fn upsert(&self, record: ChunkRecord) -> Result<()> {
        self.upsert_batch(vec![record]).await
    }

    /// Insert or replace chunks keyed on `chunk_id`
    ///
    /// The whole batch is committed as one merge, so readers see either none
    /// or all of it.
    #[inline]
    pub async fn upsert_batch(&self, records: Vec<ChunkRecord>) -> Result<()> {
        self.ensure_writable()?;
        if records.is_empty() {
            debug!("No chunks to store");
            return Ok(());
        }

        let record_batch = self.create_record_batch(&records)?;
        let table = self.open_table().await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let mut merge = table.merge_insert(&["chunk_id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| RagError::Store(format!("Failed to upsert chunks: {}", e)))?;

        debug!("Upserted {} chunks", records.len());
        Ok(())
    }

    fn create_record_batch(&self, records: &[ChunkRecord]) -> Result<RecordBatch> {
        let len = records.len();

        if let Some(bad) = records.iter().find(|r| r.vector.len() != self.dimension) {
            return Err(RagError::Store(format!(
                "Chunk {} has a {}-dimensional vector but the store holds {} dimensions",
                bad.chunk.id,
                bad.vector.len(),
                self.dimension
            )));
        }

        let created_at = chrono::Utc::now().to_rfc3339();
        let dates: Vec<Option<String>> = records
            .iter()
            .map(|r| r.metadata.date.map(|d| d.format("%Y-%m-%d").to_string()))
            .collect();

        let mut chunk_ids = Vec::with_capacity(len);
        let mut document_ids = Vec::with_capacity(len);
        let mut titles = Vec::with_capacity(len);
        let mut texts = Vec::with_capacity(len);
        let mut categories = Vec::with_capacity(len);
        let mut clubs = Vec::with_capacity(len);
        let mut venues = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut starts = Vec::with_capacity(len);
        let mut ends = Vec::with_capacity(len);
        let mut token_counts = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * self.dimension);

        for record in records {
            chunk_ids.push(record.chunk.id.as_str());
            document_ids.push(record.chunk.document_id.as_str());
            titles.push(record.title.as_str());
            texts.push(record.chunk.text.as_str());
            categories.push(record.metadata.category.as_deref());
            clubs.push(record.metadata.club.as_deref());
            venues.push(record.metadata.venue.as_deref());
            chunk_indices.push(to_u32(record.chunk.index, "chunk index")?);
            starts.push(to_u32(record.chunk.start, "start offset")?);
            ends.push(to_u32(record.chunk.end, "end offset")?);
            token_counts.push(to_u32(record.chunk.token_count, "token count")?);
            flat_values.extend_from_slice(&record.vector);
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::try_new(
            field,
            self.dimension as i32,
            Arc::new(values_array),
            None,
        )
        .map_err(|e| RagError::Store(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(chunk_ids)),
            Arc::new(StringArray::from(document_ids)),
            Arc::new(StringArray::from(titles)),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(
                dates.iter().map(Option::as_deref).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(categories)),
            Arc::new(StringArray::from(clubs)),
            Arc::new(StringArray::from(venues)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(UInt32Array::from(starts)),
            Arc::new(UInt32Array::from(ends)),
            Arc::new(UInt32Array::from(token_counts)),
            Arc::new(StringArray::from(vec![self.embedding_model.as_str(); len])),
            Arc::new(StringArray::from(vec![created_at.as_str(); len])),
            Arc::new(vector_array),
        ];

        RecordBatch::try_new(self.create_schema(), arrays)
            .map_err(|e| RagError::Store(format!("Failed to create record batch: {}", e)))
    }

    /// Remove every chunk of a document
    #[inline]
    pub async fn delete_by_document(&self, document_id: &str) -> Result<()> {
        self.ensure_writable()?;
        debug!("Deleting chunks for document: {}", document_id);

        let predicate = format!("document_id = {}", sql_literal(document_id));
        self.open_table()
            .await?
            .delete(&predicate)
            .await
            .map_err(|e| RagError::Store(format!("Failed to delete document chunks: {}", e)))?;

        Ok(())
    }

    /// Remove chunks of a document whose index is `first_stale` or higher
    ///
    /// Used after re-ingesting a document that now has fewer chunks.
    #[inline]
    pub async fn delete_stale_chunks(&self, document_id: &str, first_stale: usize) -> Result<()> {
        self.ensure_writable()?;
        let predicate = format!(
            "document_id = {} AND chunk_index >= {}",
            sql_literal(document_id),
            first_stale
        );
        debug!("Deleting stale chunks: {}", predicate);

        self.open_table()
            .await?
            .delete(&predicate)
            .await
            .map_err(|e| RagError::Store(format!("Failed to delete stale chunks: {}", e)))?;

        Ok(())
    }

    /// Nearest chunks to `query_vector` by cosine similarity
    ///
    /// Results are ordered by score descending with ties broken by chunk id,
    /// and hold at most `k` distinct chunks. Scores are exact even when the
    /// approximate index picks the candidates.
    #[inline]
    pub async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<RetrievedChunk>> {
        if k == 0 || filters.excludes_everything() {
            return Ok(Vec::new());
        }

        if query_vector.len() != self.dimension {
            return Err(RagError::Store(format!(
                "Query vector has {} dimensions but the store holds {}",
                query_vector.len(),
                self.dimension
            )));
        }

        let Some(table) = self.readable_table().await? else {
            debug!("Search before any table was created");
            return Ok(Vec::new());
        };
        let row_count = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Store(format!("Failed to count rows: {}", e)))?;
        if row_count == 0 {
            debug!("Search on empty store");
            return Ok(Vec::new());
        }

        let mut limit = k.saturating_add(TIE_MARGIN);
        loop {
            let mut ranked = rank_results(
                self.nearest(&table, query_vector, limit, filters).await?,
                limit,
            );

            if ranked.len() < limit || limit >= row_count || !tie_at_cutoff(&ranked, k) {
                ranked.truncate(k);
                return Ok(ranked);
            }

            debug!("Scores still tied at the {}-candidate limit; widening", limit);
            limit = limit.saturating_mul(2);
        }
    }

    async fn nearest(
        &self,
        table: &Table,
        query_vector: &[f32],
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<RetrievedChunk>> {
        let mut query = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Store(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .refine_factor(REFINE_FACTOR)
            .limit(limit);

        if let Some(predicate) = filters.to_predicate() {
            debug!("Search prefilter: {}", predicate);
            query = query.only_if(predicate);
        }

        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to execute search: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| RagError::Store(format!("Failed to read result stream: {}", e)))?;

        let mut results = Vec::new();
        for batch in &batches {
            results.extend(parse_search_batch(batch)?);
        }

        Ok(results)
    }

    /// Get the total number of chunks stored
    #[inline]
    pub async fn count_chunks(&self) -> Result<usize> {
        let Some(table) = self.readable_table().await? else {
            return Ok(0);
        };
        table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Store(format!("Failed to count rows: {}", e)))
    }

    /// Distinct ids of all indexed documents, sorted
    #[inline]
    pub async fn document_ids(&self) -> Result<Vec<String>> {
        let Some(table) = self.readable_table().await? else {
            return Ok(Vec::new());
        };
        let batches: Vec<RecordBatch> = table
            .query()
            .select(Select::columns(&["document_id"]))
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to query document ids: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| RagError::Store(format!("Failed to read document ids: {}", e)))?;

        let mut ids = BTreeSet::new();
        for batch in &batches {
            let column = string_column(batch, "document_id")?;
            for row in 0..batch.num_rows() {
                ids.insert(column.value(row).to_string());
            }
        }

        Ok(ids.into_iter().collect())
    }

    /// Optimize the vector database by compacting and reorganizing data
    #[inline]
    pub async fn optimize(&self) -> Result<()> {
        self.ensure_writable()?;
        debug!("Optimizing vector database");

        self.open_table()
            .await?
            .optimize(lancedb::table::OptimizeAction::All)
            .await
            .map_err(|e| RagError::Store(format!("Failed to optimize table: {}", e)))?;

        info!("Vector database optimization completed");
        Ok(())
    }

    /// Build an approximate cosine index once there is enough data to train it
    ///
    /// Returns whether an index was created. Small stores are searched exactly.
    #[inline]
    pub async fn create_vector_index(&self) -> Result<bool> {
        self.ensure_writable()?;
        let rows = self.count_chunks().await?;
        if rows < MIN_ROWS_FOR_INDEX {
            info!(
                "Skipping vector index: {} rows is below the {} needed to train it",
                rows, MIN_ROWS_FOR_INDEX
            );
            return Ok(false);
        }

        debug!("Creating vector index for improved search performance");
        self.open_table()
            .await?
            .create_index(
                &["vector"],
                Index::IvfPq(IvfPqIndexBuilder::default().distance_type(DistanceType::Cosine)),
            )
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to create vector index: {}", e)))?;

        info!("Vector index created successfully");
        Ok(true)
    }

    /// Drop every stored chunk and start with an empty table
    #[inline]
    pub async fn reset(&self) -> Result<()> {
        self.ensure_writable()?;
        warn!("Resetting vector store at {:?}", self.db_path);
        self.drop_table_if_exists().await?;
        self.initialize_table().await
    }

    async fn drop_table_if_exists(&self) -> Result<()> {
        if self.table_exists().await? {
            info!("Dropping existing chunk table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| RagError::Store(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }
}

/// Order by score descending then chunk id, drop duplicates, keep the best `k`
fn rank_results(mut results: Vec<RetrievedChunk>, k: usize) -> Vec<RetrievedChunk> {
    results.sort_by(compare_ranked);
    results.dedup_by(|a, b| a.chunk_id == b.chunk_id);
    results.truncate(k);
    results
}

/// Whether the score at position `k` continues to the end of the ranked window
fn tie_at_cutoff(ranked: &[RetrievedChunk], k: usize) -> bool {
    match (k.checked_sub(1).and_then(|i| ranked.get(i)), ranked.last()) {
        (Some(kth), Some(last)) => ranked.len() > k && kth.score.total_cmp(&last.score).is_eq(),
        _ => false,
    }
}

pub(crate) fn compare_ranked(a: &RetrievedChunk, b: &RetrievedChunk) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| RagError::Store(format!("{} {} out of range", what, value)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Store(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Store(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Store(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::Store(format!("Invalid {} column type", name)))
}

fn optional_value(array: &StringArray, row: usize) -> Option<String> {
    if array.is_null(row) {
        None
    } else {
        Some(array.value(row).to_string())
    }
}

/// Parse a single record batch from search results
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<RetrievedChunk>> {
    let chunk_ids = string_column(batch, "chunk_id")?;
    let document_ids = string_column(batch, "document_id")?;
    let titles = string_column(batch, "title")?;
    let texts = string_column(batch, "text")?;
    let dates = string_column(batch, "date")?;
    let categories = string_column(batch, "category")?;
    let clubs = string_column(batch, "club")?;
    let venues = string_column(batch, "venue")?;
    let chunk_indices = u32_column(batch, "chunk_index")?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| RagError::Store("Missing _distance column".to_string()))?;

    let mut results = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let date = optional_value(dates, row)
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok());
        let distance = if distances.is_null(row) {
            1.0
        } else {
            distances.value(row)
        };

        results.push(RetrievedChunk {
            chunk_id: chunk_ids.value(row).to_string(),
            document_id: document_ids.value(row).to_string(),
            title: titles.value(row).to_string(),
            text: texts.value(row).to_string(),
            chunk_index: chunk_indices.value(row),
            metadata: DocumentMetadata {
                date,
                category: optional_value(categories, row),
                club: optional_value(clubs, row),
                venue: optional_value(venues, row),
            },
            // Cosine distance is 1 - similarity
            score: 1.0 - distance,
        });
    }

    Ok(results)
}
