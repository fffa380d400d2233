use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use ragkit_core::error::{Error, Result};
use ragkit_core::filter::MetadataFilter;
use ragkit_core::traits::{DeleteSelector, VectorStore};
use ragkit_core::types::{compare_scored, DocId, Document, SearchHit};

use crate::codec;
use crate::schema::build_documents_schema;
use crate::table::{ensure_table, f32_column, id_predicate, open_db, string_column, vector_at};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanceDistance {
    #[default]
    Cosine,
    L2,
    Dot,
}

impl LanceDistance {
    fn distance_type(self) -> DistanceType {
        match self {
            LanceDistance::Cosine => DistanceType::Cosine,
            LanceDistance::L2 => DistanceType::L2,
            LanceDistance::Dot => DistanceType::Dot,
        }
    }

    /// `_distance` to a higher-is-better score.
    fn to_score(self, distance: f32) -> f32 {
        match self {
            LanceDistance::Cosine | LanceDistance::Dot => 1.0 - distance,
            LanceDistance::L2 => 1.0 / (1.0 + distance),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LanceDBConfig {
    pub uri: String,
    pub table_name: String,
    pub dimension: usize,
    pub distance: LanceDistance,
}

impl Default for LanceDBConfig {
    fn default() -> Self {
        Self { uri: "lancedb".into(), table_name: "documents".into(), dimension: 384, distance: LanceDistance::Cosine }
    }
}

/// Extra rows fetched past `top_k` so equal scores at the cutoff can be ordered by id.
const TIE_MARGIN: usize = 8;

/// LanceDB-backed store. The connection is opened on first use.
pub struct LanceDBStore {
    config: LanceDBConfig,
    conn: OnceCell<Connection>,
}

impl LanceDBStore {
    pub fn new(config: LanceDBConfig) -> Self { Self { config, conn: OnceCell::new() } }

    async fn table(&self) -> Result<Table> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let conn = open_db(&self.config.uri).await?;
                ensure_table(&conn, &self.config.table_name, build_documents_schema(self.config.dimension as i32)).await?;
                info!(uri = %self.config.uri, table = %self.config.table_name, "opened lancedb store");
                Ok::<_, Error>(conn)
            })
            .await?;
        conn.open_table(&self.config.table_name).execute().await.map_err(Error::store)
    }

    fn to_record_batch(&self, documents: &[Document]) -> Result<RecordBatch> {
        let dim = self.config.dimension;
        let mut ids = Vec::with_capacity(documents.len());
        let mut contents = Vec::with_capacity(documents.len());
        let mut sources = Vec::with_capacity(documents.len());
        let mut metadata = Vec::with_capacity(documents.len());
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(documents.len());
        for doc in documents {
            let vector = doc.embedding.as_ref().ok_or_else(|| Error::store(format!("document {} has no embedding", doc.id)))?;
            if vector.len() != dim {
                return Err(Error::store(format!("document {} has dimension {}, table expects {dim}", doc.id, vector.len())));
            }
            ids.push(doc.id.clone());
            contents.push(doc.content.clone());
            sources.push(doc.source.clone());
            metadata.push(codec::encode_to_string(&doc.metadata)?);
            vectors.push(Some(vector.iter().map(|&x| Some(x)).collect()));
        }
        RecordBatch::try_new(
            build_documents_schema(dim as i32),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(sources)),
                Arc::new(StringArray::from(metadata)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim as i32)),
            ],
        )
        .map_err(Error::store)
    }

    /// Rows of `batch` as documents, paired with their `_distance` when present.
    fn read_batch(batch: &RecordBatch) -> Result<Vec<(Document, Option<f32>)>> {
        let ids = string_column(batch, "id")?;
        let contents = string_column(batch, "content")?;
        let sources = string_column(batch, "source")?;
        let metadata = string_column(batch, "metadata")?;
        let distances = f32_column(batch, "_distance");
        let mut out = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let doc = Document {
                id: ids.value(i).to_string(),
                content: contents.value(i).to_string(),
                source: sources.value(i).to_string(),
                metadata: codec::decode_from_str(metadata.value(i))?,
                embedding: vector_at(batch, i)?,
            };
            out.push((doc, distances.map(|d| d.value(i))));
        }
        Ok(out)
    }

    /// The `limit` nearest rows, unfiltered, with higher-is-better scores.
    async fn nearest(&self, table: &Table, query_vector: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        let mut stream = table
            .vector_search(query_vector.to_vec())
            .map_err(Error::store)?
            .distance_type(self.config.distance.distance_type())
            .limit(limit)
            .execute()
            .await
            .map_err(Error::store)?;
        let mut hits = Vec::with_capacity(limit);
        while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
            for (doc, distance) in Self::read_batch(&batch)? {
                let score = distance.map(|d| self.config.distance.to_score(d)).unwrap_or(0.0);
                hits.push(SearchHit::new(doc, score));
            }
        }
        Ok(hits)
    }

    async fn scan(&self, predicate: Option<String>) -> Result<Vec<Document>> {
        let table = self.table().await?;
        let query = match predicate {
            Some(p) => table.query().only_if(p),
            None => table.query(),
        };
        let mut stream = query.execute().await.map_err(Error::store)?;
        let mut docs = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
            docs.extend(Self::read_batch(&batch)?.into_iter().map(|(d, _)| d));
        }
        Ok(docs)
    }
}

#[async_trait]
impl VectorStore for LanceDBStore {
    fn name(&self) -> &str { "LanceDBStore" }

    fn supports_filtering(&self) -> bool { false }

    async fn add(&self, documents: &[Document]) -> Result<()> {
        if documents.is_empty() { return Ok(()); }
        let batch = self.to_record_batch(documents)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let table = self.table().await?;
        // Upsert: id is unique
        let mut mi = table.merge_insert(&["id"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        mi.execute(reader).await.map_err(Error::store)?;
        debug!(added = documents.len(), table = %self.config.table_name, "lancedb upsert");
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], top_k: usize, filter: Option<&MetadataFilter>) -> Result<Vec<SearchHit>> {
        if top_k == 0 { return Ok(Vec::new()); }
        if query_vector.len() != self.config.dimension {
            return Err(Error::store(format!("query has dimension {}, table expects {}", query_vector.len(), self.config.dimension)));
        }
        let table = self.table().await?;
        let total = table.count_rows(None).await.map_err(Error::store)?;
        if total == 0 { return Ok(Vec::new()); }

        // Lance cuts the window without regard to ids, so widen it until the
        // row past the cutoff scores strictly lower than the k-th hit.
        let mut limit = (top_k + TIE_MARGIN).min(total);
        loop {
            let fetched = self.nearest(&table, query_vector, limit).await?;
            let lowest = fetched.iter().map(|h| h.score).fold(f32::INFINITY, f32::min);
            let mut hits: Vec<SearchHit> = fetched
                .into_iter()
                .filter(|h| filter.map_or(true, |f| f.matches(&h.document.metadata)))
                .collect();
            hits.sort_by(|a, b| compare_scored(a.score, &a.document.id, b.score, &b.document.id));
            let tied_at_edge = hits.get(top_k - 1).is_some_and(|kth| kth.score <= lowest);
            if tied_at_edge && limit < total {
                limit = (limit * 2).min(total);
                continue;
            }
            hits.truncate(top_k);
            return Ok(hits);
        }
    }

    async fn delete(&self, selector: &DeleteSelector) -> Result<usize> {
        let ids: Vec<DocId> = match selector {
            DeleteSelector::Ids(ids) => ids.clone(),
            DeleteSelector::Filter(f) => self
                .scan(None)
                .await?
                .into_iter()
                .filter(|d| f.matches(&d.metadata))
                .map(|d| d.id)
                .collect(),
        };
        if ids.is_empty() { return Ok(0); }
        let table = self.table().await?;
        let predicate = id_predicate(&ids);
        let matched = table.count_rows(Some(predicate.clone())).await.map_err(Error::store)?;
        table.delete(&predicate).await.map_err(Error::store)?;
        Ok(matched)
    }

    async fn get(&self, ids: &[DocId]) -> Result<Vec<Document>> {
        if ids.is_empty() { return Ok(Vec::new()); }
        let mut found = self.scan(Some(id_predicate(ids))).await?;
        // input order
        found.sort_by_key(|d| ids.iter().position(|id| *id == d.id).unwrap_or(usize::MAX));
        Ok(found)
    }

    async fn count(&self) -> Result<usize> {
        let table = self.table().await?;
        table.count_rows(None).await.map_err(Error::store)
    }
}
