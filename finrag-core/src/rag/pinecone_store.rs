//! Pinecone vector database storage implementation.
//!
//! Talks to Pinecone's REST API: the control plane (`api.pinecone.io`) for
//! index provisioning, and the index's own data-plane host for upserts and
//! queries.

use super::store::VectorStore;
use super::types::{SearchResult, VectorRecord};
use crate::config::StorageMode;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const API_VERSION: &str = "2024-07";
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Pinecone-backed vector store for chunk embeddings.
///
/// Upserting an existing id replaces the stored vector and metadata, so
/// re-processing a document overwrites its previous chunks.
#[derive(Clone)]
pub struct PineconeStore {
    http_client: reqwest::Client,
    api_key: String,
    index_name: String,
    host: String,
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let request = UpsertRequest {
            vectors: records.into_iter().map(PineconeVector::from).collect(),
        };

        let response: UpsertResponse = self
            .post_data_plane("vectors/upsert", &request)
            .await
            .context("Failed to upsert vectors")?;

        debug!(index = %self.index_name, upserted = response.upserted_count, "upsert complete");
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };

        let response: QueryResponse = self
            .post_data_plane("query", &request)
            .await
            .context("Failed to query vectors")?;

        Ok(response.into_results(top_k))
    }

    async fn count(&self) -> Result<usize> {
        let stats: IndexStats = self
            .post_data_plane("describe_index_stats", &serde_json::json!({}))
            .await
            .context("Failed to describe index stats")?;

        Ok(stats.total_vector_count as usize)
    }

    async fn clear(&self) -> Result<()> {
        let _: serde_json::Value = self
            .post_data_plane("vectors/delete", &DeleteRequest { delete_all: true })
            .await
            .context("Failed to delete vectors")?;
        Ok(())
    }
}

impl PineconeStore {
    /// Connects to the named index, creating it first if it doesn't exist.
    ///
    /// Provisioning is check-then-create: two processes starting at once can
    /// both see the index as missing, and the second create will fail.
    pub async fn connect(
        mode: &StorageMode,
        index_name: String,
        dimension: usize,
        api_key: &str,
    ) -> Result<Self> {
        let StorageMode::Pinecone { control_url, cloud, region, ready_timeout_secs } = mode else {
            bail!("PineconeStore only supports Pinecone mode");
        };

        let control = ControlPlane {
            http_client: reqwest::Client::new(),
            base_url: control_url.trim_end_matches('/').to_string(),
            api_key,
            poll_interval: READY_POLL_INTERVAL,
        };

        let index = control
            .ensure_index(&index_name, dimension, cloud, region, Duration::from_secs(*ready_timeout_secs))
            .await?;

        info!(index = %index_name, host = %index.host, "connected to Pinecone index");

        Ok(Self {
            http_client: control.http_client,
            api_key: api_key.to_string(),
            index_name,
            host: data_plane_base(&index.host),
        })
    }

    async fn post_data_plane<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.host, path);
        let response = self
            .http_client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
            .send()
            .await?;

        read_json(response).await
    }
}

/// Index provisioning against the control plane.
struct ControlPlane<'a> {
    http_client: reqwest::Client,
    base_url: String,
    api_key: &'a str,
    poll_interval: Duration,
}

impl ControlPlane<'_> {
    async fn ensure_index(
        &self,
        name: &str,
        dimension: usize,
        cloud: &str,
        region: &str,
        ready_timeout: Duration,
    ) -> Result<IndexModel> {
        let existing = self.list_indexes().await?;

        match existing.into_iter().find(|index| index.name == name) {
            Some(index) => {
                if index.dimension != Some(dimension) {
                    bail!(
                        "Index '{}' has dimension {:?}, expected {}",
                        name,
                        index.dimension,
                        dimension
                    );
                }
                if index.is_ready() {
                    return Ok(index);
                }
            }
            None => {
                info!(index = %name, dimension, cloud, region, "creating Pinecone index");
                self.create_index(name, dimension, cloud, region).await?;
            }
        }

        self.wait_until_ready(name, ready_timeout).await
    }

    async fn list_indexes(&self) -> Result<Vec<IndexModel>> {
        let response = self
            .get("indexes")
            .send()
            .await
            .context("Failed to list indexes")?;
        let list: IndexList = read_json(response).await.context("Failed to list indexes")?;
        Ok(list.indexes)
    }

    async fn create_index(&self, name: &str, dimension: usize, cloud: &str, region: &str) -> Result<()> {
        let request = CreateIndexRequest {
            name,
            dimension,
            metric: "cosine",
            spec: IndexSpec {
                serverless: ServerlessSpec { cloud, region },
            },
        };

        let response = self
            .http_client
            .post(format!("{}/indexes", self.base_url))
            .header("Api-Key", self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&request)
            .send()
            .await
            .context("Failed to create index")?;

        let _: IndexModel = read_json(response).await.context("Failed to create index")?;
        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<IndexModel> {
        let response = self
            .get(&format!("indexes/{name}"))
            .send()
            .await
            .context("Failed to describe index")?;
        read_json(response).await.context("Failed to describe index")
    }

    async fn wait_until_ready(&self, name: &str, timeout: Duration) -> Result<IndexModel> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let index = self.describe_index(name).await?;
            if index.is_ready() {
                return Ok(index);
            }
            if tokio::time::Instant::now() >= deadline {
                bail!("Index '{}' not ready after {:?}", name, timeout);
            }
            warn!(index = %name, state = ?index.status.state, "index not ready yet");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http_client
            .get(format!("{}/{}", self.base_url, path))
            .header("Api-Key", self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }
}

async fn read_json<R>(response: reqwest::Response) -> Result<R>
where
    R: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Pinecone returned {}: {}", status, body);
    }
    Ok(response.json::<R>().await?)
}

/// Index hosts come back without a scheme; local emulators may include one.
fn data_plane_base(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

// Pinecone REST request/response types (internal)

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexModel>,
}

#[derive(Debug, Deserialize)]
struct IndexModel {
    name: String,
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    host: String,
    #[serde(default)]
    status: IndexStatus,
}

impl IndexModel {
    fn is_ready(&self) -> bool {
        self.status.ready && !self.host.is_empty()
    }
}

#[derive(Debug, Default, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: IndexSpec<'a>,
}

#[derive(Debug, Serialize)]
struct IndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Serialize)]
struct UpsertRequest {
    vectors: Vec<PineconeVector>,
}

#[derive(Debug, Serialize)]
struct PineconeVector {
    id: String,
    values: Vec<f32>,
    metadata: ChunkMetadata,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct ChunkMetadata {
    #[serde(default)]
    text: String,
}

impl From<VectorRecord> for PineconeVector {
    fn from(record: VectorRecord) -> Self {
        Self {
            id: record.id,
            values: record.embedding,
            metadata: ChunkMetadata { text: record.text },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<ChunkMetadata>,
}

impl QueryResponse {
    fn into_results(self, top_k: usize) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = self
            .matches
            .into_iter()
            .map(|m| SearchResult {
                id: m.id,
                text: m.metadata.unwrap_or_default().text,
                score: m.score,
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        results
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    #[serde(default)]
    total_vector_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest {
    delete_all: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_request_shape() {
        let request = UpsertRequest {
            vectors: vec![VectorRecord::new("0", "Total revenue", vec![0.5, 0.5]).into()],
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["vectors"][0]["id"], "0");
        assert_eq!(value["vectors"][0]["values"][1], 0.5);
        assert_eq!(value["vectors"][0]["metadata"]["text"], "Total revenue");
    }

    #[test]
    fn test_query_request_uses_camel_case() {
        let vector = [0.1f32, 0.2];
        let request = QueryRequest {
            vector: &vector,
            top_k: 5,
            include_metadata: true,
            include_values: false,
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["topK"], 5);
        assert_eq!(value["includeMetadata"], true);
        assert_eq!(value["includeValues"], false);
    }

    #[test]
    fn test_create_index_request_shape() {
        let request = CreateIndexRequest {
            name: "financial-rag",
            dimension: 384,
            metric: "cosine",
            spec: IndexSpec {
                serverless: ServerlessSpec { cloud: "aws", region: "us-east-1" },
            },
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["dimension"], 384);
        assert_eq!(value["metric"], "cosine");
        assert_eq!(value["spec"]["serverless"]["region"], "us-east-1");
    }

    #[test]
    fn test_query_response_maps_and_orders_matches() {
        let body = r#"{
            "matches": [
                {"id": "4", "score": 0.31, "metadata": {"text": "Operating expenses"}},
                {"id": "0", "score": 0.82, "metadata": {"text": "Total revenue for Q1 2024 was $2.4M"}},
                {"id": "9", "score": 0.12}
            ],
            "namespace": ""
        }"#;
        let parsed: QueryResponse = serde_json::from_str(body).unwrap();
        let results = parsed.into_results(5);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, "0");
        assert_eq!(results[0].text, "Total revenue for Q1 2024 was $2.4M");
        assert_eq!(results[2].text, "");
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_index_list_parses_and_detects_readiness() {
        let body = r#"{"indexes": [
            {"name": "financial-rag", "dimension": 384, "metric": "cosine",
             "host": "financial-rag-abc.svc.aped-4627-b74a.pinecone.io",
             "status": {"ready": true, "state": "Ready"}},
            {"name": "other", "dimension": 1536, "metric": "dotproduct", "host": "",
             "status": {"ready": false, "state": "Initializing"}}
        ]}"#;
        let list: IndexList = serde_json::from_str(body).unwrap();

        assert!(list.indexes[0].is_ready());
        assert_eq!(list.indexes[0].dimension, Some(384));
        assert!(!list.indexes[1].is_ready());
    }

    #[test]
    fn test_data_plane_base_adds_scheme() {
        assert_eq!(
            data_plane_base("financial-rag-abc.svc.pinecone.io"),
            "https://financial-rag-abc.svc.pinecone.io"
        );
        assert_eq!(data_plane_base("http://localhost:5081/"), "http://localhost:5081");
    }

    mod provisioning {
        use super::*;
        use serde_json::json;
        use wiremock::matchers::{body_partial_json, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        const API_KEY: &str = "test-key";

        fn control_plane(server: &MockServer, poll_interval: Duration) -> ControlPlane<'static> {
            ControlPlane {
                http_client: reqwest::Client::new(),
                base_url: server.uri(),
                api_key: API_KEY,
                poll_interval,
            }
        }

        fn pinecone_mode(server: &MockServer) -> StorageMode {
            StorageMode::Pinecone {
                control_url: server.uri(),
                cloud: "aws".into(),
                region: "us-east-1".into(),
                ready_timeout_secs: 5,
            }
        }

        fn index_json(dimension: usize, host: &str, ready: bool) -> serde_json::Value {
            let state = if ready { "Ready" } else { "Initializing" };
            json!({
                "name": "financial-rag",
                "dimension": dimension,
                "metric": "cosine",
                "host": host,
                "status": {"ready": ready, "state": state}
            })
        }

        async fn mount_list(server: &MockServer, indexes: serde_json::Value) {
            Mock::given(method("GET"))
                .and(path("/indexes"))
                .and(header("Api-Key", API_KEY))
                .and(header("X-Pinecone-API-Version", API_VERSION))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "indexes": indexes })))
                .expect(1)
                .mount(server)
                .await;
        }

        async fn forbid_create(server: &MockServer) {
            Mock::given(method("POST"))
                .and(path("/indexes"))
                .respond_with(ResponseTemplate::new(201))
                .expect(0)
                .mount(server)
                .await;
        }

        #[tokio::test]
        async fn test_missing_index_is_created_then_polled_until_ready() {
            let server = MockServer::start().await;
            mount_list(&server, json!([])).await;

            Mock::given(method("POST"))
                .and(path("/indexes"))
                .and(header("Api-Key", API_KEY))
                .and(body_partial_json(json!({
                    "name": "financial-rag",
                    "dimension": 384,
                    "metric": "cosine",
                    "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}}
                })))
                .respond_with(ResponseTemplate::new(201).set_body_json(index_json(384, "", false)))
                .expect(1)
                .mount(&server)
                .await;

            Mock::given(method("GET"))
                .and(path("/indexes/financial-rag"))
                .respond_with(ResponseTemplate::new(200).set_body_json(index_json(384, "", false)))
                .up_to_n_times(1)
                .with_priority(1)
                .expect(1)
                .mount(&server)
                .await;

            Mock::given(method("GET"))
                .and(path("/indexes/financial-rag"))
                .respond_with(ResponseTemplate::new(200).set_body_json(index_json(
                    384,
                    "financial-rag-abc.svc.pinecone.io",
                    true,
                )))
                .expect(1)
                .mount(&server)
                .await;

            let index = control_plane(&server, Duration::from_millis(10))
                .ensure_index("financial-rag", 384, "aws", "us-east-1", Duration::from_secs(5))
                .await
                .unwrap();

            assert!(index.is_ready());
            assert_eq!(index.host, "financial-rag-abc.svc.pinecone.io");
            server.verify().await;
        }

        #[tokio::test]
        async fn test_ready_index_is_reused_without_create() {
            let server = MockServer::start().await;
            mount_list(&server, json!([index_json(384, &server.uri(), true)])).await;
            forbid_create(&server).await;

            Mock::given(method("POST"))
                .and(path("/describe_index_stats"))
                .and(header("Api-Key", API_KEY))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "dimension": 384,
                    "totalVectorCount": 7
                })))
                .expect(1)
                .mount(&server)
                .await;

            let store = PineconeStore::connect(&pinecone_mode(&server), "financial-rag".into(), 384, API_KEY)
                .await
                .unwrap();

            assert_eq!(store.count().await.unwrap(), 7);
            server.verify().await;
        }

        #[tokio::test]
        async fn test_existing_index_with_other_dimension_fails() {
            let server = MockServer::start().await;
            mount_list(&server, json!([index_json(1536, &server.uri(), true)])).await;
            forbid_create(&server).await;

            let err = PineconeStore::connect(&pinecone_mode(&server), "financial-rag".into(), 384, API_KEY)
                .await
                .err()
                .unwrap();

            assert!(err.to_string().contains("dimension"));
            server.verify().await;
        }

        #[tokio::test]
        async fn test_index_never_ready_times_out() {
            let server = MockServer::start().await;
            mount_list(&server, json!([index_json(384, "", false)])).await;
            forbid_create(&server).await;

            Mock::given(method("GET"))
                .and(path("/indexes/financial-rag"))
                .respond_with(ResponseTemplate::new(200).set_body_json(index_json(384, "", false)))
                .mount(&server)
                .await;

            let err = control_plane(&server, Duration::from_millis(10))
                .ensure_index("financial-rag", 384, "aws", "us-east-1", Duration::from_millis(50))
                .await
                .unwrap_err();

            assert!(err.to_string().contains("not ready"));
        }
    }

    #[tokio::test]
    async fn test_connect_rejects_other_modes() {
        let result = PineconeStore::connect(&StorageMode::Memory, "financial-rag".into(), 384, "k").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires PINECONE_API_KEY and network access
    async fn test_pinecone_roundtrip() {
        let api_key = std::env::var("PINECONE_API_KEY").unwrap();
        let store = PineconeStore::connect(&StorageMode::default(), "financial-rag-test".into(), 3, &api_key)
            .await
            .unwrap();

        store
            .upsert(vec![VectorRecord::new("0", "Hello world", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();

        let results = store.query(&[1.0, 0.0, 0.0], 1).await.unwrap();
        assert!(results.len() <= 1);

        store.clear().await.unwrap();
    }
}
