use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::info;

use crate::output::{self, OutputError};
use crate::providers::{
    ensure_embedding_model, ensure_query_model, resolve_embedding_service, resolve_query_service,
    EmbeddingService, ProviderCallError, QueryService, UnknownProviderError, UnsupportedModelError,
};
use crate::schema::{self, SchemaValidationError};

/// One fully processed input query. Produced exactly once per input, in
/// input order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub response: String,
    pub vector: Vec<f32>,
}

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error(transparent)]
    ProviderCall(#[from] ProviderCallError),
    #[error("baseline task failed: {0:?}")]
    Task(#[from] JoinError),
}

/// Run the two-stage pipeline query→embed for every input query. All
/// pipelines are launched at once; the embed stage of each pipeline consumes
/// that pipeline's own response.
pub async fn generate(
    query_service: Arc<dyn QueryService>,
    query_model: &str,
    embedding_service: Arc<dyn EmbeddingService>,
    embedding_model: &str,
    queries: &[String],
) -> Result<Vec<QueryResult>, GenerateError> {
    let tasks: Vec<_> = queries
        .iter()
        .map(|query| {
            let query_service = query_service.clone();
            let embedding_service = embedding_service.clone();
            let query_model = query_model.to_string();
            let embedding_model = embedding_model.to_string();
            let query = query.clone();
            tokio::spawn(async move {
                query_pipeline(
                    query_service,
                    query_model,
                    embedding_service,
                    embedding_model,
                    query,
                )
                .await
            })
        })
        .collect();

    // One output slot per task, joined in input order regardless of
    // completion order. The first failure ends the wait; in-flight sibling
    // tasks are left to finish detached.
    future::try_join_all(tasks.into_iter().map(|task| async move {
        match task.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(GenerateError::ProviderCall(e)),
            Err(e) => Err(GenerateError::Task(e)),
        }
    }))
    .await
}

async fn query_pipeline(
    query_service: Arc<dyn QueryService>,
    query_model: String,
    embedding_service: Arc<dyn EmbeddingService>,
    embedding_model: String,
    query: String,
) -> Result<QueryResult, ProviderCallError> {
    let response = query_service.query(&query_model, &query).await?;
    let vector = embedding_service.embed(&embedding_model, &response).await?;

    Ok(QueryResult {
        query,
        response,
        vector,
    })
}

pub struct BaselineConfig {
    pub filename: PathBuf,
    pub query_llm: String,
    pub query_model: String,
    pub query_api_key: String,
    pub embeddings_llm: String,
    pub embeddings_model: String,
    pub embeddings_api_key: String,
    pub output_directory: PathBuf,
}

#[derive(Error, Debug)]
pub enum BaselineError {
    #[error("could not read baseline input {0:?}: {1}")]
    Input(PathBuf, #[source] io::Error),
    #[error(transparent)]
    Schema(#[from] SchemaValidationError),
    #[error(transparent)]
    UnknownProvider(#[from] UnknownProviderError),
    #[error(transparent)]
    UnsupportedModel(#[from] UnsupportedModelError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Full baseline run: read input, validate it, resolve both services from
/// the configured source names, then hand over to the shared pipeline.
pub async fn run(config: &BaselineConfig) -> Result<PathBuf, BaselineError> {
    let queries = load_queries(config).await?;

    info!("resolving query and embeddings services");
    let query_service = resolve_query_service(&config.query_llm, &config.query_api_key)?;
    let embedding_service =
        resolve_embedding_service(&config.embeddings_llm, &config.embeddings_api_key)?;

    run_pipeline(config, queries, query_service, embedding_service).await
}

/// Same state machine as [`run`], but with pre-resolved services. This is
/// the seam for callers that carry their own gateway implementations.
pub async fn run_with_services(
    config: &BaselineConfig,
    query_service: Arc<dyn QueryService>,
    embedding_service: Arc<dyn EmbeddingService>,
) -> Result<PathBuf, BaselineError> {
    let queries = load_queries(config).await?;
    run_pipeline(config, queries, query_service, embedding_service).await
}

async fn load_queries(config: &BaselineConfig) -> Result<Vec<String>, BaselineError> {
    info!("reading baseline input from {}", config.filename.display());
    let raw = tokio::fs::read_to_string(&config.filename)
        .await
        .map_err(|e| BaselineError::Input(config.filename.clone(), e))?;

    info!("validating baseline input");
    Ok(schema::parse_queries(&raw)?)
}

async fn run_pipeline(
    config: &BaselineConfig,
    queries: Vec<String>,
    query_service: Arc<dyn QueryService>,
    embedding_service: Arc<dyn EmbeddingService>,
) -> Result<PathBuf, BaselineError> {
    // Both models are checked up front, query model first. A bad embeddings
    // model must surface before any paid query call.
    ensure_query_model(query_service.as_ref(), &config.query_model)?;
    ensure_embedding_model(embedding_service.as_ref(), &config.embeddings_model)?;

    info!("generating baseline for {} queries", queries.len());
    let results = generate(
        query_service.clone(),
        &config.query_model,
        embedding_service.clone(),
        &config.embeddings_model,
        &queries,
    )
    .await?;

    let path = output::write_baseline(
        &query_service.describe(&config.query_model),
        &embedding_service.describe(&config.embeddings_model),
        results,
        &config.output_directory,
    )
    .await?;
    info!("baseline written to {}", path.display());

    Ok(path)
}
