use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::openai::{OpenAiEmbeddings, OpenAiQueries};

/// Provenance of a resolved service: which provider, which model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub source: String,
    pub model: String,
}

#[derive(Error, Debug)]
pub enum ProviderCallError {
    #[error("error while doing provider request: {0:?}")]
    Http(#[from] reqwest::Error),
    #[error("provider response had bad status code: {0}: {1}")]
    BadStatus(StatusCode, String),
    #[error("error while parsing provider response: {0:?}")]
    BadJson(#[from] serde_json::Error),
    #[error("api key is not usable as a header value")]
    BadApiKey,
    #[error("provider response was missing {0}")]
    MissingData(&'static str),
}

#[async_trait]
pub trait QueryService: Send + Sync {
    fn source(&self) -> &str;
    fn validate_model(&self, model: &str) -> bool;
    async fn query(&self, model: &str, query: &str) -> Result<String, ProviderCallError>;

    fn describe(&self, model: &str) -> ServiceDescriptor {
        ServiceDescriptor {
            source: self.source().to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    fn source(&self) -> &str;
    fn validate_model(&self, model: &str) -> bool;
    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, ProviderCallError>;

    fn describe(&self, model: &str) -> ServiceDescriptor {
        ServiceDescriptor {
            source: self.source().to_string(),
            model: model.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum UnknownProviderError {
    #[error("{0} is not a registered query provider")]
    Query(String),
    #[error("{0} is not a registered embeddings provider")]
    Embeddings(String),
}

pub fn resolve_query_service(
    source: &str,
    api_key: &str,
) -> Result<Arc<dyn QueryService>, UnknownProviderError> {
    match source.to_lowercase().as_str() {
        "openai" => Ok(Arc::new(OpenAiQueries::new(api_key))),
        _ => Err(UnknownProviderError::Query(source.to_string())),
    }
}

pub fn resolve_embedding_service(
    source: &str,
    api_key: &str,
) -> Result<Arc<dyn EmbeddingService>, UnknownProviderError> {
    match source.to_lowercase().as_str() {
        "openai" => Ok(Arc::new(OpenAiEmbeddings::new(api_key))),
        _ => Err(UnknownProviderError::Embeddings(source.to_string())),
    }
}

#[derive(Error, Debug)]
pub enum UnsupportedModelError {
    #[error("{model} is not a valid query model for {provider}")]
    Query { model: String, provider: String },
    #[error("{model} is not a valid embeddings model for {provider}")]
    Embeddings { model: String, provider: String },
}

/// Gate that runs before any paid call is made.
pub fn ensure_query_model(
    service: &dyn QueryService,
    model: &str,
) -> Result<(), UnsupportedModelError> {
    if service.validate_model(model) {
        Ok(())
    } else {
        Err(UnsupportedModelError::Query {
            model: model.to_string(),
            provider: service.source().to_string(),
        })
    }
}

pub fn ensure_embedding_model(
    service: &dyn EmbeddingService,
    model: &str,
) -> Result<(), UnsupportedModelError> {
    if service.validate_model(model) {
        Ok(())
    } else {
        Err(UnsupportedModelError::Embeddings {
            model: model.to_string(),
            provider: service.source().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_names_are_rejected() {
        let result = resolve_query_service("acme", "fake-key");
        assert!(matches!(result, Err(UnknownProviderError::Query(ref s)) if s == "acme"));

        let result = resolve_embedding_service("acme", "fake-key");
        assert!(matches!(
            result,
            Err(UnknownProviderError::Embeddings(ref s)) if s == "acme"
        ));
    }

    #[test]
    fn provider_lookup_is_case_insensitive() {
        assert!(resolve_query_service("OpenAI", "fake-key").is_ok());
        assert!(resolve_embedding_service("OPENAI", "fake-key").is_ok());
    }

    #[test]
    fn unsupported_model_error_names_model_and_source() {
        let service = resolve_query_service("openai", "fake-key").unwrap();
        let err = ensure_query_model(service.as_ref(), "not-a-model").unwrap_err();
        assert_eq!(
            err.to_string(),
            "not-a-model is not a valid query model for openai"
        );

        let service = resolve_embedding_service("openai", "fake-key").unwrap();
        let err = ensure_embedding_model(service.as_ref(), "not-a-model").unwrap_err();
        assert_eq!(
            err.to_string(),
            "not-a-model is not a valid embeddings model for openai"
        );
    }

    #[test]
    fn descriptor_carries_source_and_model() {
        let service = resolve_query_service("openai", "fake-key").unwrap();
        let descriptor = service.describe("gpt-4o");
        assert_eq!(descriptor.source, "openai");
        assert_eq!(descriptor.model, "gpt-4o");
    }
}
