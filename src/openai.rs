use async_trait::async_trait;
use lazy_static::lazy_static;
use reqwest::{header::HeaderValue, Body, Client, Method, Request, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::warn;

use crate::providers::{EmbeddingService, ProviderCallError, QueryService};

pub const SOURCE: &str = "openai";

const QUERY_MODELS: [&str; 4] = ["gpt-3.5-turbo", "gpt-4", "gpt-4-turbo", "gpt-4o"];
const EMBEDDING_MODELS: [&str; 3] = [
    "text-embedding-ada-002",
    "text-embedding-3-small",
    "text-embedding-3-large",
];

lazy_static! {
    static ref COMPLETIONS_ENDPOINT: Url =
        Url::parse("https://api.openai.com/v1/chat/completions").unwrap();
    static ref EMBEDDINGS_ENDPOINT: Url =
        Url::parse("https://api.openai.com/v1/embeddings").unwrap();
    static ref CLIENT: Client = Client::new();
    static ref ENCODER: CoreBPE = cl100k_base().unwrap();
}

fn tokens_for(s: &str) -> Vec<usize> {
    ENCODER.encode_with_special_tokens(s)
}

const MAX_TOKEN_COUNT: usize = 8191;
fn truncated_tokens_for(s: &str) -> Vec<usize> {
    let mut tokens = tokens_for(s);
    if tokens.len() > MAX_TOKEN_COUNT {
        tokens.truncate(MAX_TOKEN_COUNT);
        warn!("truncating embedding input to {MAX_TOKEN_COUNT} tokens");
    }

    tokens
}

async fn post_json(
    endpoint: &Url,
    api_key: &str,
    body: Vec<u8>,
) -> Result<Vec<u8>, ProviderCallError> {
    let mut req = Request::new(Method::POST, endpoint.clone());
    let headers = req.headers_mut();
    headers.insert("Content-Type", HeaderValue::from_static("application/json"));
    headers.insert(
        "Authorization",
        HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ProviderCallError::BadApiKey)?,
    );

    let body: Body = body.into();
    *req.body_mut() = Some(body);

    let response = CLIENT.execute(req).await?;
    let status = response.status();
    let response_bytes = response.bytes().await?;
    if status != StatusCode::OK {
        let body = String::from_utf8_lossy(&response_bytes).to_string();
        return Err(ProviderCallError::BadStatus(status, body));
    }

    Ok(response_bytes.to_vec())
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [CompletionMessage<'a>; 1],
}

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize, Debug)]
struct CompletionChoice {
    message: CompletionChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct CompletionChoiceMessage {
    content: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [Vec<usize>],
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

pub struct OpenAiQueries {
    api_key: String,
}

impl OpenAiQueries {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl QueryService for OpenAiQueries {
    fn source(&self) -> &str {
        SOURCE
    }

    fn validate_model(&self, model: &str) -> bool {
        QUERY_MODELS.contains(&model)
    }

    async fn query(&self, model: &str, query: &str) -> Result<String, ProviderCallError> {
        let body = CompletionRequest {
            model,
            messages: [CompletionMessage {
                role: "user",
                content: query,
            }],
        };
        let body_vec = serde_json::to_vec(&body)?;
        let response_bytes = post_json(&COMPLETIONS_ENDPOINT, &self.api_key, body_vec).await?;
        let mut response: CompletionResponse = serde_json::from_slice(&response_bytes)?;
        if response.choices.is_empty() {
            return Err(ProviderCallError::MissingData("completion choices"));
        }

        Ok(response.choices.remove(0).message.content)
    }
}

pub struct OpenAiEmbeddings {
    api_key: String,
}

impl OpenAiEmbeddings {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddings {
    fn source(&self) -> &str {
        SOURCE
    }

    fn validate_model(&self, model: &str) -> bool {
        EMBEDDING_MODELS.contains(&model)
    }

    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, ProviderCallError> {
        let token_lists = [truncated_tokens_for(text)];
        let body = EmbeddingRequest {
            model,
            input: &token_lists,
            user: None,
        };
        let body_vec = serde_json::to_vec(&body)?;
        let response_bytes = post_json(&EMBEDDINGS_ENDPOINT, &self.api_key, body_vec).await?;
        let mut response: EmbeddingResponse = serde_json::from_slice(&response_bytes)?;
        if response.data.is_empty() {
            return Err(ProviderCallError::MissingData("embedding data"));
        }

        Ok(response.data.remove(0).embedding)
    }
}
