use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::baseline::QueryResult;
use crate::providers::ServiceDescriptor;

/// The persisted baseline: provenance first, then the ordered results.
/// Field order here fixes the field order in the written document.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct BaselineArtifact {
    pub llm: ServiceDescriptor,
    pub embeddings: ServiceDescriptor,
    pub data: Vec<QueryResult>,
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("error while serializing baseline: {0:?}")]
    Serialization(#[from] serde_json::Error),
}

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^a-z0-9._-]+").unwrap();
}

pub fn str_to_safe_filename(name: &str) -> String {
    UNSAFE_CHARS.replace_all(&name.to_lowercase(), "_").to_string()
}

/// Filename encoding both service descriptors plus a microsecond timestamp,
/// so repeated runs with identical parameters never collide.
fn baseline_filename(
    llm: &ServiceDescriptor,
    embeddings: &ServiceDescriptor,
    timestamp: DateTime<Utc>,
) -> String {
    let stem = format!(
        "baseline__{}_{}__{}_{}__{}",
        llm.source,
        llm.model,
        embeddings.source,
        embeddings.model,
        timestamp.timestamp_micros()
    );

    format!("{}.json", str_to_safe_filename(&stem))
}

/// Persist a baseline artifact under a generated filename, returning the
/// full path. The document lands in a staging file first and is renamed
/// into place, so the final path never exposes a partial write.
pub async fn write_baseline(
    llm: &ServiceDescriptor,
    embeddings: &ServiceDescriptor,
    data: Vec<QueryResult>,
    output_directory: &Path,
) -> Result<PathBuf, OutputError> {
    let artifact = BaselineArtifact {
        llm: llm.clone(),
        embeddings: embeddings.clone(),
        data,
    };

    let filename = baseline_filename(&artifact.llm, &artifact.embeddings, Utc::now());
    let body = serde_json::to_vec_pretty(&artifact)?;

    tokio::fs::create_dir_all(output_directory).await?;
    let final_path = output_directory.join(&filename);
    let staging_path = output_directory.join(format!("{filename}.tmp"));
    tokio::fs::write(&staging_path, &body).await?;
    tokio::fs::rename(&staging_path, &final_path).await?;

    Ok(final_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn descriptor(source: &str, model: &str) -> ServiceDescriptor {
        ServiceDescriptor {
            source: source.to_string(),
            model: model.to_string(),
        }
    }

    #[test]
    fn filename_is_lowercased_and_sanitized() {
        let timestamp = Utc.timestamp_micros(1_700_000_000_123_456).unwrap();
        let filename = baseline_filename(
            &descriptor("OpenAI", "GPT-4o"),
            &descriptor("Open AI", "text embedding/3 small"),
            timestamp,
        );
        assert_eq!(
            filename,
            "baseline__openai_gpt-4o__open_ai_text_embedding_3_small__1700000000123456.json"
        );
    }

    #[test]
    fn identical_parameters_produce_distinct_filenames() {
        let llm = descriptor("openai", "gpt-4o");
        let embeddings = descriptor("openai", "text-embedding-3-small");
        let first = baseline_filename(
            &llm,
            &embeddings,
            Utc.timestamp_micros(1_700_000_000_000_001).unwrap(),
        );
        let second = baseline_filename(
            &llm,
            &embeddings,
            Utc.timestamp_micros(1_700_000_000_000_002).unwrap(),
        );
        assert_ne!(first, second);
        for filename in [&first, &second] {
            assert!(!filename.contains('/'));
            assert!(!filename.contains(' '));
        }
    }

    #[tokio::test]
    async fn written_baseline_round_trips() {
        let tempdir = tempfile::tempdir().unwrap();
        let llm = descriptor("openai", "gpt-4o");
        let embeddings = descriptor("openai", "text-embedding-3-small");
        let data = vec![QueryResult {
            query: "what is 2+2?".to_string(),
            response: "4".to_string(),
            vector: vec![0.1, 0.2],
        }];

        let path = write_baseline(&llm, &embeddings, data, tempdir.path())
            .await
            .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: BaselineArtifact = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.llm, llm);
        assert_eq!(parsed.embeddings, embeddings);
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].query, "what is 2+2?");
        assert_eq!(parsed.data[0].response, "4");
        assert_eq!(parsed.data[0].vector, vec![0.1, 0.2]);
    }

    #[tokio::test]
    async fn staging_file_is_not_left_behind() {
        let tempdir = tempfile::tempdir().unwrap();
        write_baseline(
            &descriptor("openai", "gpt-4o"),
            &descriptor("openai", "text-embedding-3-small"),
            Vec::new(),
            tempdir.path(),
        )
        .await
        .unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(tempdir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn consecutive_writes_do_not_collide() {
        let tempdir = tempfile::tempdir().unwrap();
        let llm = descriptor("openai", "gpt-4o");
        let embeddings = descriptor("openai", "text-embedding-3-small");

        let first = write_baseline(&llm, &embeddings, Vec::new(), tempdir.path())
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = write_baseline(&llm, &embeddings, Vec::new(), tempdir.path())
            .await
            .unwrap();

        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
    }
}
