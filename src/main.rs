use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use semantic_baseline::baseline::{self, BaselineConfig};
use semantic_baseline::providers::{
    ensure_embedding_model, ensure_query_model, resolve_embedding_service, resolve_query_service,
    EmbeddingService, QueryService,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a baseline dataset from a file of queries.
    Generate {
        #[arg(short, long)]
        filename: PathBuf,
        #[arg(long, default_value = "openai")]
        query_llm: String,
        #[arg(long)]
        query_model: String,
        #[arg(long)]
        query_key: Option<String>,
        #[arg(long, default_value = "openai")]
        embeddings_llm: String,
        #[arg(long)]
        embeddings_model: String,
        #[arg(long)]
        embeddings_key: Option<String>,
        #[arg(short, long)]
        output_directory: PathBuf,
    },
    /// Send a single query to a query service and print the response.
    Query {
        #[arg(short, long)]
        key: Option<String>,
        #[arg(long, default_value = "openai")]
        llm: String,
        #[arg(short, long, default_value = "gpt-4o")]
        model: String,
        #[arg(short, long)]
        string: String,
    },
    /// Embed a single string and print the vector.
    Embed {
        #[arg(short, long)]
        key: Option<String>,
        #[arg(long, default_value = "openai")]
        llm: String,
        #[arg(short, long, default_value = "text-embedding-3-small")]
        model: String,
        #[arg(short, long)]
        string: String,
    },
}

fn key_or_env(k: Option<String>) -> String {
    let result = k.or_else(|| std::env::var("OPENAI_KEY").ok());
    if result.is_none() {
        let mut app = Args::command();
        eprintln!("Error: no api key given. Configure it with the OPENAI_KEY environment variable, or by passing in the key argument");
        app.print_help().unwrap();
        std::process::exit(2);
    }

    result.unwrap()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match args.command {
        Commands::Generate {
            filename,
            query_llm,
            query_model,
            query_key,
            embeddings_llm,
            embeddings_model,
            embeddings_key,
            output_directory,
        } => {
            let config = BaselineConfig {
                filename,
                query_llm,
                query_model,
                query_api_key: key_or_env(query_key),
                embeddings_llm,
                embeddings_model,
                embeddings_api_key: key_or_env(embeddings_key),
                output_directory,
            };
            let path = baseline::run(&config).await?;
            println!("{}", path.display());
        }
        Commands::Query {
            key,
            llm,
            model,
            string,
        } => {
            let service = resolve_query_service(&llm, &key_or_env(key))?;
            ensure_query_model(service.as_ref(), &model)?;
            let response = service.query(&model, &string).await?;
            println!("{response}");
        }
        Commands::Embed {
            key,
            llm,
            model,
            string,
        } => {
            let service = resolve_embedding_service(&llm, &key_or_env(key))?;
            ensure_embedding_model(service.as_ref(), &model)?;
            let vector = service.embed(&model, &string).await?;
            println!("{vector:?}");
        }
    }

    Ok(())
}
