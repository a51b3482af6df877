use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tabled::{Table, settings::Style};

use ds2bq::{BqClient, ConfigOverrides, DatastoreAdminClient, NamespaceScope, Pipeline, PipelineConfig, Plan};
use ds2bq::error::{BigQueryError, DatastoreError, Ds2BqError};

#[derive(Parser)]
#[command(name = "ds2bq")]
#[command(about = "Export a Datastore kind to Cloud Storage and reload it into BigQuery")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a YAML config file
    #[arg(short, long, env = "DS2BQ_CONFIG")]
    config: Option<PathBuf>,

    /// GCP project ID
    #[arg(short, long, env = "GCP_PROJECT_ID")]
    project: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    target: TargetArgs,
}

#[derive(Args)]
struct TargetArgs {
    /// Datastore entity kind to export
    #[arg(long, env = "DS2BQ_KIND")]
    kind: Option<String>,

    /// Cloud Storage bucket receiving the export
    #[arg(long, env = "DS2BQ_BUCKET")]
    bucket: Option<String>,

    /// BigQuery dataset holding the destination table
    #[arg(long, env = "DS2BQ_DATASET")]
    dataset: Option<String>,

    /// BigQuery destination table
    #[arg(long, env = "DS2BQ_TABLE")]
    table: Option<String>,

    /// Namespaces to export: all, default, or a namespace name
    #[arg(long)]
    namespace: Option<String>,

    /// Seconds to wait for the export operation
    #[arg(long, env = "DS2BQ_EXPORT_TIMEOUT")]
    export_timeout: Option<u64>,

    /// Seconds to wait for the load job (waits indefinitely if unset)
    #[arg(long, env = "DS2BQ_LOAD_TIMEOUT")]
    load_timeout: Option<u64>,

    /// Seconds between status polls of export and load
    #[arg(long)]
    poll_interval: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Export, delete the destination table, then load the export
    Run,

    /// Show the requests a run would issue without contacting any service
    Plan {
        /// Export output URL to derive the load source URI from
        #[arg(long)]
        output_url: Option<String>,

        /// Output format: table, yaml, json
        #[arg(short, long, default_value = "table")]
        output: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Yaml,
    Json,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            project_id: self.project.clone(),
            kind: self.target.kind.clone(),
            bucket: self.target.bucket.clone(),
            dataset_id: self.target.dataset.clone(),
            table_id: self.target.table.clone(),
            namespace: self.target.namespace.as_deref().map(NamespaceScope::parse),
            export_timeout_secs: self.target.export_timeout,
            load_timeout_secs: self.target.load_timeout,
            poll_interval_secs: self.target.poll_interval,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("ds2bq=debug,info")
    } else {
        EnvFilter::new("ds2bq=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn print_error(err: &Ds2BqError) {
    match err {
        Ds2BqError::BigQuery(bq) => print_bq_error(bq),
        Ds2BqError::Datastore(ds) => print_datastore_error(ds),
        other => {
            eprintln!("\x1b[31m✗ Error:\x1b[0m {}", other);
            if let Some(hint) = other.suggestion() {
                print_suggestion(&hint);
            }
        }
    }
}

fn print_bq_error(err: &BigQueryError) {
    eprintln!("\n\x1b[31m✗ BigQuery Error [{}]\x1b[0m", err.error_code());
    eprintln!("  {}", err);
    print_suggestion(&err.suggestion());
}

fn print_datastore_error(err: &DatastoreError) {
    eprintln!("\n\x1b[31m✗ Datastore Error [{}]\x1b[0m", err.error_code());
    eprintln!("  {}", err);
    print_suggestion(&err.suggestion());
}

fn print_suggestion(suggestion: &str) {
    eprintln!("\n\x1b[33mSuggestion:\x1b[0m");
    for line in suggestion.lines() {
        eprintln!("  {}", line);
    }
    eprintln!();
}

async fn run(cli: Cli) -> Result<(), Ds2BqError> {
    let overrides = cli.overrides();
    let config = PipelineConfig::resolve(cli.config.as_deref(), overrides)?;

    match cli.command {
        Commands::Run => cmd_run(config).await,
        Commands::Plan { output_url, output } => cmd_plan(&config, output_url.as_deref(), output),
    }
}

async fn cmd_run(config: PipelineConfig) -> Result<(), Ds2BqError> {
    info!(
        "Refreshing {} from kind '{}' via gs://{}",
        config.destination(), config.kind, config.bucket
    );

    let exporter = DatastoreAdminClient::new().await?;
    let bq = BqClient::new(&config.project_id).await?;
    let pipeline = Pipeline::new(config, exporter, bq.clone(), bq);

    let report = tokio::select! {
        result = pipeline.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            return Err(Ds2BqError::Cancelled(
                "interrupted; remote export or load operations may still be running".into(),
            ));
        }
    };

    println!();
    let mut table = Table::new(report.rows());
    table.with(Style::markdown());
    println!("{}", table);
    println!("\n✓ Loaded {} from {}", report.load.destination, report.load.source_uri);

    Ok(())
}

fn cmd_plan(config: &PipelineConfig, output_url: Option<&str>, output: OutputFormat) -> Result<(), Ds2BqError> {
    let plan = Plan::new(config, output_url)?;

    match output {
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&plan)?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Table => {
            println!("export   {} ({}) -> {}", plan.kind, plan.namespace, plan.output_url_prefix);
            println!("         timeout: {}", format_timeout(plan.export_timeout_secs));
            println!("delete   {}", plan.delete_table);
            println!("load     {} ({})", plan.load_destination, plan.source_format);
            match &plan.load_source_uri {
                Some(uri) => println!("         source: {}", uri),
                None => println!("         source: <derived from the export output URL>"),
            }
            println!("         timeout: {}", format_timeout(plan.load_timeout_secs));
        }
    }

    Ok(())
}

fn format_timeout(secs: Option<u64>) -> String {
    secs.map(|s| format!("{}s", s)).unwrap_or_else(|| "none".to_string())
}
