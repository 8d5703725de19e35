//! CLI entrypoint for the Go module dependency synchroniser.
#![forbid(unsafe_code)]

use clap::Parser;
use std::{
    fs,
    path::{Path, PathBuf},
    process,
    sync::Arc,
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use modproxy_core::{
    DependencyRepo, DependencyStore, ListDependencyReposOpts, RepoRecord, StoreError, paginate,
};
use modproxy_sync::{
    GoModulesConnection, HttpTransport, LimiterRegistry, ProxyTransport, Reconciler,
    STORE_PAGE_SIZE, SyncError,
};

#[tokio::main]
async fn main() {
    let args = Arguments::parse();
    if let Err(error) = run(args).await {
        eprintln!("modproxy-sync: {error}");
        process::exit(1);
    }
}

async fn run(arguments: Arguments) -> Result<(), CliError> {
    let connection = load_connection(&arguments.config)?;
    let rows = match &arguments.store {
        Some(path) => load_rows(path)?,
        None => Vec::new(),
    };
    let reconciler = Reconciler::new(
        connection,
        arguments.urn,
        HttpTransport::new(),
        Arc::new(LimiterRegistry::new()),
        FileStore::new(rows),
    );
    execute(&reconciler).await
}

async fn execute<T: ProxyTransport, S: DependencyStore>(
    reconciler: &Reconciler<T, S>,
) -> Result<(), CliError> {
    let (records, failures) = synchronise(reconciler, &CancellationToken::new()).await;
    for record in &records {
        let line = serde_json::to_string(record).map_err(CliError::SerialiseRecord)?;
        println!("{line}");
    }
    for failure in &failures {
        eprintln!("modproxy-sync: {failure}");
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(CliError::CompletedWithErrors {
            failures: failures.len(),
        })
    }
}

/// Drive a full run, splitting the output stream into records and failures.
async fn synchronise<T: ProxyTransport, S: DependencyStore>(
    reconciler: &Reconciler<T, S>,
    cancel: &CancellationToken,
) -> (Vec<RepoRecord>, Vec<SyncError>) {
    let (results, mut stream) = mpsc::channel(STORE_PAGE_SIZE);
    let producer = async {
        reconciler.run(cancel, &results).await;
        drop(results);
    };
    let consumer = async {
        let mut records = Vec::new();
        let mut failures = Vec::new();
        while let Some(result) = stream.recv().await {
            match result {
                Ok(record) => records.push(record),
                Err(error) => failures.push(error),
            }
        }
        (records, failures)
    };
    let ((), outcome) = tokio::join!(producer, consumer);
    outcome
}

fn load_connection(path: &Path) -> Result<GoModulesConnection, CliError> {
    let raw = fs::read_to_string(path).map_err(|source| CliError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CliError::ParseFile {
        path: path.to_path_buf(),
        source,
    })
}

fn load_rows(path: &Path) -> Result<Vec<DependencyRepo>, CliError> {
    let raw = fs::read_to_string(path).map_err(|source| CliError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CliError::ParseFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Dependency rows loaded from the `--store` file, served with the standard
/// paging rules so a run behaves exactly as it would against a live store.
#[derive(Debug, Default)]
struct FileStore {
    rows: Vec<DependencyRepo>,
}

impl FileStore {
    fn new(rows: Vec<DependencyRepo>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl DependencyStore for FileStore {
    async fn list_dependency_repos(
        &self,
        opts: ListDependencyReposOpts,
    ) -> Result<Vec<DependencyRepo>, StoreError> {
        Ok(paginate(&self.rows, &opts))
    }
}

#[derive(Debug, Parser)]
#[command(name = "modproxy-sync", about = "Go module dependency synchroniser")]
struct Arguments {
    /// Path to the JSON connection settings
    #[arg(short, long, value_name = "path")]
    config: PathBuf,
    /// Optional JSON file of tracked dependency rows
    #[arg(short, long, value_name = "path")]
    store: Option<PathBuf>,
    /// External service URN recorded on emitted records
    #[arg(long, value_name = "urn", default_value = "extsvc:gomodules:1")]
    urn: String,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {path:?}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    ParseFile {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to serialise a repository record: {0}")]
    SerialiseRecord(serde_json::Error),
    #[error("synchronisation completed with {failures} failure(s)")]
    CompletedWithErrors { failures: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::fs;
    use tempfile::TempDir;

    use modproxy_sync::proxy::test_support::{StubTransport, block_on_for_tests};

    #[fixture]
    fn tmp() -> TempDir {
        TempDir::new().expect("failed to create temporary directory")
    }

    fn write_file(tmp: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = tmp.path().join(name);
        fs::write(&path, contents).expect("failed to write fixture file");
        path
    }

    #[rstest]
    fn parses_minimum_arguments() {
        let args = Arguments::try_parse_from(["modproxy-sync", "--config", "settings.json"])
            .expect("arguments should parse");
        assert_eq!(args.config, PathBuf::from("settings.json"));
        assert_eq!(args.store, None);
        assert_eq!(args.urn, "extsvc:gomodules:1");
    }

    #[rstest]
    fn parses_overrides() {
        let args = Arguments::try_parse_from([
            "modproxy-sync",
            "--config",
            "settings.json",
            "--store",
            "rows.json",
            "--urn",
            "extsvc:gomodules:42",
        ])
        .expect("arguments should parse");
        assert_eq!(args.store.as_deref(), Some(Path::new("rows.json")));
        assert_eq!(args.urn, "extsvc:gomodules:42");
    }

    #[rstest]
    fn rejects_missing_config() {
        let outcome = Arguments::try_parse_from(["modproxy-sync"]);
        assert!(outcome.is_err(), "parser should require --config");
    }

    #[rstest]
    fn loads_connection_settings(tmp: TempDir) {
        let path = write_file(
            &tmp,
            "settings.json",
            r#"{"urls": ["https://proxy.golang.org"], "dependencies": ["example.org/mod@v1.0.0"]}"#,
        );
        let connection = load_connection(&path).expect("settings should load");
        assert_eq!(connection.urls, vec!["https://proxy.golang.org"]);
        assert_eq!(connection.dependencies, vec!["example.org/mod@v1.0.0"]);
    }

    #[rstest]
    fn reports_malformed_settings(tmp: TempDir) {
        let path = write_file(&tmp, "settings.json", "not json");
        let outcome = load_connection(&path);
        assert!(matches!(outcome, Err(CliError::ParseFile { .. })));
    }

    #[rstest]
    fn loads_store_rows(tmp: TempDir) {
        let path = write_file(
            &tmp,
            "rows.json",
            r#"[{"id": 1, "scheme": "go", "name": "example.org/mod", "version": "v1.0.0"}]"#,
        );
        let rows = load_rows(&path).expect("rows should load");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "example.org/mod");
    }

    #[rstest]
    fn synchronises_end_to_end() {
        let transport = StubTransport::new()
            .reply(
                "https://proxy.test/example.org/a/@v/v1.0.0.info",
                200,
                br#"{"Version": "v1.0.0"}"#,
            )
            .reply(
                "https://proxy.test/example.org/b/@v/list",
                200,
                b"v2.0.0\n",
            );
        let connection = GoModulesConnection {
            urls: vec!["https://proxy.test".to_owned()],
            rate_limit: None,
            dependencies: vec!["example.org/a@v1.0.0".to_owned(), "!!!bad!!!".to_owned()],
        };
        let store = FileStore::new(vec![DependencyRepo {
            id: 1,
            scheme: "go".to_owned(),
            name: "example.org/b".to_owned(),
            version: "v2.0.0".to_owned(),
        }]);
        let reconciler = Reconciler::new(
            connection,
            "extsvc:gomodules:1",
            transport,
            Arc::new(LimiterRegistry::new()),
            store,
        );
        let (records, failures) =
            block_on_for_tests(synchronise(&reconciler, &CancellationToken::new()));
        let names: Vec<&str> = records.iter().map(|record| record.name.as_ref()).collect();
        assert_eq!(names, vec!["go/example.org/a", "go/example.org/b"]);
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], SyncError::Coordinate(_)));
    }
}
