use std::sync::Arc;

use rstest::{fixture, rstest};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use modproxy_core::DependencyStore;
use modproxy_core::test_support::{MemoryDependencyStore, go_row};

use crate::config::GoModulesConnection;
use crate::proxy::test_support::{StubTransport, block_on_for_tests};
use crate::proxy::{LimiterRegistry, ProxyTransport};

use super::{Reconciler, SyncError, SyncResult};

const PROXY: &str = "https://proxy.test";

#[fixture]
fn cancel() -> CancellationToken {
    CancellationToken::new()
}

fn connection(dependencies: &[&str]) -> GoModulesConnection {
    GoModulesConnection {
        urls: vec![PROXY.to_owned()],
        rate_limit: None,
        dependencies: dependencies.iter().map(|dep| (*dep).to_owned()).collect(),
    }
}

fn reconciler(
    dependencies: &[&str],
    transport: StubTransport,
    store: MemoryDependencyStore,
) -> Reconciler<StubTransport, MemoryDependencyStore> {
    Reconciler::new(
        connection(dependencies),
        "extsvc:gomodules:1",
        transport,
        Arc::new(LimiterRegistry::new()),
        store,
    )
}

/// Drive a full run and collect everything emitted on the channel.
///
/// Producer and consumer are joined so the bounded channel's backpressure
/// cannot deadlock the test.
fn run_collect<T: ProxyTransport, S: DependencyStore>(
    reconciler: &Reconciler<T, S>,
    cancel: &CancellationToken,
) -> Vec<SyncResult> {
    block_on_for_tests(async {
        let (results, mut collected) = mpsc::channel(4);
        let producer = async {
            reconciler.run(cancel, &results).await;
            drop(results);
        };
        let consumer = async {
            let mut out = Vec::new();
            while let Some(result) = collected.recv().await {
                out.push(result);
            }
            out
        };
        let ((), out) = tokio::join!(producer, consumer);
        out
    })
}

fn info_reply(version: &str) -> Vec<u8> {
    format!(r#"{{"Version": "{version}"}}"#).into_bytes()
}

#[rstest]
fn a_bad_coordinate_does_not_hide_the_rest_of_the_run(cancel: CancellationToken) {
    let transport = StubTransport::new().reply(
        &format!("{PROXY}/good/@v/1.0.0.info"),
        200,
        &info_reply("1.0.0"),
    );
    let engine = reconciler(
        &["good@1.0.0", "!!!invalid!!!"],
        transport,
        MemoryDependencyStore::new(Vec::new()),
    );
    let results = run_collect(&engine, &cancel);
    assert_eq!(results.len(), 2);
    let record = results[0].as_ref().expect("first dependency resolves");
    assert_eq!(record.name.as_ref(), "go/good");
    assert_eq!(record.source.urn, "extsvc:gomodules:1");
    assert!(matches!(results[1], Err(SyncError::Coordinate(_))));
}

#[rstest]
fn an_unresolvable_dependency_becomes_an_error_record(cancel: CancellationToken) {
    let engine = reconciler(
        &["example.org/gone@v9.9.9"],
        StubTransport::new(),
        MemoryDependencyStore::new(Vec::new()),
    );
    let results = run_collect(&engine, &cancel);
    assert_eq!(results.len(), 1);
    assert!(matches!(
        results[0],
        Err(SyncError::Proxy(ref error)) if error.is_not_found()
    ));
}

#[rstest]
fn configured_records_precede_tracked_records(cancel: CancellationToken) {
    let transport = StubTransport::new()
        .reply(
            &format!("{PROXY}/example.org/a/@v/v1.0.0.info"),
            200,
            &info_reply("v1.0.0"),
        )
        .reply(&format!("{PROXY}/example.org/b/@v/list"), 200, b"v2.0.0\n");
    let engine = reconciler(
        &["example.org/a@v1.0.0"],
        transport,
        MemoryDependencyStore::new(vec![go_row(1, "example.org/b", "v2.0.0")]),
    );
    let results = run_collect(&engine, &cancel);
    let names: Vec<String> = results
        .into_iter()
        .map(|result| result.expect("every item resolves").name.into_inner())
        .collect();
    assert_eq!(names, vec!["go/example.org/a", "go/example.org/b"]);
}

#[rstest]
fn pagination_stops_after_the_first_empty_page(cancel: CancellationToken) {
    // 200 rows fill exactly two pages; the third fetch returns the empty
    // page that ends the run.
    let rows = (1..=200)
        .map(|id| go_row(id, "example.org/mod", "v1.0.0"))
        .collect();
    let transport = StubTransport::new().reply(
        &format!("{PROXY}/example.org/mod/@v/list"),
        200,
        b"v1.0.0\n",
    );
    let engine = reconciler(&[], transport, MemoryDependencyStore::new(rows));
    let results = run_collect(&engine, &cancel);
    assert_eq!(results.len(), 200);
    assert_eq!(engine.store.fetch_count(), 3);
}

#[rstest]
fn one_version_list_fetch_serves_every_row_of_a_module(cancel: CancellationToken) {
    let transport = StubTransport::new().reply(
        &format!("{PROXY}/example.org/mod/@v/list"),
        200,
        b"v1.0.0\nv1.1.0\n",
    );
    let engine = reconciler(
        &[],
        transport,
        MemoryDependencyStore::new(vec![
            go_row(1, "example.org/mod", "v1.0.0"),
            go_row(2, "example.org/mod", "v1.1.0"),
        ]),
    );
    let results = run_collect(&engine, &cancel);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(engine.client().transport().requests_matching("@v/list"), 1);
}

#[rstest]
fn stale_versions_are_skipped_without_an_error(cancel: CancellationToken) {
    let transport = StubTransport::new().reply(
        &format!("{PROXY}/example.org/mod/@v/list"),
        200,
        b"v2.0.0\n",
    );
    let engine = reconciler(
        &[],
        transport,
        MemoryDependencyStore::new(vec![
            go_row(1, "example.org/mod", "v1.0.0"),
            go_row(2, "example.org/mod", "v2.0.0"),
        ]),
    );
    let results = run_collect(&engine, &cancel);
    assert_eq!(results.len(), 1);
    let record = results[0].as_ref().expect("current version resolves");
    assert_eq!(record.name.as_ref(), "go/example.org/mod");
}

#[rstest]
fn malformed_rows_are_skipped_without_an_error(cancel: CancellationToken) {
    let transport = StubTransport::new().reply(
        &format!("{PROXY}/example.org/mod/@v/list"),
        200,
        b"v1.0.0\n",
    );
    let engine = reconciler(
        &[],
        transport,
        MemoryDependencyStore::new(vec![
            go_row(1, "!!!not a module path!!!", "v1.0.0"),
            go_row(2, "example.org/mod", "v1.0.0"),
        ]),
    );
    let results = run_collect(&engine, &cancel);
    assert_eq!(results.len(), 1);
    assert!(results[0].is_ok());
}

#[rstest]
fn a_failed_version_list_is_not_retried(cancel: CancellationToken) {
    // The stub answers 404 for the unscripted list URL; the failure is
    // cached so the second row does not refetch.
    let engine = reconciler(
        &[],
        StubTransport::new(),
        MemoryDependencyStore::new(vec![
            go_row(1, "example.org/mod", "v1.0.0"),
            go_row(2, "example.org/mod", "v1.1.0"),
        ]),
    );
    let results = run_collect(&engine, &cancel);
    assert!(results.is_empty());
    assert_eq!(engine.client().transport().requests_matching("@v/list"), 1);
}

#[rstest]
fn a_store_failure_ends_the_run_after_the_configured_list(cancel: CancellationToken) {
    let transport = StubTransport::new().reply(
        &format!("{PROXY}/example.org/a/@v/v1.0.0.info"),
        200,
        &info_reply("v1.0.0"),
    );
    let engine = reconciler(
        &["example.org/a@v1.0.0"],
        transport,
        MemoryDependencyStore::failing("connection refused"),
    );
    let results = run_collect(&engine, &cancel);
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(SyncError::Store(_))));
    assert_eq!(engine.store.fetch_count(), 1);
}

#[rstest]
fn cancellation_before_the_run_emits_a_single_cancelled_error(cancel: CancellationToken) {
    let engine = reconciler(
        &["example.org/a@v1.0.0"],
        StubTransport::new(),
        MemoryDependencyStore::new(vec![go_row(1, "example.org/b", "v1.0.0")]),
    );
    cancel.cancel();
    let results = run_collect(&engine, &cancel);
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Err(SyncError::Cancelled)));
    assert!(engine.client().transport().requests().is_empty());
}

#[rstest]
fn resolve_repo_confirms_the_module_upstream(cancel: CancellationToken) {
    let transport = StubTransport::new().reply(
        &format!("{PROXY}/example.org/mod/@v/list"),
        200,
        b"v1.0.0\n",
    );
    let engine = reconciler(&[], transport, MemoryDependencyStore::new(Vec::new()));
    let record = block_on_for_tests(engine.resolve_repo("go/example.org/mod", &cancel))
        .expect("known module resolves");
    assert_eq!(record.name.as_ref(), "go/example.org/mod");
    assert_eq!(record.uri, "go/example.org/mod");
}

#[rstest]
fn resolve_repo_reports_unknown_modules(cancel: CancellationToken) {
    let engine = reconciler(&[], StubTransport::new(), MemoryDependencyStore::new(Vec::new()));
    let outcome = block_on_for_tests(engine.resolve_repo("go/example.org/mod", &cancel));
    assert!(matches!(
        outcome,
        Err(SyncError::Proxy(ref error)) if error.is_not_found()
    ));
}

#[rstest]
fn resolve_repo_rejects_malformed_names(cancel: CancellationToken) {
    let engine = reconciler(&[], StubTransport::new(), MemoryDependencyStore::new(Vec::new()));
    let outcome = block_on_for_tests(engine.resolve_repo("go/!!!invalid!!!", &cancel));
    assert!(matches!(outcome, Err(SyncError::Coordinate(_))));
}
