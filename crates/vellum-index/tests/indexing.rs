use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use vellum_index::store::{EmbeddingStore, InMemoryStore, SqliteStore};
use vellum_index::{IndexService, ServiceConfig};
use vellum_llm::mock::MockEmbedder;

const GREETER_TS: &str = "\
function greet(name: string): string {
  return `Hello, ${name}`;
}

interface User {
  id: number;
  name: string;
}
";

const MATH_PY: &str = "\
def add(a, b):
    return a + b

def multiply(a, b):
    return a * b
";

const README_MD: &str = "\
# Project

This project demonstrates semantic indexing of a small tree.
";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn bump_mtime(path: &Path) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
}

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/greet.ts", GREETER_TS);
    write(dir.path(), "lib/math.py", MATH_PY);
    write(dir.path(), "README.md", README_MD);
    dir
}

async fn memory_service(
    root: &Path,
    provider: MockEmbedder,
) -> Arc<IndexService<MockEmbedder, InMemoryStore>> {
    IndexService::initialize(ServiceConfig::new(root), provider, InMemoryStore::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn indexing_is_idempotent() {
    let dir = project();
    let provider = MockEmbedder::new();
    let service = memory_service(dir.path(), provider.clone()).await;

    let first = service.process_codebase().await.unwrap();
    assert_eq!(first.total_files, 3);
    assert_eq!(first.processed_files, 3);
    assert!(first.errors.is_empty());
    let snapshot = service.store().scan_all().await.unwrap();
    let calls = provider.calls();

    let second = service.process_codebase().await.unwrap();
    assert_eq!(second.processed_files, 0);
    assert_eq!(second.skipped_files, 3);
    assert_eq!(provider.calls(), calls);

    let after = service.store().scan_all().await.unwrap();
    assert_eq!(snapshot, after);
}

#[tokio::test]
async fn modified_file_is_the_only_one_reembedded() {
    let dir = project();
    let provider = MockEmbedder::new();
    let service = memory_service(dir.path(), provider.clone()).await;
    service.process_codebase().await.unwrap();

    let untouched_before = [
        service.get_embeddings_by_path("src/greet.ts").await.unwrap(),
        service.get_embeddings_by_path("README.md").await.unwrap(),
    ];
    let calls_before = provider.calls();

    let math = dir.path().join("lib/math.py");
    std::fs::write(
        &math,
        "def subtract(a, b):\n    return a - b\n\ndef divide(a, b):\n    return a / b\n",
    )
    .unwrap();
    bump_mtime(&math);

    let stats = service.process_codebase().await.unwrap();
    assert_eq!(stats.processed_files, 1);
    assert_eq!(stats.skipped_files, 2);
    assert_eq!(stats.processed_chunks, 2);
    assert_eq!(provider.calls(), calls_before + 2);

    let untouched_after = [
        service.get_embeddings_by_path("src/greet.ts").await.unwrap(),
        service.get_embeddings_by_path("README.md").await.unwrap(),
    ];
    for (before, after) in untouched_before.iter().zip(&untouched_after) {
        let stamps = |records: &[vellum_index::record::EmbeddingRecord]| {
            records.iter().map(|r| r.updated_at).collect::<Vec<_>>()
        };
        assert_eq!(stamps(before), stamps(after));
    }

    let names: Vec<Option<String>> = service
        .get_embeddings_by_path("lib/math.py")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.metadata.name)
        .collect();
    assert_eq!(
        names,
        vec![Some("subtract".to_owned()), Some("divide".to_owned())]
    );
}

#[tokio::test]
async fn touched_but_unchanged_file_is_not_reembedded() {
    let dir = project();
    let provider = MockEmbedder::new();
    let service = memory_service(dir.path(), provider.clone()).await;
    service.process_codebase().await.unwrap();
    let calls = provider.calls();

    bump_mtime(&dir.path().join("README.md"));
    let stats = service.process_codebase().await.unwrap();
    assert_eq!(stats.processed_files, 0);
    assert_eq!(stats.skipped_files, 3);
    assert_eq!(provider.calls(), calls);

    let again = service.process_codebase().await.unwrap();
    assert_eq!(again.skipped_files, 3);
}

#[tokio::test]
async fn deleted_file_is_pruned_and_delete_is_complete() {
    let dir = project();
    let service = memory_service(dir.path(), MockEmbedder::new()).await;
    service.process_codebase().await.unwrap();

    std::fs::remove_file(dir.path().join("lib/math.py")).unwrap();
    let stats = service.process_codebase().await.unwrap();
    assert_eq!(stats.removed_files, 1);
    assert!(service.get_embeddings_by_path("lib/math.py").await.unwrap().is_empty());

    let removed = service.delete_embeddings_by_path("src/greet.ts").await.unwrap();
    assert_eq!(removed, 2);
    assert!(service.get_embeddings_by_path("src/greet.ts").await.unwrap().is_empty());
    let all = service.store().scan_all().await.unwrap();
    assert!(all.iter().all(|r| r.file_path != "src/greet.ts"));
}

#[tokio::test]
async fn search_returns_top_k_in_order() {
    let dir = project();
    let service = memory_service(dir.path(), MockEmbedder::new().with_dimensions(4096)).await;
    service.process_codebase().await.unwrap();
    let total = service.get_stats().await.unwrap().total_embeddings;
    assert_eq!(total, 5);

    let hits = service.search_similar("greet user name", 3).await.unwrap();
    assert_eq!(hits.len(), 3);
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    assert_eq!(hits[0].record.file_path, "src/greet.ts");

    let all = service.search_similar("greet", 50).await.unwrap();
    assert_eq!(all.len(), 5);
}

#[tokio::test]
async fn relevant_chunks_rank_above_unrelated_ones() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "ui/button.md",
        "# Button\n\nA react component that renders a clickable react button component.\n",
    );
    write(
        dir.path(),
        "ui/modal.md",
        "# Modal\n\nThis react component shows a modal dialog; every react component here is typed.\n",
    );
    write(
        dir.path(),
        "ui/list.md",
        "# List\n\nReusable react component for rendering list items as a component tree.\n",
    );
    write(
        dir.path(),
        "db/schema.md",
        "# Schema\n\nPostgres tables, migrations and indexes for billing records.\n",
    );
    write(
        dir.path(),
        "ops/deploy.md",
        "# Deploy\n\nShip containers to the cluster with rolling upgrades nightly.\n",
    );
    let service = memory_service(dir.path(), MockEmbedder::new().with_dimensions(4096)).await;
    service.process_codebase().await.unwrap();

    let hits = service.search_similar("react component", 5).await.unwrap();
    assert!(hits.len() <= 5);
    let top: Vec<&str> = hits
        .iter()
        .take(3)
        .map(|h| h.record.file_path.as_str())
        .collect();
    for path in ["ui/button.md", "ui/modal.md", "ui/list.md"] {
        assert!(top.contains(&path), "{path} not in top 3: {top:?}");
    }
}

#[tokio::test]
async fn failing_chunk_is_recorded_and_rest_of_file_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "src/mixed.ts",
        "\
function stable() {
  return 'this chunk embeds fine';
}

function broken() {
  return 'EXPLODE during embedding';
}
",
    );
    let service = memory_service(dir.path(), MockEmbedder::failing_on("EXPLODE")).await;

    let stats = service.process_codebase().await.unwrap();
    assert_eq!(stats.total_chunks, 2);
    assert_eq!(stats.processed_chunks, 1);
    assert_eq!(stats.processed_files, 1);
    assert_eq!(stats.errors.len(), 1);
    assert!(stats.errors[0].contains("src/mixed.ts"));

    let records = service.get_embeddings_by_path("src/mixed.ts").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].metadata.name.as_deref(), Some("stable"));
    assert!(records[0].file_hash.is_empty());

    let retry = service.process_codebase().await.unwrap();
    assert_eq!(retry.skipped_files, 0);
    assert_eq!(retry.errors.len(), 1);
}

#[tokio::test]
async fn unavailable_service_errors_are_collected_not_raised() {
    let dir = project();
    let service = memory_service(dir.path(), MockEmbedder::unavailable()).await;

    let stats = service.process_codebase().await.unwrap();
    assert_eq!(stats.total_files, 3);
    assert_eq!(stats.processed_files, 0);
    assert_eq!(stats.errors.len(), 5);
    assert_eq!(service.get_stats().await.unwrap().total_embeddings, 0);
}

#[tokio::test]
async fn rebuild_reembeds_everything() {
    let dir = project();
    let provider = MockEmbedder::new();
    let service = memory_service(dir.path(), provider.clone()).await;
    service.process_codebase().await.unwrap();
    let calls = provider.calls();

    let stats = service.rebuild().await.unwrap();
    assert_eq!(stats.processed_files, 3);
    assert_eq!(provider.calls(), calls * 2);
    assert_eq!(service.get_stats().await.unwrap().total_embeddings, 5);
}

#[tokio::test]
async fn cancelled_run_stops_and_keeps_existing_records() {
    let dir = project();
    let service = memory_service(dir.path(), MockEmbedder::new()).await;
    service.process_codebase().await.unwrap();
    std::fs::remove_file(dir.path().join("README.md")).unwrap();

    let token = service.cancellation_token();
    token.cancel();
    let stats = service.process_codebase_with(&token).await.unwrap();
    assert!(stats.cancelled);
    assert_eq!(stats.removed_files, 0);
    assert_eq!(service.get_embeddings_by_path("README.md").await.unwrap().len(), 1);
}

#[tokio::test]
async fn clear_all_embeddings_empties_store() {
    let dir = project();
    let service = memory_service(dir.path(), MockEmbedder::new()).await;
    service.process_codebase().await.unwrap();

    assert_eq!(service.clear_all_embeddings().await.unwrap(), 5);
    let stats = service.get_stats().await.unwrap();
    assert_eq!(stats.total_embeddings, 0);
    assert_eq!(stats.unique_files, 0);
}

#[tokio::test]
async fn sqlite_backend_runs_full_pipeline() {
    let dir = project();
    let store = SqliteStore::open(":memory:").await.unwrap();
    let service = IndexService::initialize(
        ServiceConfig::new(dir.path()),
        MockEmbedder::new().with_dimensions(4096),
        store,
    )
    .await
    .unwrap();

    let stats = service.process_codebase().await.unwrap();
    assert_eq!(stats.processed_files, 3);

    let again = service.process_codebase().await.unwrap();
    assert_eq!(again.skipped_files, 3);

    let hits = service.search_similar("multiply", 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.file_path, "lib/math.py");
    assert_eq!(hits[0].record.metadata.name.as_deref(), Some("multiply"));

    let stats = service.get_stats().await.unwrap();
    assert_eq!(stats.total_embeddings, 5);
    assert_eq!(stats.unique_files, 3);

    service.shutdown().await.unwrap();
}
