use metergate_ledger::{
    Error, MemoryUsageStore, SqliteUsageStore, StoreOptions, UsageLedger, UsageStore,
};
use std::path::PathBuf;
use std::sync::Arc;

async fn sqlite_ledger() -> UsageLedger {
    let store = SqliteUsageStore::in_memory().await.unwrap();
    UsageLedger::new(Arc::new(store))
}

fn temp_db_path(name: &str) -> PathBuf {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    std::env::temp_dir()
        .join(format!("metergate-{}-{}", std::process::id(), nanos))
        .join(format!("{name}.db"))
}

#[tokio::test]
async fn test_record_then_recent_returns_same_values() {
    let ledger = sqlite_ledger().await;

    let recorded = ledger.record_usage("u1", "gpt-4", 12, 34).await.unwrap();
    let recent = ledger.recent_usage("u1", 1).await.unwrap();

    assert_eq!(recent.len(), 1);
    let event = &recent[0];
    assert_eq!(event.user_id, "u1");
    assert_eq!(event.model_name, "gpt-4");
    assert_eq!(event.input_tokens, 12);
    assert_eq!(event.output_tokens, 34);
    assert_eq!(event.id, recorded.id);
    assert_eq!(event.timestamp, recorded.timestamp);
}

#[tokio::test]
async fn test_aggregate_equals_arithmetic_sum() {
    let ledger = sqlite_ledger().await;
    let inputs = [5_i64, 0, 17, 1_000_000, 3];
    let outputs = [1_i64, 2, 0, 999, 40];

    for (input, output) in inputs.iter().zip(outputs.iter()) {
        ledger
            .record_usage("u1", "claude", *input, *output)
            .await
            .unwrap();
    }

    let usage = ledger.query_usage("u1").await.unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].input_tokens, inputs.iter().sum::<i64>());
    assert_eq!(usage[0].output_tokens, outputs.iter().sum::<i64>());
    assert_eq!(usage[0].request_count, inputs.len() as i64);
}

#[tokio::test]
async fn test_no_cross_user_leakage() {
    let ledger = sqlite_ledger().await;
    ledger.record_usage("A", "gpt-4", 10, 10).await.unwrap();
    ledger.record_usage("AB", "gpt-4", 1, 1).await.unwrap();

    let b = ledger.query_usage("B").await.unwrap();
    assert!(b.is_empty());
    assert!(ledger.recent_usage("B", 10).await.unwrap().is_empty());

    let a = ledger.query_usage("A").await.unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].input_tokens, 10);
}

#[tokio::test]
async fn test_query_is_idempotent() {
    let ledger = sqlite_ledger().await;
    ledger.record_usage("u1", "gpt-4", 10, 50).await.unwrap();
    ledger.record_usage("u1", "gpt-3", 2, 2).await.unwrap();

    let first = ledger.query_usage("u1").await.unwrap();
    let second = ledger.query_usage("u1").await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_validation_leaves_ledger_untouched() {
    let store = Arc::new(MemoryUsageStore::new());
    let ledger = UsageLedger::new(store.clone());

    let err = ledger.record_usage("", "gpt-4", 5, 5).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    let err = ledger.record_usage("u1", "gpt-4", -1, 5).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    assert!(store.is_empty().await);
    assert!(ledger.query_usage("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concrete_scenario_on_sqlite() {
    let ledger = sqlite_ledger().await;
    ledger.record_usage("u1", "gpt-4", 10, 50).await.unwrap();
    ledger.record_usage("u1", "gpt-4", 3, 20).await.unwrap();
    ledger.record_usage("u1", "gpt-3", 2, 2).await.unwrap();

    let usage = ledger.query_usage("u1").await.unwrap();
    let find = |model: &str| {
        usage
            .iter()
            .find(|a| a.model_name == model)
            .map(|a| (a.input_tokens, a.output_tokens))
    };

    assert_eq!(usage.len(), 2);
    assert_eq!(find("gpt-4"), Some((13, 70)));
    assert_eq!(find("gpt-3"), Some((2, 2)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_records_on_file_store() {
    let path = temp_db_path("concurrent");
    let store = SqliteUsageStore::from_path(&path, StoreOptions::default())
        .await
        .unwrap();
    let ledger = UsageLedger::new(Arc::new(store));

    let tasks: Vec<_> = (0..40)
        .map(|i| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                let model = if i % 2 == 0 { "gpt-4" } else { "gpt-3" };
                ledger.record_usage("u1", model, i, 2 * i).await
            })
        })
        .collect();

    for task in futures::future::join_all(tasks).await {
        task.unwrap().unwrap();
    }

    let usage = ledger.query_usage("u1").await.unwrap();
    let total_input: i64 = usage.iter().map(|a| a.input_tokens).sum();
    let total_output: i64 = usage.iter().map(|a| a.output_tokens).sum();
    let total_requests: i64 = usage.iter().map(|a| a.request_count).sum();

    assert_eq!(total_requests, 40);
    assert_eq!(total_input, (0..40).sum::<i64>());
    assert_eq!(total_output, 2 * (0..40).sum::<i64>());

    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let path = temp_db_path("reopen");

    {
        let store = SqliteUsageStore::from_path(&path, StoreOptions::default())
            .await
            .unwrap();
        store
            .append(metergate_ledger::NewUsage::new("u1", "gpt-4", 10, 50))
            .await
            .unwrap();
        store.pool().close().await;
    }

    let reopened = SqliteUsageStore::from_path(&path, StoreOptions::default())
        .await
        .unwrap();
    let usage = reopened.aggregate_by_user("u1").await.unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].output_tokens, 50);

    reopened.pool().close().await;
    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}
