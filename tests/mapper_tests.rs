/// Persistence Facade Tests
///
/// Tests save/find/query behaviour of the mapper against the in-memory store.
use aws_sdk_dynamodb::types::AttributeValue;
use std::sync::Arc;

mod helpers;
use dynamo_mapper::{Marshaler, NumericStringCodec};
use helpers::*;

/// Test saving a message and reading it back by full key
#[tokio::test]
async fn test_save_and_find() {
    let messages = memory_messages().await;
    let msg = message("rust", 10, "ana");

    assert!(messages.save(&msg, &PutOptions::default()).await);

    let got = messages
        .find(&"rust".to_string(), Some(&10))
        .await
        .unwrap();
    assert_eq!(got, Some(msg));
}

/// Test that unset optional attributes come back unset
#[tokio::test]
async fn test_sparse_round_trip() {
    let messages = memory_messages().await;
    let msg = Message {
        thread_id: "rust".into(),
        posted_at: 1,
        author: None,
        body: Some("anonymous".into()),
        score: None,
    };

    messages
        .save_or_fail(&msg, &PutOptions::default())
        .await
        .unwrap();

    let got = messages
        .find_or_fail(&"rust".to_string(), Some(&1))
        .await
        .unwrap();
    assert_eq!(got, msg);
    assert_eq!(got.author, None);
}

/// Test that a later save with the same key replaces the record
#[tokio::test]
async fn test_save_replaces_existing_record() {
    let messages = memory_messages().await;
    let mut msg = message("rust", 10, "ana");
    messages
        .save_or_fail(&msg, &PutOptions::default())
        .await
        .unwrap();

    msg.body = Some("edited".into());
    msg.score = Some(3);
    messages
        .save_or_fail(&msg, &PutOptions::default())
        .await
        .unwrap();

    let all = messages.find_all(&"rust".to_string()).await.unwrap();
    assert_eq!(all, vec![msg]);
}

/// Test that find reports absence and find_or_fail names table and keys
#[tokio::test]
async fn test_find_missing_record() {
    let messages = memory_messages().await;

    let got = messages.find(&"go".to_string(), Some(&99)).await.unwrap();
    assert!(got.is_none());

    let err = messages
        .find_or_fail(&"go".to_string(), Some(&99))
        .await
        .unwrap_err();
    assert!(err.is_record_not_found());

    let text = err.to_string();
    assert!(text.contains("messages"), "{}", text);
    assert!(text.contains("go"), "{}", text);
    assert!(text.contains("99"), "{}", text);
}

/// Test that a range table refuses keys without a range value
#[tokio::test]
async fn test_find_requires_range_value() {
    let messages = memory_messages().await;

    let err = messages.find(&"rust".to_string(), None).await.unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}

/// Test that find_all returns a partition in ascending range order
#[tokio::test]
async fn test_find_all_orders_by_range_key() {
    let messages = memory_messages().await;
    for posted_at in [30, 10, 20] {
        messages
            .save_or_fail(&message("rust", posted_at, "ana"), &PutOptions::default())
            .await
            .unwrap();
    }
    messages
        .save_or_fail(&message("go", 15, "bo"), &PutOptions::default())
        .await
        .unwrap();

    let all = messages.find_all(&"rust".to_string()).await.unwrap();
    let times: Vec<u64> = all.iter().map(|msg| msg.posted_at).collect();
    assert_eq!(times, vec![10, 20, 30]);
}

/// Test each range operator against the same partition
#[tokio::test]
async fn test_query_range_operators() {
    let messages = memory_messages().await;
    for posted_at in 1..=6 {
        messages
            .save_or_fail(&message("rust", posted_at, "ana"), &PutOptions::default())
            .await
            .unwrap();
    }
    let thread = "rust".to_string();

    let cases: Vec<(&str, Vec<u64>, Vec<u64>)> = vec![
        ("between", vec![2, 4], vec![2, 3, 4]),
        ("=", vec![5], vec![5]),
        ("<", vec![3], vec![1, 2]),
        ("<=", vec![3], vec![1, 2, 3]),
        (">", vec![4], vec![5, 6]),
        (">=", vec![4], vec![4, 5, 6]),
    ];

    for (operator, operands, expected) in cases {
        let condition = RangeCondition::from_values(operator, &operands).unwrap();
        let found = messages.query(&thread, Some(condition)).await.unwrap();
        let times: Vec<u64> = found.iter().map(|msg| msg.posted_at).collect();
        assert_eq!(times, expected, "operator {}", operator);
    }
}

/// Test descending order through query options
#[tokio::test]
async fn test_query_descending() {
    let messages = memory_messages().await;
    for posted_at in 1..=3 {
        messages
            .save_or_fail(&message("rust", posted_at, "ana"), &PutOptions::default())
            .await
            .unwrap();
    }

    let options = QueryOptions {
        scan_index_forward: Some(false),
        ..QueryOptions::default()
    };
    let found = messages
        .query_with(&"rust".to_string(), None, options)
        .await
        .unwrap();
    let times: Vec<u64> = found.iter().map(|msg| msg.posted_at).collect();
    assert_eq!(times, vec![3, 2, 1]);
}

/// Test querying a global index by its own hash key
#[tokio::test]
async fn test_query_global_index() {
    let messages = memory_messages().await;
    messages
        .save_or_fail(&message("rust", 1, "ana"), &PutOptions::default())
        .await
        .unwrap();
    messages
        .save_or_fail(&message("go", 2, "ana"), &PutOptions::default())
        .await
        .unwrap();
    messages
        .save_or_fail(&message("go", 3, "bo"), &PutOptions::default())
        .await
        .unwrap();

    let by_ana = messages.query_index("by_author", "ana", None).await.unwrap();
    let threads: Vec<&str> = by_ana.iter().map(|msg| msg.thread_id.as_str()).collect();
    assert_eq!(threads, vec!["rust", "go"]);

    let after_one = messages
        .query_index(
            "by_author",
            "ana",
            Some(RangeCondition::from_values(">", &[1u64]).unwrap()),
        )
        .await
        .unwrap();
    assert_eq!(after_one.len(), 1);
    assert_eq!(after_one[0].thread_id, "go");
}

/// Test that a local index only sees items carrying its range key
#[tokio::test]
async fn test_query_local_index_is_sparse() {
    let messages = memory_messages().await;
    let mut scored = message("rust", 1, "ana");
    scored.score = Some(50);
    let mut low = message("rust", 2, "bo");
    low.score = Some(7);
    let unscored = message("rust", 3, "cy");

    for msg in [&scored, &low, &unscored] {
        messages
            .save_or_fail(msg, &PutOptions::default())
            .await
            .unwrap();
    }

    let by_score = messages
        .query_index("by_score", "rust", None)
        .await
        .unwrap();
    assert_eq!(by_score, vec![low, scored]);
}

/// Test that malformed conditions and unknown indexes fail before the store is called
#[tokio::test]
async fn test_query_errors_before_store_call() {
    let store = CountingStore::new();
    let messages: Mapper<Message, _> = setup::register(store.clone(), message_schema("messages"))
        .await
        .unwrap();

    let err = RangeCondition::from_values("unknown_op", &[1u64]).unwrap_err();
    assert!(matches!(err, Error::InvalidQueryOperator(_)));

    let err = RangeCondition::from_values("between", &[1u64]).unwrap_err();
    assert!(matches!(err, Error::InvalidOperandCount { .. }));

    let err = messages
        .query_index("by_nothing", "ana", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::IndexNotFound(_)));

    assert_eq!(store.queries(), 0);
}

/// Test that invalid records never reach the store
#[tokio::test]
async fn test_invalid_record_is_not_written() {
    let store = CountingStore::new();
    let messages: Mapper<Message, _> = setup::register(store.clone(), message_schema("messages"))
        .await
        .unwrap();
    let mut msg = message("rust", 1, "ana");
    msg.body = None;

    assert!(!messages.save(&msg, &PutOptions::default()).await);

    let err = messages
        .save_or_fail(&msg, &PutOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_record_not_saved());
    assert!(std::error::Error::source(&err).is_none());

    assert_eq!(store.puts(), 0);
}

/// Test that store failures are swallowed by save and wrapped by save_or_fail
#[tokio::test]
async fn test_store_failure_on_save() {
    let store = CountingStore::new();
    let messages: Mapper<Message, _> = setup::register(store.clone(), message_schema("messages"))
        .await
        .unwrap();
    store.fail_puts(true);
    let msg = message("rust", 1, "ana");

    assert!(!messages.save(&msg, &PutOptions::default()).await);

    let err = messages
        .save_or_fail(&msg, &PutOptions::default())
        .await
        .unwrap_err();
    match err {
        Error::RecordNotSaved {
            source: Some(source),
            ..
        } => assert!(matches!(*source, Error::Validation(_))),
        other => panic!("unexpected error: {:?}", other),
    }

    assert_eq!(store.puts(), 2);
    assert_eq!(store.inner().item_count("messages").await.unwrap(), 0);
}

/// Test that key values pass through the codec of their declared type
#[tokio::test]
async fn test_numeric_codec_applies_to_keys() {
    let store = MemoryStore::new();
    let marshaler =
        Arc::new(Marshaler::new().with_codec(AttributeType::Numeric, NumericStringCodec));
    let accounts: Mapper<Account, _> =
        setup::register_with(store.clone(), account_schema("accounts"), marshaler)
            .await
            .unwrap();

    let account = Account {
        account_no: "1024".into(),
        owner: "ana".into(),
        balance: "10.5".into(),
    };
    accounts
        .save_or_fail(&account, &PutOptions::default())
        .await
        .unwrap();

    let got = accounts
        .find_or_fail(&"1024".to_string(), None)
        .await
        .unwrap();
    assert_eq!(got, account);

    let stored = store
        .get_item(
            "accounts",
            Item::from([("account_no".to_string(), AttributeValue::N("1024".into()))]),
            &GetOptions::default(),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["balance"], AttributeValue::N("10.5".into()));
}

/// Test that a non-numeric string in a numeric attribute is not saved
#[tokio::test]
async fn test_numeric_codec_rejects_text() {
    let marshaler =
        Arc::new(Marshaler::new().with_codec(AttributeType::Numeric, NumericStringCodec));
    let accounts: Mapper<Account, _> =
        setup::register_with(MemoryStore::new(), account_schema("accounts"), marshaler)
            .await
            .unwrap();

    let account = Account {
        account_no: "1024".into(),
        owner: "ana".into(),
        balance: "a lot".into(),
    };

    let err = accounts
        .save_or_fail(&account, &PutOptions::default())
        .await
        .unwrap_err();
    match err {
        Error::RecordNotSaved {
            source: Some(source),
            ..
        } => assert!(matches!(*source, Error::Codec(_))),
        other => panic!("unexpected error: {:?}", other),
    }
}
