//! Integration tests for the per-owner ledger
//!
//! Tests initialize, verify, charge, set_credit and usage against PostgreSQL.

use pretty_assertions::assert_eq;
use sponsorgate::error::AppError;
use sponsorgate::models::{InitializeOwner, OwnerProfile};
use sponsorgate::services::LedgerService;

use crate::common::{new_charge, utc, OwnerBuilder, TestDb};

// =============================================================================
// Initialize Tests
// =============================================================================

#[actix_web::test]
async fn test_initialize_creates_owner_with_defaults() {
    let db = TestDb::new().await;

    let owner = OwnerBuilder::new("42").create(&db.pool).await;

    assert_eq!(owner.owner_id, "42");
    assert_eq!(owner.owner_login, "login-42");
    assert_eq!(owner.clv, 0);
    assert_eq!(owner.spent, 0);
    assert_eq!(owner.balance, 0);
    assert!(!owner.is_sponsor);
    assert!(!owner.is_authenticated);
}

#[actix_web::test]
async fn test_initialize_with_token_marks_authenticated() {
    let db = TestDb::new().await;

    OwnerBuilder::new("42").create(&db.pool).await;
    let owner = OwnerBuilder::new("42").with_token("tok").create(&db.pool).await;
    assert!(owner.is_authenticated);

    // A later profile-only update keeps the flag
    let owner = OwnerBuilder::new("42").with_bio("bio").create(&db.pool).await;
    assert!(owner.is_authenticated);

    let fresh = OwnerBuilder::new("7").with_token("tok-7").create(&db.pool).await;
    assert!(fresh.is_authenticated);
}

#[actix_web::test]
async fn test_initialize_preserves_omitted_fields() {
    let db = TestDb::new().await;

    OwnerBuilder::new("42")
        .with_clv(500)
        .with_spent(120)
        .with_email("a@example.com")
        .with_source("https://uithub.com/login")
        .sponsor()
        .create(&db.pool)
        .await;

    let updated = OwnerBuilder::new("42")
        .with_bio("new bio")
        .with_source("https://other.dev/")
        .create(&db.pool)
        .await;

    assert_eq!(updated.clv, 500);
    assert_eq!(updated.spent, 120);
    assert_eq!(updated.balance, 380);
    assert_eq!(updated.email.as_deref(), Some("a@example.com"));
    assert_eq!(updated.bio.as_deref(), Some("new bio"));
    assert!(updated.is_sponsor);
    // First-seen source is kept
    assert_eq!(updated.source.as_deref(), Some("https://uithub.com/login"));
}

#[actix_web::test]
async fn test_initialize_is_idempotent() {
    let db = TestDb::new().await;

    let first = OwnerBuilder::new("42").with_clv(100).create(&db.pool).await;
    let second = OwnerBuilder::new("42").with_clv(100).create(&db.pool).await;

    assert_eq!(first.clv, second.clv);
    assert_eq!(first.spent, second.spent);
    assert_eq!(first.created_at, second.created_at);
    assert!(second.updated_at >= first.updated_at);
}

#[actix_web::test]
async fn test_initialize_rejects_mismatched_owner() {
    let db = TestDb::new().await;

    let input = InitializeOwner {
        sponsor: OwnerProfile::new("7", "someone"),
        access_token: None,
        scope: None,
        source: None,
    };

    let result = LedgerService::initialize(&db.pool, "42", input).await;

    assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    assert!(LedgerService::get_owner(&db.pool, "42").await.unwrap().is_none());
}

// =============================================================================
// Verify Tests
// =============================================================================

#[actix_web::test]
async fn test_verify_registered_token() {
    let db = TestDb::new().await;

    OwnerBuilder::new("42")
        .with_token("tok-1")
        .with_scope("user:email")
        .create(&db.pool)
        .await;

    let owner = LedgerService::verify(&db.pool, "42", "tok-1").await.unwrap();
    assert_eq!(owner.owner_id, "42");

    let tokens = LedgerService::list_tokens(&db.pool, "42").await.unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].scope.as_deref(), Some("user:email"));
    assert!(tokens[0].last_used_at.is_some());
}

#[actix_web::test]
async fn test_verify_unknown_token() {
    let db = TestDb::new().await;

    OwnerBuilder::new("42").with_token("tok-1").create(&db.pool).await;

    let result = LedgerService::verify(&db.pool, "42", "tok-2").await;

    assert!(matches!(result, Err(AppError::InvalidToken(_))));
}

#[actix_web::test]
async fn test_verify_token_of_other_owner_misses() {
    let db = TestDb::new().await;

    OwnerBuilder::new("1").with_token("tok-a").create(&db.pool).await;
    OwnerBuilder::new("2").with_token("tok-b").create(&db.pool).await;

    let result = LedgerService::verify(&db.pool, "2", "tok-a").await;

    assert!(matches!(result, Err(AppError::InvalidToken(_))));
}

// =============================================================================
// Charge Tests
// =============================================================================

#[actix_web::test]
async fn test_charge_applies_once_per_key() {
    let db = TestDb::new().await;

    OwnerBuilder::new("42").with_clv(1000).create(&db.pool).await;

    let first = LedgerService::charge(&db.pool, "42", new_charge(30, "req-1", None))
        .await
        .unwrap();
    let replay = LedgerService::charge(&db.pool, "42", new_charge(30, "req-1", None))
        .await
        .unwrap();

    assert!(first.applied);
    assert!(!replay.applied);
    assert_eq!(first.owner, replay.owner);
    assert_eq!(first.charge, replay.charge);
    assert_eq!(replay.owner.spent, 30);
    assert_eq!(replay.owner.balance, 970);

    let charges = LedgerService::list_charges(&db.pool, "42").await.unwrap();
    assert_eq!(charges.len(), 1);
}

#[actix_web::test]
async fn test_charge_allows_overdraft() {
    let db = TestDb::new().await;

    OwnerBuilder::new("42").with_clv(100).create(&db.pool).await;

    let outcome = LedgerService::charge(&db.pool, "42", new_charge(150, "big", None))
        .await
        .unwrap();

    assert_eq!(outcome.owner.spent, 150);
    assert_eq!(outcome.owner.balance, -50);
}

#[actix_web::test]
async fn test_charge_before_initialize() {
    let db = TestDb::new().await;

    let result = LedgerService::charge(&db.pool, "missing", new_charge(1, "k", None)).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(LedgerService::list_charges(&db.pool, "missing")
        .await
        .unwrap()
        .is_empty());
}

#[actix_web::test]
async fn test_charge_rejects_invalid_input() {
    let db = TestDb::new().await;

    OwnerBuilder::new("42").create(&db.pool).await;

    for amount in [0, -5] {
        let result = LedgerService::charge(&db.pool, "42", new_charge(amount, "k", None)).await;
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    let result = LedgerService::charge(&db.pool, "42", new_charge(5, "", None)).await;
    assert!(matches!(result, Err(AppError::InvalidArgument(_))));
}

#[actix_web::test]
async fn test_concurrent_charges_are_serialized() {
    let db = TestDb::new().await;

    OwnerBuilder::new("42").with_clv(10_000).create(&db.pool).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let pool = db.pool.clone();
        handles.push(tokio::spawn(async move {
            // Every key is sent twice
            let key = format!("req-{}", i % 10);
            LedgerService::charge(&pool, "42", new_charge(7, &key, None)).await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().applied {
            applied += 1;
        }
    }

    let owner = LedgerService::get_owner(&db.pool, "42").await.unwrap().unwrap();
    assert_eq!(applied, 10);
    assert_eq!(owner.spent, 70);
}

// =============================================================================
// Set Credit Tests
// =============================================================================

#[actix_web::test]
async fn test_set_credit_overwrites_clv_only() {
    let db = TestDb::new().await;

    OwnerBuilder::new("42")
        .with_clv(500)
        .with_spent(200)
        .create(&db.pool)
        .await;

    let owner = LedgerService::set_credit(&db.pool, "42", 100.0).await.unwrap();

    assert_eq!(owner.clv, 100);
    assert_eq!(owner.spent, 200);
    assert_eq!(owner.balance, -100);
}

#[actix_web::test]
async fn test_set_credit_rounds_to_cents() {
    let db = TestDb::new().await;

    OwnerBuilder::new("42").create(&db.pool).await;

    let owner = LedgerService::set_credit(&db.pool, "42", 249.6).await.unwrap();

    assert_eq!(owner.clv, 250);
}

#[actix_web::test]
async fn test_set_credit_errors() {
    let db = TestDb::new().await;

    let missing = LedgerService::set_credit(&db.pool, "missing", 10.0).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    OwnerBuilder::new("42").create(&db.pool).await;

    for value in [f64::NAN, f64::INFINITY] {
        let result = LedgerService::set_credit(&db.pool, "42", value).await;
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }
}

// =============================================================================
// Usage Tests
// =============================================================================

#[actix_web::test]
async fn test_usage_aggregates_stored_charges() {
    let db = TestDb::new().await;

    OwnerBuilder::new("42").with_clv(1000).create(&db.pool).await;

    let charges = [
        (100, "c1", "https://a.dev/x", utc(2024, 1, 1, 9)),
        (50, "c2", "https://a.dev/y", utc(2024, 1, 1, 18)),
        (200, "c3", "https://b.dev/", utc(2024, 1, 2, 7)),
    ];
    for (amount, key, source, at) in charges {
        LedgerService::charge_at(&db.pool, "42", new_charge(amount, key, Some(source)), at)
            .await
            .unwrap();
    }

    let usage = LedgerService::usage(&db.pool, "42").await.unwrap();

    assert_eq!(usage.len(), 2);
    assert_eq!(usage[0].date, "2024-01-01");
    assert_eq!(usage[0].hostname.as_deref(), Some("a.dev"));
    assert_eq!(usage[0].total_amount, 1.5);
    assert_eq!(usage[0].count, 2);
    assert_eq!(usage[1].date, "2024-01-02");
    assert_eq!(usage[1].hostname.as_deref(), Some("b.dev"));
    assert_eq!(usage[1].total_amount, 2.0);
    assert_eq!(usage[1].count, 1);
}

#[actix_web::test]
async fn test_usage_is_isolated_per_owner() {
    let db = TestDb::new().await;

    OwnerBuilder::new("1").create(&db.pool).await;
    OwnerBuilder::new("2").create(&db.pool).await;

    LedgerService::charge(&db.pool, "1", new_charge(10, "same-key", None))
        .await
        .unwrap();
    let other = LedgerService::charge(&db.pool, "2", new_charge(10, "same-key", None))
        .await
        .unwrap();

    // Idempotency keys are scoped to one owner
    assert!(other.applied);
    assert!(LedgerService::usage(&db.pool, "1").await.unwrap().len() == 1);
    assert!(LedgerService::usage(&db.pool, "2").await.unwrap().len() == 1);
}
