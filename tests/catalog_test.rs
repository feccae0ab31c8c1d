//! Integration tests for the secret catalog: listing, masking, CRUD
//! gating, lookup, and export.

mod common;

use std::time::Duration;

use common::{new_secret, spawn_core};
use secrets_service::error::AppError;
use secrets_service::models::{
    AuditFilter, EnvName, ExportFormat, SecretChanges, SecretFilter, SecretType,
};
use secrets_service::services::import::parse;
use secrets_service::services::store::SecretStore;
use uuid::Uuid;

#[tokio::test]
async fn list_masks_values_and_orders_newest_first() {
    let t = spawn_core().await;
    t.seed_secret(t.apollo_dev, "STRIPE_API_KEY", "sk_live_51Mz8Xy9")
        .await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    t.seed_secret(t.apollo_local, "DB_PASSWORD", "ab").await;

    let secrets = t
        .core
        .catalog
        .list_secrets(t.member.id, &SecretFilter::default())
        .await
        .unwrap();

    assert_eq!(secrets.len(), 2);
    // Most recently updated first.
    assert_eq!(secrets[0].key_name, "DB_PASSWORD");
    assert_eq!(secrets[0].masked_value, "***");
    assert_eq!(secrets[1].key_name, "STRIPE_API_KEY");
    assert_eq!(secrets[1].masked_value, "sk_l...8Xy9");
}

#[tokio::test]
async fn list_hides_prod_without_a_grant() {
    let t = spawn_core().await;
    t.seed_secret(t.apollo_dev, "DEV_KEY", "dev-value-123").await;
    t.seed_secret(t.apollo_prod, "PROD_KEY", "prod-value-456")
        .await;

    let member_view = t
        .core
        .catalog
        .list_secrets(t.member.id, &SecretFilter::default())
        .await
        .unwrap();
    assert_eq!(member_view.len(), 1);
    assert_eq!(member_view[0].key_name, "DEV_KEY");

    let admin_view = t
        .core
        .catalog
        .list_secrets(t.admin.id, &SecretFilter::default())
        .await
        .unwrap();
    assert_eq!(admin_view.len(), 2);
}

#[tokio::test]
async fn list_is_empty_for_outsiders_and_unknown_users() {
    let t = spawn_core().await;
    t.seed_secret(t.apollo_dev, "DEV_KEY", "dev-value-123").await;

    let outsider_view = t
        .core
        .catalog
        .list_secrets(t.outsider.id, &SecretFilter::default())
        .await
        .unwrap();
    assert!(outsider_view.is_empty());

    let unknown_view = t
        .core
        .catalog
        .list_secrets(Uuid::new_v4(), &SecretFilter::default())
        .await
        .unwrap();
    assert!(unknown_view.is_empty());
}

#[tokio::test]
async fn list_filter_narrows_by_each_field() {
    let t = spawn_core().await;
    let mut stripe = new_secret("STRIPE_API_KEY", "sk_live_51Mz8Xy9");
    stripe.provider = "stripe".to_string();
    stripe.tags = vec!["payments".to_string()];
    t.store
        .insert_secret(t.apollo_dev, &stripe, t.admin.id)
        .await
        .unwrap();

    let mut sendgrid = new_secret("SENDGRID_TOKEN", "SG.abc123def456");
    sendgrid.provider = "sendgrid".to_string();
    sendgrid.secret_type = SecretType::Token;
    sendgrid.tags = vec!["email".to_string()];
    t.store
        .insert_secret(t.apollo_local, &sendgrid, t.admin.id)
        .await
        .unwrap();

    let by_env = SecretFilter {
        environment: Some(EnvName::Dev),
        ..Default::default()
    };
    let hits = t.core.catalog.list_secrets(t.member.id, &by_env).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key_name, "STRIPE_API_KEY");

    let by_provider = SecretFilter {
        provider: Some("sendgrid".to_string()),
        ..Default::default()
    };
    let hits = t
        .core
        .catalog
        .list_secrets(t.member.id, &by_provider)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key_name, "SENDGRID_TOKEN");

    let by_type = SecretFilter {
        secret_type: Some(SecretType::Token),
        ..Default::default()
    };
    let hits = t.core.catalog.list_secrets(t.member.id, &by_type).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key_name, "SENDGRID_TOKEN");

    let by_tag = SecretFilter {
        tag: Some("payments".to_string()),
        ..Default::default()
    };
    let hits = t.core.catalog.list_secrets(t.member.id, &by_tag).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key_name, "STRIPE_API_KEY");

    // Free-text query is case-insensitive across name, provider, key name,
    // and tags.
    let by_query = SecretFilter {
        query: Some("SendGrid".to_string()),
        ..Default::default()
    };
    let hits = t.core.catalog.list_secrets(t.member.id, &by_query).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key_name, "SENDGRID_TOKEN");

    let by_project = SecretFilter {
        project_id: Some(t.zephyr.id),
        ..Default::default()
    };
    let hits = t
        .core
        .catalog
        .list_secrets(t.member.id, &by_project)
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn detail_conflates_missing_and_denied() {
    let t = spawn_core().await;
    let dev_secret = t.seed_secret(t.apollo_dev, "DEV_KEY", "dev-value-123").await;
    let prod_secret = t
        .seed_secret(t.apollo_prod, "PROD_KEY", "prod-value-456")
        .await;

    // Accessible: masked detail comes back.
    let detail = t
        .core
        .catalog
        .get_secret_detail(t.member.id, dev_secret.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detail.project, "Apollo");
    assert_eq!(detail.environment, "dev");
    assert_eq!(detail.masked_value, "dev-...-123");

    // Denied (prod without grant) and unknown both read as None.
    assert!(t
        .core
        .catalog
        .get_secret_detail(t.member.id, prod_secret.id)
        .await
        .unwrap()
        .is_none());
    assert!(t
        .core
        .catalog
        .get_secret_detail(t.outsider.id, dev_secret.id)
        .await
        .unwrap()
        .is_none());
    assert!(t
        .core
        .catalog
        .get_secret_detail(t.member.id, Uuid::new_v4())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn reveal_returns_plaintext_only_when_accessible() {
    let t = spawn_core().await;
    let secret = t.seed_secret(t.apollo_dev, "DEV_KEY", "dev-value-123").await;

    let value = t
        .core
        .catalog
        .reveal_secret(t.viewer.id, secret.id)
        .await
        .unwrap();
    assert_eq!(value.as_deref(), Some("dev-value-123"));

    assert!(t
        .core
        .catalog
        .reveal_secret(t.outsider.id, secret.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn create_requires_membership_and_a_writer_role() {
    let t = spawn_core().await;

    let created = t
        .core
        .catalog
        .create_secret(
            t.member.id,
            t.apollo.id,
            EnvName::Dev,
            new_secret("STRIPE_API_KEY", "sk_live_51Mz8Xy9"),
        )
        .await
        .unwrap();
    assert_eq!(created.masked_value, "sk_l...8Xy9");
    assert_eq!(created.project, "Apollo");

    let err = t
        .core
        .catalog
        .create_secret(
            t.viewer.id,
            t.apollo.id,
            EnvName::Dev,
            new_secret("X", "value-1234"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccessDenied(_)));

    let err = t
        .core
        .catalog
        .create_secret(
            t.outsider.id,
            t.apollo.id,
            EnvName::Dev,
            new_secret("X", "value-1234"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccessDenied(_)));

    // Member without a prod grant cannot write into prod.
    let err = t
        .core
        .catalog
        .create_secret(
            t.member.id,
            t.apollo.id,
            EnvName::Prod,
            new_secret("X", "value-1234"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccessDenied(_)));

    // Unresolvable project is NotFound, not AccessDenied.
    let err = t
        .core
        .catalog
        .create_secret(
            t.member.id,
            Uuid::new_v4(),
            EnvName::Dev,
            new_secret("X", "value-1234"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn update_applies_partial_changes() {
    let t = spawn_core().await;
    let secret = t
        .seed_secret(t.apollo_dev, "STRIPE_API_KEY", "sk_live_51Mz8Xy9")
        .await;

    let changes = SecretChanges {
        value: Some("sk_live_99Zz7Qq1".to_string()),
        tags: Some(vec!["payments".to_string(), "rotated".to_string()]),
        ..Default::default()
    };
    let updated = t
        .core
        .catalog
        .update_secret(t.member.id, secret.id, changes)
        .await
        .unwrap()
        .unwrap();

    // Unset fields keep their stored values.
    assert_eq!(updated.key_name, "STRIPE_API_KEY");
    assert_eq!(updated.provider, "stripe");
    assert_eq!(updated.masked_value, "sk_l...7Qq1");
    assert_eq!(updated.tags, vec!["payments", "rotated"]);
}

#[tokio::test]
async fn update_is_gated_like_a_read_but_rejects_viewers() {
    let t = spawn_core().await;
    let secret = t.seed_secret(t.apollo_dev, "DEV_KEY", "dev-value-123").await;

    let err = t
        .core
        .catalog
        .update_secret(
            t.viewer.id,
            secret.id,
            SecretChanges {
                value: Some("other-value".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccessDenied(_)));

    // Outsiders and unknown ids both come back as None.
    assert!(t
        .core
        .catalog
        .update_secret(
            t.outsider.id,
            secret.id,
            SecretChanges {
                value: Some("other-value".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .is_none());
    assert!(t
        .core
        .catalog
        .update_secret(
            t.member.id,
            Uuid::new_v4(),
            SecretChanges {
                value: Some("other-value".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn delete_is_admin_only_and_conflates_out_of_reach_targets() {
    let t = spawn_core().await;
    let secret = t.seed_secret(t.apollo_dev, "DEV_KEY", "dev-value-123").await;
    let foreign = t
        .seed_secret(t.zephyr_dev, "ZEPHYR_KEY", "zephyr-value-1")
        .await;

    let err = t
        .core
        .catalog
        .delete_secret(t.member.id, secret.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccessDenied(_)));

    // Admin role without Zephyr membership still reads as "not there".
    assert!(t
        .core
        .catalog
        .delete_secret(t.admin.id, foreign.id)
        .await
        .unwrap()
        .is_none());

    let deleted = t
        .core
        .catalog
        .delete_secret(t.admin.id, secret.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(deleted.name, "DEV_KEY");
    assert_eq!(deleted.project_id, t.apollo.id);
    assert!(t
        .core
        .catalog
        .get_secret_detail(t.admin.id, secret.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn find_by_key_returns_the_most_recently_updated_match() {
    let t = spawn_core().await;
    t.seed_secret(t.apollo_dev, "API_KEY", "older-value-1").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    t.seed_secret(t.apollo_dev, "API_KEY", "newer-value-2").await;

    let hit = t
        .core
        .catalog
        .find_secret_by_key(t.member.id, t.apollo.id, EnvName::Dev, "API_KEY")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.value, "newer-value-2");

    assert!(t
        .core
        .catalog
        .find_secret_by_key(t.outsider.id, t.apollo.id, EnvName::Dev, "API_KEY")
        .await
        .unwrap()
        .is_none());
    assert!(t
        .core
        .catalog
        .find_secret_by_key(t.member.id, t.apollo.id, EnvName::Dev, "MISSING")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn export_env_format_round_trips_through_the_parser() {
    let t = spawn_core().await;
    t.seed_secret(t.apollo_dev, "ZETA_KEY", "zeta-value-9").await;
    t.seed_secret(t.apollo_dev, "ALPHA_KEY", "base64==abc").await;

    let rendered = t
        .core
        .catalog
        .export_secrets(t.member.id, t.apollo.id, EnvName::Dev, ExportFormat::Env)
        .await
        .unwrap();

    // Keys alphabetical; a value containing '=' survives the round trip
    // because the parser splits at the first '=' only.
    let reparsed = parse(&rendered);
    assert_eq!(reparsed.skipped, 0);
    assert_eq!(reparsed.pairs.len(), 2);
    assert_eq!(reparsed.pairs[0].key, "ALPHA_KEY");
    assert_eq!(reparsed.pairs[0].value, "base64==abc");
    assert_eq!(reparsed.pairs[1].key, "ZETA_KEY");
    assert_eq!(reparsed.pairs[1].value, "zeta-value-9");
}

#[tokio::test]
async fn export_json_format_is_a_flat_object() {
    let t = spawn_core().await;
    t.seed_secret(t.apollo_dev, "API_KEY", "abc123def456").await;

    let rendered = t
        .core
        .catalog
        .export_secrets(t.member.id, t.apollo.id, EnvName::Dev, ExportFormat::Json)
        .await
        .unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
    assert_eq!(parsed["API_KEY"], "abc123def456");
}

#[tokio::test]
async fn export_denial_is_indistinguishable_from_not_found() {
    let t = spawn_core().await;
    t.seed_secret(t.apollo_prod, "PROD_KEY", "prod-value-456")
        .await;

    let denied = t
        .core
        .catalog
        .export_secrets(t.member.id, t.apollo.id, EnvName::Prod, ExportFormat::Env)
        .await
        .unwrap_err();
    let missing = t
        .core
        .catalog
        .export_secrets(t.member.id, Uuid::new_v4(), EnvName::Prod, ExportFormat::Env)
        .await
        .unwrap_err();

    assert!(matches!(denied, AppError::NotFound(_)));
    assert!(matches!(missing, AppError::NotFound(_)));
    assert_eq!(denied.to_string(), missing.to_string());
}

#[tokio::test]
async fn prod_export_follows_the_read_grant() {
    let t = spawn_core().await;
    t.seed_secret(t.apollo_prod, "PROD_KEY", "prod-value-456")
        .await;

    // Read access is the gate at this layer; outer surfaces consult
    // has_export_access on top of it.
    t.store
        .add_grant(t.member.id, t.apollo_prod, true, false)
        .await;
    let rendered = t
        .core
        .catalog
        .export_secrets(t.member.id, t.apollo.id, EnvName::Prod, ExportFormat::Env)
        .await
        .unwrap();
    assert_eq!(rendered, "PROD_KEY=prod-value-456");

    let rendered = t
        .core
        .catalog
        .export_secrets(t.admin.id, t.apollo.id, EnvName::Prod, ExportFormat::Env)
        .await
        .unwrap();
    assert_eq!(rendered, "PROD_KEY=prod-value-456");
}

#[tokio::test]
async fn record_copy_checks_project_membership_when_named() {
    let t = spawn_core().await;
    let secret_id = Uuid::new_v4().to_string();

    t.core
        .catalog
        .record_copy(t.viewer.id, &secret_id, Some(t.apollo.id))
        .await
        .unwrap();

    let err = t
        .core
        .catalog
        .record_copy(t.outsider.id, &secret_id, Some(t.apollo.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccessDenied(_)));

    let err = t
        .core
        .catalog
        .record_copy(Uuid::new_v4(), &secret_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let filter = AuditFilter {
        action: Some("secret_copied".to_string()),
        ..Default::default()
    };
    let events = t.core.audit.query(t.admin.id, &filter).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].actor, "viewer@example.com");
    assert_eq!(events[0].secret_name.as_deref(), Some(secret_id.as_str()));
}

#[tokio::test]
async fn project_summaries_count_only_visible_keys() {
    let t = spawn_core().await;
    t.seed_secret(t.apollo_local, "LOCAL_KEY", "local-value-1")
        .await;
    t.seed_secret(t.apollo_dev, "DEV_KEY", "dev-value-123").await;
    t.seed_secret(t.apollo_prod, "PROD_KEY", "prod-value-456")
        .await;

    let member_view = t.core.catalog.list_projects(t.member.id).await.unwrap();
    assert_eq!(member_view.len(), 1);
    assert_eq!(member_view[0].name, "Apollo");
    assert_eq!(member_view[0].key_count, 2);
    assert!(!member_view[0].prod_access);
    assert_eq!(member_view[0].tags, vec!["core", "payments"]);

    let admin_view = t.core.catalog.list_projects(t.admin.id).await.unwrap();
    assert_eq!(admin_view[0].key_count, 3);
    assert!(admin_view[0].prod_access);

    assert!(t
        .core
        .catalog
        .list_projects(t.outsider.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn project_summaries_sort_by_name() {
    let t = spawn_core().await;
    t.store.add_membership(t.admin.id, t.zephyr.id).await;

    let projects = t.core.catalog.list_projects(t.admin.id).await.unwrap();
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0].name, "Apollo");
    assert_eq!(projects[1].name, "Zephyr");
}
