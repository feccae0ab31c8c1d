//! Common test utilities for secrets-service integration tests.

use std::sync::{Arc, Once};

use secrets_service::models::{EnvName, NewSecret, Project, Role, SecretRecord, SecretType, User};
use secrets_service::services::memory::MemoryStore;
use secrets_service::services::store::SecretStore;
use secrets_service::startup::SecretsCore;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,secrets_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Assembled components over a seeded in-memory store.
///
/// The fixture carries one fully-wired project ("Apollo" with local, dev,
/// and prod environments) and one project nobody belongs to ("Zephyr",
/// dev only) for probing the not-found conflation:
/// - `admin`, `member`, `viewer` are Apollo members; `outsider` is not.
/// - Only `admin` holds a prod grant (read and export).
#[allow(dead_code)]
pub struct TestCore {
    pub core: SecretsCore,
    pub store: Arc<MemoryStore>,
    pub admin: User,
    pub member: User,
    pub viewer: User,
    pub outsider: User,
    pub apollo: Project,
    pub apollo_local: Uuid,
    pub apollo_dev: Uuid,
    pub apollo_prod: Uuid,
    pub zephyr: Project,
    pub zephyr_dev: Uuid,
}

#[allow(dead_code)]
impl TestCore {
    /// Inserts a secret directly through the store, bypassing the catalog
    /// so no audit event is written.
    pub async fn seed_secret(
        &self,
        environment_id: Uuid,
        key_name: &str,
        value: &str,
    ) -> SecretRecord {
        self.store
            .insert_secret(environment_id, &new_secret(key_name, value), self.admin.id)
            .await
            .expect("Failed to seed secret")
    }
}

/// New-secret payload with fixture defaults.
#[allow(dead_code)]
pub fn new_secret(key_name: &str, value: &str) -> NewSecret {
    NewSecret {
        name: key_name.to_string(),
        provider: "stripe".to_string(),
        secret_type: SecretType::Key,
        key_name: key_name.to_string(),
        value: value.to_string(),
        tags: vec!["payments".to_string()],
        note: None,
    }
}

/// Build the seeded store and assemble the components on top of it.
pub async fn spawn_core() -> TestCore {
    init_tracing();

    let store = Arc::new(MemoryStore::new());

    let admin = User::new("admin@example.com".to_string(), None, Role::Admin);
    let member = User::new("member@example.com".to_string(), None, Role::Member);
    let viewer = User::new("viewer@example.com".to_string(), None, Role::Viewer);
    let outsider = User::new("outsider@example.com".to_string(), None, Role::Member);
    store.add_user(admin.clone()).await;
    store.add_user(member.clone()).await;
    store.add_user(viewer.clone()).await;
    store.add_user(outsider.clone()).await;

    let apollo = Project {
        id: Uuid::new_v4(),
        name: "Apollo".to_string(),
    };
    store
        .add_project(
            apollo.clone(),
            vec!["payments".to_string(), "core".to_string()],
        )
        .await;
    let apollo_local = store.add_environment(apollo.id, EnvName::Local).await;
    let apollo_dev = store.add_environment(apollo.id, EnvName::Dev).await;
    let apollo_prod = store.add_environment(apollo.id, EnvName::Prod).await;

    store.add_membership(admin.id, apollo.id).await;
    store.add_membership(member.id, apollo.id).await;
    store.add_membership(viewer.id, apollo.id).await;
    store.add_grant(admin.id, apollo_prod, true, true).await;

    let zephyr = Project {
        id: Uuid::new_v4(),
        name: "Zephyr".to_string(),
    };
    store.add_project(zephyr.clone(), vec![]).await;
    let zephyr_dev = store.add_environment(zephyr.id, EnvName::Dev).await;

    let dyn_store: Arc<dyn SecretStore> = store.clone();
    let core = SecretsCore::with_store(dyn_store);

    TestCore {
        core,
        store,
        admin,
        member,
        viewer,
        outsider,
        apollo,
        apollo_local,
        apollo_dev,
        apollo_prod,
        zephyr,
        zephyr_dev,
    }
}
