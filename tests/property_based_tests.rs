//! Property-Based Tests for Rotation Invariants
//!
//! Identity alternation, password generation and the staging layout must
//! hold for any pool, policy or number of completed cycles.

use credrotate::{
    InMemorySecretBackend, RotationConfig, RotationOrchestrator, RotationStep, SecretBackend,
    Stage, StagedCredentialStore, VersionedCredentialStore,
};
use credrotate_core::{PasswordPolicy, next_username};
use credrotate_testing::{MockDatabase, fixtures};
use proptest::prelude::*;
use serde_json::Value;

// Distinct usernames, so positions in the pool are unambiguous
fn identity_pool_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z][a-z0-9_]{0,15}", 0..6)
        .prop_map(|names| names.into_iter().collect())
}

fn policy_strategy() -> impl Strategy<Value = PasswordPolicy> {
    (
        PasswordPolicy::MIN_LENGTH..=PasswordPolicy::MAX_LENGTH,
        prop::string::string_regex("[a-z:/@#%]{0,8}").unwrap(),
    )
        .prop_map(|(length, exclude_characters)| PasswordPolicy {
            length,
            exclude_characters,
            require_each_class: true,
        })
}

proptest! {
    /// Property: the next identity is the pool successor and wraps around
    #[test]
    fn prop_next_username_is_pool_successor(
        pool in identity_pool_strategy(),
        index in 0usize..6
    ) {
        prop_assume!(pool.len() >= 2);
        let current = &pool[index % pool.len()];

        let next = next_username(current, &pool);

        let expected = &pool[(index % pool.len() + 1) % pool.len()];
        prop_assert_eq!(next, expected.as_str());
        prop_assert_ne!(next, current.as_str());
        // Same inputs, same answer
        prop_assert_eq!(next_username(current, &pool), next);
    }

    /// Property: walking the pool returns to the start after one lap
    #[test]
    fn prop_next_username_cycles_through_pool(pool in identity_pool_strategy()) {
        prop_assume!(!pool.is_empty());
        let start = pool[0].as_str();

        let mut visited = vec![start];
        let mut name = next_username(start, &pool);
        while name != start && visited.len() <= pool.len() {
            visited.push(name);
            name = next_username(name, &pool);
        }

        let expected_lap = if pool.len() < 2 { 1 } else { pool.len() };
        prop_assert_eq!(visited.len(), expected_lap);
    }

    /// Property: names outside the pool are never rotated to another identity
    #[test]
    fn prop_unknown_username_is_kept(
        pool in identity_pool_strategy(),
        outsider in "[A-Z]{1,8}"
    ) {
        prop_assert_eq!(next_username(&outsider, &pool), outsider.as_str());
    }

    /// Property: generated passwords honor length, exclusions and character classes
    #[test]
    fn prop_generated_password_follows_policy(policy in policy_strategy()) {
        prop_assume!(policy.validate().is_ok());

        let password = policy.generate();
        let value = password.expose_secret();

        prop_assert_eq!(value.chars().count(), policy.length);
        prop_assert!(value.chars().all(|c| !policy.exclude_characters.contains(c)));
        prop_assert!(value.chars().all(|c| c.is_ascii_graphic()));
        prop_assert!(value.chars().any(|c| c.is_ascii_lowercase()));
        prop_assert!(value.chars().any(|c| c.is_ascii_uppercase()));
        prop_assert!(value.chars().any(|c| c.is_ascii_digit()));
    }

    /// Property: a regenerated password never reuses one still in use
    #[test]
    fn prop_generate_distinct_avoids_in_use(policy in policy_strategy()) {
        prop_assume!(policy.validate().is_ok());
        let current = policy.generate();
        let previous = policy.generate();

        let fresh = policy.generate_distinct(&[&current, &previous]);

        prop_assert!(!fresh.constant_time_eq(&current));
        prop_assert!(!fresh.constant_time_eq(&previous));
    }

    /// Property: replaying CREATE never adds a second PENDING version
    #[test]
    fn prop_create_is_idempotent(replays in 1usize..5) {
        tokio_test::block_on(async {
            let backend = InMemorySecretBackend::new();
            let id = fixtures::secret_id("db/app");
            fixtures::seed_secret(&backend, &id, &fixtures::database_credential("svc", "p0"), true)
                .await
                .expect("Seeding should succeed");
            let store = StagedCredentialStore::new(backend.clone(), &RotationConfig::default()).unwrap();
            let orchestrator = RotationOrchestrator::new(store, MockDatabase::new().with_user("svc", "p0"));
            let token = fixtures::begin_rotation(&backend, &id).await.expect("Token registration should succeed");

            orchestrator.rotate(RotationStep::CreateSecret, &id, &token).await.expect("CREATE should succeed");
            let first = backend.get_secret_value(&id, Stage::Pending, Some(&token)).await.expect("Read should succeed");
            let writes = backend.write_count();

            for _ in 0..replays {
                orchestrator.rotate(RotationStep::CreateSecret, &id, &token).await.expect("Replay should succeed");
            }

            let description = backend.describe_secret(&id).await.expect("Describe should succeed");
            prop_assert_eq!(description.holders(Stage::Pending).len(), 1);
            prop_assert_eq!(backend.write_count(), writes);
            prop_assert_eq!(
                backend.get_secret_value(&id, Stage::Pending, Some(&token)).await.expect("Read should succeed"),
                first
            );
            Ok(())
        })?;
    }

    /// Property: fields unknown to the credential model survive rotation
    #[test]
    fn prop_extra_fields_survive_create(
        extras in prop::collection::btree_map("x_[a-z]{1,12}", "[ -~]{0,32}", 0..6)
    ) {
        tokio_test::block_on(async {
            let backend = InMemorySecretBackend::new();
            let id = fixtures::secret_id("db/app");
            let mut seeded = fixtures::database_credential("svc", "p0");
            for (key, value) in &extras {
                seeded.credential.extra.insert(key.clone(), Value::from(value.as_str()));
            }
            fixtures::seed_secret(&backend, &id, &seeded, true).await.expect("Seeding should succeed");
            let store = StagedCredentialStore::new(backend.clone(), &RotationConfig::default()).unwrap();
            let orchestrator = RotationOrchestrator::new(store, MockDatabase::new().with_user("svc", "p0"));
            let token = fixtures::begin_rotation(&backend, &id).await.expect("Token registration should succeed");

            orchestrator.rotate(RotationStep::CreateSecret, &id, &token).await.expect("CREATE should succeed");

            let raw = backend
                .get_secret_value(&id, Stage::Pending, Some(&token))
                .await
                .expect("Read should succeed")
                .expect("PENDING should exist");
            let stored: Value = serde_json::from_str(&raw).expect("PENDING should be JSON");
            for (key, value) in &extras {
                prop_assert_eq!(&stored[key.as_str()], &Value::from(value.as_str()));
            }
            Ok(())
        })?;
    }

    /// Property: after any number of cycles there is one CURRENT and one distinct PREVIOUS
    #[test]
    fn prop_cycles_keep_single_current_and_previous(cycles in 1usize..5) {
        tokio_test::block_on(async {
            let backend = InMemorySecretBackend::new();
            let id = fixtures::secret_id("db/app");
            let (current, previous) = fixtures::blue_green_pair(("admin1", "p0"), ("admin2", "q0"));
            fixtures::seed_secret(&backend, &id, &current, true).await.expect("Seeding should succeed");
            fixtures::seed_version(&backend, &id, &fixtures::token("seed-previous"), &previous, &[Stage::Previous])
                .await
                .expect("Seeding should succeed");
            let database = MockDatabase::new().with_user("admin1", "p0").with_user("admin2", "q0");
            let store = StagedCredentialStore::new(backend.clone(), &RotationConfig::default()).unwrap();
            let orchestrator = RotationOrchestrator::new(store, database.clone());

            for _ in 0..cycles {
                let token = fixtures::begin_rotation(&backend, &id).await.expect("Token registration should succeed");
                for step in RotationStep::ALL {
                    orchestrator.rotate(step, &id, &token).await.expect("Step should succeed");
                }

                let description = backend.describe_secret(&id).await.expect("Describe should succeed");
                let current_holders = description.holders(Stage::Current);
                let previous_holders = description.holders(Stage::Previous);
                prop_assert_eq!(current_holders.len(), 1);
                prop_assert_eq!(previous_holders.len(), 1);
                prop_assert_ne!(current_holders[0], previous_holders[0]);
                prop_assert!(description.holders(Stage::Pending).is_empty());
            }

            let store = orchestrator.store();
            let serving: credrotate::DatabaseCredential = store
                .get_credential(&id, Stage::Current, None)
                .await
                .expect("Read should succeed")
                .expect("CURRENT should exist");
            let expected = if cycles % 2 == 1 { "admin2" } else { "admin1" };
            prop_assert_eq!(serving.username(), expected);
            prop_assert!(database.accepts(&serving));
            Ok(())
        })?;
    }
}
