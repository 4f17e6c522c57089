use tracing::{error, info};

use crate::users::{
    password::hash_password_off_thread,
    repo::UserStore,
    repo_types::NewUser,
};

const SEED_PASSWORD: &str = "password123";

/// (username, email)
pub const BASELINE_USERS: &[(&str, &str)] = &[
    ("admin", "admin@example.com"),
    ("user", "user@example.com"),
];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub existing: usize,
    pub failed: usize,
}

/// Find-or-create each baseline user by email. A failing row is logged and
/// skipped; only a hashing failure aborts the run.
pub async fn run(store: &dyn UserStore) -> anyhow::Result<SeedReport> {
    info!("seeding users");
    let password_hash = hash_password_off_thread(SEED_PASSWORD.to_string()).await?;
    let mut report = SeedReport::default();

    for (username, email) in BASELINE_USERS {
        match store.find_by_email(email).await {
            Ok(Some(_)) => {
                report.existing += 1;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, %email, "error seeding user");
                report.failed += 1;
                continue;
            }
        }

        let new_user = NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.clone(),
        };
        match store.create(new_user).await {
            Ok(user) => {
                info!(user_id = user.id, %email, "seeded user");
                report.created += 1;
            }
            Err(e) => {
                error!(error = %e, %email, "error seeding user");
                report.failed += 1;
            }
        }
    }

    info!(
        created = report.created,
        existing = report.existing,
        failed = report.failed,
        "database seeding completed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{
        memory::{MemoryUserStore, UnavailableUserStore},
        password::verify_password,
    };

    #[tokio::test]
    async fn seeding_twice_keeps_two_users() {
        let store = MemoryUserStore::new();
        let first = run(&store).await.unwrap();
        assert_eq!(first, SeedReport { created: 2, existing: 0, failed: 0 });

        let second = run(&store).await.unwrap();
        assert_eq!(second, SeedReport { created: 0, existing: 2, failed: 0 });
        assert_eq!(store.raw_rows().len(), 2);
    }

    #[tokio::test]
    async fn conflicting_row_is_skipped_not_fatal() {
        let store = MemoryUserStore::new();
        // Takes the "admin" username under a different email.
        store
            .create(NewUser {
                username: "admin".into(),
                email: "someone@example.com".into(),
                password_hash: "x".into(),
            })
            .await
            .unwrap();

        let report = run(&store).await.unwrap();
        assert_eq!(report, SeedReport { created: 1, existing: 0, failed: 1 });
        let seeded = store.find_by_email("user@example.com").await.unwrap().unwrap();
        assert!(verify_password(SEED_PASSWORD, &seeded.password_hash).unwrap());
    }

    #[tokio::test]
    async fn unreachable_store_counts_failures_and_finishes() {
        let report = run(&UnavailableUserStore).await.unwrap();
        assert_eq!(report, SeedReport { created: 0, existing: 0, failed: 2 });
    }
}
