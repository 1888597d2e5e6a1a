use std::sync::RwLock;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Timestamp};
use diesel_async::RunQueryDsl;

use crate::db::AsyncDbPool;
use crate::error::{StorageError, StorageErrorConverter};
use crate::jobs::models::{NewScheduledMail, ScheduledMail};
use crate::jobs::types::MailStatus;
use crate::repositories::mail_store::{MailStore, retain_deliverable};
use crate::schema::scheduled_mail;

/// PostgreSQL backed [`MailStore`].
pub struct ScheduledMailRepository {
    pool: RwLock<Option<AsyncDbPool>>,
}

impl ScheduledMailRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self {
            pool: RwLock::new(Some(pool)),
        }
    }

    fn pool(&self) -> Result<AsyncDbPool, StorageError> {
        let guard = self
            .pool
            .read()
            .map_err(|_| StorageError::Unavailable("repository lock poisoned".to_string()))?;

        guard
            .clone()
            .ok_or_else(|| StorageError::Unavailable("repository closed".to_string()))
    }
}

#[async_trait]
impl MailStore for ScheduledMailRepository {
    async fn insert(&self, mail: NewScheduledMail) -> Result<i32, StorageError> {
        let pool = self.pool()?;
        let mut conn = pool.get().await.map_err(StorageError::connection)?;

        diesel::insert_into(scheduled_mail::table)
            .values(&mail)
            .returning(scheduled_mail::id)
            .get_result(&mut conn)
            .await
            .map_err(|e| StorageErrorConverter::convert_diesel_error(e, "insert scheduled mail"))
    }

    async fn fetch_due(&self, now: NaiveDateTime) -> Result<Vec<ScheduledMail>, StorageError> {
        let pool = self.pool()?;
        let mut conn = pool.get().await.map_err(StorageError::connection)?;

        // DATE + TIME yields a TIMESTAMP; `now` is naive local time from the caller
        let rows = scheduled_mail::table
            .filter(scheduled_mail::status.eq(MailStatus::Pending))
            .filter(
                sql::<Bool>("(scheduled_mail.send_date + scheduled_mail.send_time) <= ")
                    .bind::<Timestamp, _>(now),
            )
            .filter(sql::<Bool>("TRIM(scheduled_mail.email) <> ''"))
            .order((
                scheduled_mail::send_date.asc(),
                scheduled_mail::send_time.asc(),
                scheduled_mail::id.asc(),
            ))
            .select(ScheduledMail::as_select())
            .load(&mut conn)
            .await
            .map_err(|e| StorageErrorConverter::convert_diesel_error(e, "fetch due mail"))?;

        Ok(retain_deliverable(rows))
    }

    async fn update_status(&self, id: i32, status: MailStatus) -> Result<(), StorageError> {
        let pool = self.pool()?;
        let mut conn = pool.get().await.map_err(StorageError::connection)?;

        let updated = diesel::update(
            scheduled_mail::table.filter(scheduled_mail::id.eq(id)).filter(
                scheduled_mail::status
                    .eq(MailStatus::Pending)
                    .or(scheduled_mail::status.eq(status)),
            ),
        )
        .set(scheduled_mail::status.eq(status))
        .execute(&mut conn)
        .await
        .map_err(|e| StorageErrorConverter::convert_diesel_error(e, "update mail status"))?;

        if updated == 0 {
            tracing::debug!(mail_id = id, status = %status, "Status write matched no pending row");
        }

        Ok(())
    }

    async fn close(&self) {
        let released = match self.pool.write() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(pool) = released {
            let state = pool.state();
            tracing::info!(
                connections = state.connections,
                idle = state.idle_connections,
                "Releasing database connections"
            );
        }
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::{establish_async_connection_pool, run_pending_migrations};
    use chrono::NaiveDate;

    /// Migrated repository plus its pool, or `None` without `DATABASE_URL`
    async fn repository() -> Option<(ScheduledMailRepository, AsyncDbPool)> {
        let url = std::env::var("DATABASE_URL").ok()?;
        run_pending_migrations(&url).await.unwrap();

        let config = DatabaseConfig {
            url,
            ..Default::default()
        };
        let pool = establish_async_connection_pool(&config).await.unwrap();
        Some((ScheduledMailRepository::new(pool.clone()), pool))
    }

    fn at(day: u32, hour: u32, min: u32, sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2001, 3, day)
            .and_then(|date| date.and_hms_opt(hour, min, sec))
            .unwrap()
    }

    async fn stored_status(pool: &AsyncDbPool, id: i32) -> MailStatus {
        let mut conn = pool.get().await.unwrap();
        scheduled_mail::table
            .find(id)
            .select(scheduled_mail::status)
            .get_result(&mut conn)
            .await
            .unwrap()
    }

    async fn insert(repo: &ScheduledMailRepository, email: &str, send_at: NaiveDateTime) -> i32 {
        repo.insert(NewScheduledMail::new("Ada", email, "hello", send_at))
            .await
            .unwrap()
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL DATABASE_URL"]
    async fn test_fetch_due_combines_date_and_time() {
        let Some((repo, _pool)) = repository().await else {
            return;
        };
        let now = at(2, 12, 0, 0);

        let previous_day = insert(&repo, "a@example.com", at(1, 23, 0, 0)).await;
        let just_before = insert(&repo, "b@example.com", at(2, 11, 59, 59)).await;
        let exactly_now = insert(&repo, "c@example.com", now).await;
        let one_second_late = insert(&repo, "d@example.com", at(2, 12, 0, 1)).await;
        let blank = insert(&repo, "   ", at(2, 11, 0, 0)).await;
        let malformed = insert(&repo, "nobody", at(2, 11, 0, 0)).await;
        let ours = [previous_day, just_before, exactly_now, one_second_late, blank, malformed];

        let due: Vec<i32> = repo
            .fetch_due(now)
            .await
            .unwrap()
            .into_iter()
            .map(|mail| mail.id)
            .filter(|id| ours.contains(id))
            .collect();

        assert_eq!(due, vec![previous_day, just_before, exactly_now]);
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL DATABASE_URL"]
    async fn test_status_update_is_idempotent_and_terminal() {
        let Some((repo, pool)) = repository().await else {
            return;
        };
        let id = insert(&repo, "ada@example.com", at(5, 9, 0, 0)).await;

        repo.update_status(id, MailStatus::Sent).await.unwrap();
        repo.update_status(id, MailStatus::Sent).await.unwrap();
        assert_eq!(stored_status(&pool, id).await, MailStatus::Sent);

        // A terminal row ignores a conflicting write
        repo.update_status(id, MailStatus::Failed).await.unwrap();
        assert_eq!(stored_status(&pool, id).await, MailStatus::Sent);

        let due = repo.fetch_due(at(6, 0, 0, 0)).await.unwrap();
        assert!(due.iter().all(|mail| mail.id != id));
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL DATABASE_URL"]
    async fn test_closed_repository_is_unavailable() {
        let Some((repo, _pool)) = repository().await else {
            return;
        };

        repo.close().await;

        assert!(matches!(
            repo.fetch_due(at(6, 0, 0, 0)).await,
            Err(StorageError::Unavailable(_))
        ));
    }
}
