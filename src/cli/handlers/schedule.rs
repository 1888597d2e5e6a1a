//! Schedule command handler
//!
//! Stores one mail job through the [`ScheduleService`] and prints its id.

use std::sync::Arc;

use crate::config::settings::Settings;
use crate::db::establish_async_connection_pool;
use crate::error::AppResult;
use crate::repositories::{MailStore, ScheduledMailRepository};
use crate::services::{ScheduleMailRequest, ScheduleService};

/// Handler for the schedule command
pub struct ScheduleCommandHandler {
    config: Settings,
}

impl ScheduleCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Connects to the store and schedules `request`
    ///
    /// # Errors
    /// - Validation errors for the request
    /// - Database connection or insert errors
    pub async fn execute(&self, request: ScheduleMailRequest) -> AppResult<i32> {
        let pool = establish_async_connection_pool(&self.config.database).await?;
        let store: Arc<dyn MailStore> = Arc::new(ScheduledMailRepository::new(pool));

        let result = Self::schedule_with(Arc::clone(&store), request).await;
        store.close().await;
        result
    }

    /// Schedules through an already open store and prints the new id
    pub async fn schedule_with(store: Arc<dyn MailStore>, request: ScheduleMailRequest) -> AppResult<i32> {
        let send_at = request.send_at;
        let id = ScheduleService::new(store).schedule(request).await?;

        println!("✓ Scheduled mail {} for {}", id, send_at);
        Ok(id)
    }
}
