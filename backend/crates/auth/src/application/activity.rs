use crate::domain::entity::activity_entry::ActivityEntry;
use crate::domain::repository::ActivityLogRepository;

/// Append an audit row. A failed write is logged and swallowed: the audit
/// trail never fails the user's operation.
pub(crate) async fn record<L>(log: &L, entry: ActivityEntry)
where
    L: ActivityLogRepository,
{
    if let Err(e) = log.append_activity(&entry).await {
        tracing::warn!(error = %e, action = %entry.action, "Failed to write activity log");
    }
}
