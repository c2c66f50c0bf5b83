//! Persistence models: audit message rows, record scopes, message statistics.

mod message_record;
mod message_stats;
mod record_scope;

pub use message_record::MessageRecord;
pub use message_stats::MessageStats;
pub use record_scope::RecordScope;
