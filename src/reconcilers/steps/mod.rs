//! Steps composing the XStoreBackup phases

mod binlog;
mod coordinator;
mod jobs;
mod metadata;
mod persist;
mod retention;
mod secrets;

pub use binlog::{parse_event_timestamp, ExtractLastEventTimestamp};
pub use coordinator::{
    WaitBinlogOffsetCollected, WaitClusterBackupFinished, WaitSeekCheckpointJobFinished,
};
pub use jobs::{RemoveJob, StartJob, WaitJobFinished};
pub use metadata::{CreateBackupConfigMap, TransitionTo, UpdateBackupStartInfo, ValidateSpec};
pub use persist::PersistStatusChanges;
pub use retention::{select_over_retention, RemoveBackupsOverRetention};
pub use secrets::SaveXStoreSecrets;
