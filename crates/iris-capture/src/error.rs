use iris_pack::PackError;
use iris_resource::StoreError;
use iris_task::Cancelled;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error(transparent)]
    Pack(#[from] PackError),

    #[error("capture file version {version} is older than the supported version {current}")]
    FileTooOld { version: u32, current: u32 },

    #[error("capture file version {version} is newer than the supported version {current}")]
    FileTooNew { version: u32, current: u32 },

    #[error("capture file cannot be read")]
    FileCannotBeRead,

    #[error("stream carries the system-trace magic; it must be processed externally")]
    ForeignTrace,

    #[error(transparent)]
    Resource(#[from] StoreError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error("no capture named '{name}'")]
    NotFound { name: String },

    #[error("a capture named '{name}' already exists")]
    AlreadyExists { name: String },

    #[error("malformed capture message at offset {offset}: {reason}")]
    BadMessage { offset: u64, reason: &'static str },

    #[error("nested command groups are not permitted; express callers via the caller field")]
    NestedCommandGroup,
}
