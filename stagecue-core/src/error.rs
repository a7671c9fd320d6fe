use thiserror::Error;

/// The only fatal error kind (§7): mixer initialization failure. Everything
/// else the kernel surfaces is a non-fatal `success=false` reported through
/// `CommandOutcome`, not this type.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("audio mixer failed to initialize: {0}")]
    MixerInit(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
