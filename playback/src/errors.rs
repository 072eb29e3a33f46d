use thiserror::Error;

use dolphin_integrations::ProcessError;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("replay io error: {0}")]
    ReplayIo(String),

    #[error("replay parse error: {0}")]
    ReplayParse(String),

    #[error("replay index error: {0}")]
    Index(String),

    #[error("invalid playback config: {0}")]
    ConfigInvalid(String),

    #[error(transparent)]
    Emulator(#[from] ProcessError),
}
