use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("no logged-in session")]
    NotLoggedIn,
    #[error("scene has been torn down")]
    TornDown,
    #[error("tick token does not match the scheduled tick")]
    StaleToken,
    #[error("a tick is already running")]
    Reentrant,
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
