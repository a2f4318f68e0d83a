use thiserror::Error;

use crate::asset::AssetKind;
use crate::card::CardId;
use crate::team::TeamId;

/// Everything that can reject a command. Rejections are clean: the engine
/// applies no partial state for a command that returns one of these.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("asset not found: {0}")]
    AssetNotFound(AssetKind),
    #[error("team not found: {0}")]
    TeamNotFound(TeamId),
    #[error("card not found: {0}")]
    CardNotFound(CardId),
    #[error("game has not been initialized")]
    GameNotInitialized,
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("insufficient funds: need {needed:.2}, have {available:.2}")]
    InsufficientFunds { needed: f64, available: f64 },
    #[error("insufficient holdings of {asset}: need {needed}, have {available}")]
    InsufficientHoldings {
        asset: AssetKind,
        needed: u32,
        available: u32,
    },
    #[error("state conflict: {0}")]
    StateConflict(String),
    #[error("stale write for {key}")]
    VersionConflict { key: String },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}
