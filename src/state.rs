use std::sync::Arc;

use crate::api::{AuthClient, DocumentClient};
use crate::session::{SessionRegistry, UserSession};
use crate::storage::CnidariumTokenStore;

pub type Sessions = SessionRegistry<AuthClient, CnidariumTokenStore, DocumentClient>;
pub type UserEntry = UserSession<AuthClient, CnidariumTokenStore, DocumentClient>;

pub struct AppState {
    pub sessions: Arc<Sessions>,
    pub documents: Arc<DocumentClient>,
    /// Search threshold used when `/dockeeper fields` gets none.
    pub default_min_score: Option<u8>,
}

pub type Context<'a> = poise::Context<'a, AppState, anyhow::Error>;
