/// In-memory Session Store
///
/// Sessions live in a sharded `DashMap` keyed by device identity, with two
/// secondary indexes (access token, refresh token). A rotation holds the
/// session's entry lock for the whole compare-and-swap, so two rotations of the
/// same session serialize while sessions in other shards rotate in parallel.
///
/// Lock order is always sessions -> index. Lookups never hold an index guard
/// while touching `sessions`.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::session::model::{DeviceKey, RotateOutcome, RotateTokens, Session};
use crate::session::store::SessionStore;

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<DeviceKey, Session>,
    by_access_token: DashMap<String, DeviceKey>,
    by_refresh_token: DashMap<String, DeviceKey>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `token` in `index` for `key`. Fails if another session owns it.
    fn claim(
        index: &DashMap<String, DeviceKey>,
        token: &str,
        key: &DeviceKey,
        column: &str,
    ) -> Result<(), StoreError> {
        match index.entry(token.to_string()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(column.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(key.clone());
                Ok(())
            }
        }
    }

    /// Follow an index and re-check the session still holds the token.
    fn resolve<F>(
        &self,
        index: &DashMap<String, DeviceKey>,
        token: &str,
        current: F,
    ) -> Option<Session>
    where
        F: Fn(&Session) -> Option<&str>,
    {
        let key = index.get(token).map(|entry| entry.value().clone())?;
        let session = self.sessions.get(&key)?;
        if current(session.value()) == Some(token) {
            Some(session.value().clone())
        } else {
            None
        }
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn lookup_by_refresh_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.resolve(&self.by_refresh_token, token, |s| s.refresh_token.as_deref()))
    }

    async fn lookup_by_access_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.resolve(&self.by_access_token, token, |s| Some(s.access_token.as_str())))
    }

    async fn rotate_tokens(&self, request: &RotateTokens) -> Result<RotateOutcome, StoreError> {
        let key = request.key();
        let mut session = match self.sessions.get_mut(&key) {
            Some(session) => session,
            None => return Ok(RotateOutcome::LostRace),
        };

        if session.refresh_token.as_deref() != Some(request.old_refresh_token.as_str()) {
            return Ok(RotateOutcome::LostRace);
        }

        Self::claim(&self.by_refresh_token, &request.new_refresh_token, &key, "refresh_token")?;
        if let Err(e) = Self::claim(&self.by_access_token, &request.new_access_token, &key, "access_token") {
            self.by_refresh_token.remove(&request.new_refresh_token);
            return Err(e);
        }

        self.by_refresh_token.remove(&request.old_refresh_token);
        self.by_access_token.remove(&session.access_token);

        session.access_token = request.new_access_token.clone();
        session.refresh_token = Some(request.new_refresh_token.clone());

        Ok(RotateOutcome::Committed)
    }

    async fn insert_session(&self, session: Session) -> Result<(), StoreError> {
        let key = session.key();
        let slot = match self.sessions.entry(key.clone()) {
            Entry::Occupied(_) => return Err(StoreError::Conflict("device".to_string())),
            Entry::Vacant(slot) => slot,
        };

        Self::claim(&self.by_access_token, &session.access_token, &key, "access_token")?;
        if let Some(refresh_token) = &session.refresh_token {
            if let Err(e) = Self::claim(&self.by_refresh_token, refresh_token, &key, "refresh_token") {
                self.by_access_token.remove(&session.access_token);
                return Err(e);
            }
        }

        slot.insert(session);
        Ok(())
    }
}
