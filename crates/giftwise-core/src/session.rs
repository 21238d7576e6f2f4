use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::datastore::{FileStore, KeyValueStore};
use crate::persona::Persona;

pub const PERSONA_KEY: &str = "giftPersona";
pub const CURRENT_SESSION_FILE: &str = "session.current";
pub const SESSIONS_DIR: &str = "sessions";

/// Session-scoped state. Lives until [`SessionStore::end`] is called.
#[derive(Debug)]
pub struct SessionStore<S: KeyValueStore = FileStore> {
    id: Uuid,
    backend: S,
    marker: Option<PathBuf>,
}

impl SessionStore<FileStore> {
    /// Reuses the session named in `session.current`, or starts a new one.
    #[tracing::instrument(skip(data_dir), fields(data_dir = %data_dir.display()))]
    pub fn resume_or_start(data_dir: &Path) -> anyhow::Result<Self> {
        let marker = data_dir.join(CURRENT_SESSION_FILE);

        let existing = if marker.exists() {
            let raw = fs::read_to_string(&marker)
                .with_context(|| format!("failed reading {}", marker.display()))?;
            match Uuid::parse_str(raw.trim()) {
                Ok(id) => Some(id),
                Err(err) => {
                    warn!(error = %err, "session marker is not a uuid; starting fresh");
                    None
                }
            }
        } else {
            None
        };

        let id = match existing {
            Some(id) => {
                debug!(%id, "resuming session");
                id
            }
            None => {
                let id = Uuid::new_v4();
                fs::write(&marker, id.to_string())
                    .with_context(|| format!("failed writing {}", marker.display()))?;
                info!(%id, "started session");
                id
            }
        };

        let dir = data_dir.join(SESSIONS_DIR).join(id.to_string());
        let backend = FileStore::open(&dir)?;
        Ok(Self {
            id,
            backend,
            marker: Some(marker),
        })
    }

    /// Deletes the session directory and forgets the marker.
    #[tracing::instrument(skip(self), fields(id = %self.id))]
    pub fn end(self) -> anyhow::Result<()> {
        let dir = self.backend.dir().to_path_buf();
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("failed removing {}", dir.display()))?;
        }
        if let Some(marker) = &self.marker
            && marker.exists()
        {
            fs::remove_file(marker)
                .with_context(|| format!("failed removing {}", marker.display()))?;
        }
        info!("ended session");
        Ok(())
    }
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn with_backend(backend: S) -> Self {
        Self {
            id: Uuid::new_v4(),
            backend,
            marker: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Missing or unreadable personas both come back as `None`.
    #[tracing::instrument(skip(self))]
    pub fn load_persona(&self) -> anyhow::Result<Option<Persona>> {
        let Some(raw) = self.backend.get(PERSONA_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str::<Persona>(&raw) {
            Ok(persona) => Ok(Some(persona)),
            Err(err) => {
                warn!(error = %err, "stored persona is not valid JSON; ignoring");
                Ok(None)
            }
        }
    }

    #[tracing::instrument(skip(self, persona))]
    pub fn save_persona(&self, persona: &Persona) -> anyhow::Result<()> {
        let raw = serde_json::to_string(persona)
            .map_err(|err| anyhow!("failed to serialize persona: {err}"))?;
        self.backend.set(PERSONA_KEY, &raw)
    }

    pub fn clear_persona(&self) -> anyhow::Result<()> {
        self.backend.remove(PERSONA_KEY)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{CURRENT_SESSION_FILE, SessionStore};
    use crate::datastore::{KeyValueStore, MemoryStore};
    use crate::persona::Persona;

    fn persona() -> Persona {
        Persona {
            occasion: Some("birthday".to_string()),
            personality_tags: vec!["techSavvy".to_string()],
            mood: Some("funny".to_string()),
        }
    }

    #[test]
    fn session_survives_reopen_until_ended() {
        let temp = tempdir().expect("tempdir");

        let first = SessionStore::resume_or_start(temp.path()).expect("start");
        first.save_persona(&persona()).expect("save");
        let id = first.id();

        let again = SessionStore::resume_or_start(temp.path()).expect("resume");
        assert_eq!(again.id(), id);
        assert_eq!(again.load_persona().expect("load"), Some(persona()));

        again.end().expect("end");
        assert!(!temp.path().join(CURRENT_SESSION_FILE).exists());

        let fresh = SessionStore::resume_or_start(temp.path()).expect("fresh");
        assert_ne!(fresh.id(), id);
        assert_eq!(fresh.load_persona().expect("load"), None);
    }

    #[test]
    fn memory_backed_session_round_trips() {
        let backend = MemoryStore::default();
        let session = SessionStore::with_backend(backend);
        session.save_persona(&persona()).expect("save");
        assert_eq!(session.load_persona().expect("load"), Some(persona()));
    }

    #[test]
    fn corrupt_persona_is_ignored() {
        let backend = MemoryStore::default();
        backend.set("giftPersona", "[1,2").expect("set");
        let session = SessionStore::with_backend(backend);
        assert_eq!(session.load_persona().expect("load"), None);
    }
}
