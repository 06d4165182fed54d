//! Session Directory
//!
//! Owns every live session and the participant → session index. Roster
//! changes go through the directory so the two never disagree: a participant
//! is in a roster if and only if the index points at that session.

use std::collections::BTreeMap;

use crate::core::ids::{ArenaId, ParticipantId, SessionId};
use crate::game::session::{GameSession, RosterEntry, SessionError};
use crate::game::team::Team;

/// Directory errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// Session id already registered.
    #[error("Session already exists: {0}")]
    SessionExists(SessionId),

    /// Session id not registered.
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// Participant already belongs to a session.
    #[error("Participant {participant} is already in session {session}")]
    AlreadyInSession {
        /// Participant.
        participant: ParticipantId,
        /// Session they are in.
        session: SessionId,
    },

    /// Participant belongs to no session.
    #[error("Participant {0} is not in a session")]
    NotInSession(ParticipantId),

    /// Session refused the change.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Registry of live sessions.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    sessions: BTreeMap<SessionId, GameSession>,
    participants: BTreeMap<ParticipantId, SessionId>,
}

impl SessionDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session along with any members it already has.
    pub fn insert(&mut self, session: GameSession) -> Result<(), DirectoryError> {
        if self.sessions.contains_key(&session.id) {
            return Err(DirectoryError::SessionExists(session.id));
        }
        for participant in session.participants() {
            self.check_free(participant)?;
        }

        for participant in session.participants() {
            self.participants.insert(*participant, session.id);
        }
        self.sessions.insert(session.id, session);
        Ok(())
    }

    /// Add a participant to a session.
    pub fn join(&mut self, session_id: SessionId, participant: ParticipantId) -> Result<Team, DirectoryError> {
        self.check_free(&participant)?;

        let session = self.sessions
            .get_mut(&session_id)
            .ok_or(DirectoryError::SessionNotFound(session_id))?;
        let team = session.add_participant(participant)?;

        self.participants.insert(participant, session_id);
        Ok(team)
    }

    /// Remove a participant from whatever session they are in.
    pub fn leave(&mut self, participant: &ParticipantId) -> Result<(SessionId, RosterEntry), DirectoryError> {
        let session_id = *self.participants
            .get(participant)
            .ok_or(DirectoryError::NotInSession(*participant))?;

        let entry = self.sessions
            .get_mut(&session_id)
            .and_then(|s| s.remove_participant(participant))
            .ok_or(DirectoryError::NotInSession(*participant))?;

        self.participants.remove(participant);
        Ok((session_id, entry))
    }

    /// Drop a session and forget all of its members.
    pub fn remove_session(&mut self, session_id: &SessionId) -> Option<GameSession> {
        let session = self.sessions.remove(session_id)?;
        self.participants.retain(|_, s| s != session_id);
        Some(session)
    }

    /// Session by id.
    pub fn get(&self, session_id: &SessionId) -> Option<&GameSession> {
        self.sessions.get(session_id)
    }

    /// Mutable session by id.
    pub fn get_mut(&mut self, session_id: &SessionId) -> Option<&mut GameSession> {
        self.sessions.get_mut(session_id)
    }

    /// Session a participant is in.
    pub fn session_of(&self, participant: &ParticipantId) -> Option<SessionId> {
        self.participants.get(participant).copied()
    }

    /// Oldest session of an arena that would accept a join.
    pub fn find_joinable(&self, arena: &ArenaId) -> Option<SessionId> {
        self.sessions
            .values()
            .filter(|s| &s.arena == arena && s.phase().accepts_joins() && !s.is_full())
            .min_by_key(|s| (s.created_at(), s.id))
            .map(|s| s.id)
    }

    /// Session ids in stable order.
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    /// All sessions.
    pub fn iter(&self) -> impl Iterator<Item = &GameSession> + '_ {
        self.sessions.values()
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of participants in any session.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    fn check_free(&self, participant: &ParticipantId) -> Result<(), DirectoryError> {
        match self.participants.get(participant) {
            Some(session) => Err(DirectoryError::AlreadyInSession {
                participant: *participant,
                session: *session,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u8) -> ParticipantId {
        ParticipantId::new([n; 16])
    }

    fn session(n: u8, capacity: usize) -> GameSession {
        GameSession::new(SessionId::new([n; 16]), ArenaId::new("castle"), capacity)
    }

    #[test]
    fn test_join_and_leave() {
        let mut dir = SessionDirectory::new();
        let s1 = session(1, 8);
        let id = s1.id;
        dir.insert(s1).unwrap();

        assert_eq!(dir.join(id, pid(1)), Ok(Team::Red));
        assert_eq!(dir.join(id, pid(2)), Ok(Team::Blue));
        assert_eq!(dir.session_of(&pid(1)), Some(id));

        let (left_from, entry) = dir.leave(&pid(1)).unwrap();
        assert_eq!(left_from, id);
        assert_eq!(entry.team, Team::Red);
        assert_eq!(dir.session_of(&pid(1)), None);
        assert_eq!(dir.get(&id).unwrap().participant_count(), 1);
        assert_eq!(dir.leave(&pid(1)), Err(DirectoryError::NotInSession(pid(1))));
    }

    #[test]
    fn test_one_session_per_participant() {
        let mut dir = SessionDirectory::new();
        let (a, b) = (session(1, 8), session(2, 8));
        let (ida, idb) = (a.id, b.id);
        dir.insert(a).unwrap();
        dir.insert(b).unwrap();

        dir.join(ida, pid(1)).unwrap();
        assert_eq!(
            dir.join(idb, pid(1)),
            Err(DirectoryError::AlreadyInSession { participant: pid(1), session: ida })
        );
        assert_eq!(dir.get(&idb).unwrap().participant_count(), 0);
    }

    #[test]
    fn test_failed_join_leaves_index_clean() {
        let mut dir = SessionDirectory::new();
        let s = session(1, 1);
        let id = s.id;
        dir.insert(s).unwrap();
        dir.join(id, pid(1)).unwrap();

        assert_eq!(dir.join(id, pid(2)), Err(DirectoryError::Session(SessionError::SessionFull)));
        assert_eq!(dir.session_of(&pid(2)), None);
        assert_eq!(dir.participant_count(), 1);
    }

    #[test]
    fn test_remove_session_forgets_members() {
        let mut dir = SessionDirectory::new();
        let s = session(1, 8);
        let id = s.id;
        dir.insert(s).unwrap();
        dir.join(id, pid(1)).unwrap();
        dir.join(id, pid(2)).unwrap();

        assert!(dir.remove_session(&id).is_some());
        assert!(dir.remove_session(&id).is_none());
        assert_eq!(dir.participant_count(), 0);
        assert!(dir.join(id, pid(1)).is_err());
    }

    #[test]
    fn test_find_joinable() {
        let mut dir = SessionDirectory::new();
        let full = session(1, 1);
        let full_id = full.id;
        dir.insert(full).unwrap();
        dir.join(full_id, pid(1)).unwrap();
        assert_eq!(dir.find_joinable(&ArenaId::new("castle")), None);

        let open = session(2, 8);
        let open_id = open.id;
        dir.insert(open).unwrap();
        assert_eq!(dir.find_joinable(&ArenaId::new("castle")), Some(open_id));
        assert_eq!(dir.find_joinable(&ArenaId::new("other")), None);

        dir.get_mut(&open_id).unwrap().advance(crate::game::session::Phase::TeamSelect).unwrap();
        assert_eq!(dir.find_joinable(&ArenaId::new("castle")), Some(open_id));
        dir.get_mut(&open_id).unwrap().advance(crate::game::session::Phase::Starting).unwrap();
        assert_eq!(dir.find_joinable(&ArenaId::new("castle")), None);
    }
}
