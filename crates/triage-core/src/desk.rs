//! The support desk: one knowledge snapshot, one conversation and one admin gate, owned
//! together. Mutations either complete or leave the desk exactly as it was.

use std::sync::Arc;

use crate::admin::{AdminGate, GateState};
use crate::conversation::{ChatMessage, ConversationSession, PendingReply, SessionMode};
use crate::error::{Result, TriageError};
use crate::knowledge::{KnowledgeBackend, KnowledgeEntry, KnowledgeStore, LexicalMatcher, Matcher};

pub struct SupportDesk {
    knowledge: KnowledgeStore,
    conversation: ConversationSession,
    gate: AdminGate,
    matcher: Arc<dyn Matcher>,
}

impl SupportDesk {
    pub fn new(knowledge: KnowledgeStore, conversation: ConversationSession, gate: AdminGate) -> Self {
        Self {
            knowledge,
            conversation,
            gate,
            matcher: Arc::new(LexicalMatcher),
        }
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    pub fn conversation(&self) -> &ConversationSession {
        &self.conversation
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        self.conversation.transcript()
    }

    pub fn mode(&self) -> SessionMode {
        self.conversation.mode()
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn is_admin(&self) -> bool {
        self.gate.is_unlocked()
    }

    // --- Conversation ---

    pub fn submit(&mut self, text: &str) -> Option<PendingReply> {
        self.conversation.submit(text, &self.knowledge, self.matcher.as_ref())
    }

    pub fn deliver(&mut self, reply: PendingReply) -> ChatMessage {
        self.conversation.deliver(reply).clone()
    }

    /// Submit and deliver in one step, for callers that do not delay replies.
    pub fn respond(&mut self, text: &str) -> Option<ChatMessage> {
        let reply = self.submit(text)?;
        Some(self.deliver(reply))
    }

    pub fn request_human_support(&mut self) -> Option<ChatMessage> {
        self.conversation.request_human_support().cloned()
    }

    pub fn resume_automated(&mut self) -> bool {
        self.conversation.resume_automated()
    }

    /// Up to `n` suggested topics for the user.
    pub fn popular_topics(&self, n: usize) -> Vec<String> {
        self.knowledge.popular_topics(n).into_iter().map(str::to_string).collect()
    }

    // --- Admin ---

    pub fn verify_admin(&mut self, secret: &str) -> bool {
        self.gate.verify(secret)
    }

    pub fn lock_admin(&mut self) {
        self.gate.lock();
    }

    pub fn add_or_update_entry(&mut self, entry: KnowledgeEntry) -> Result<Option<KnowledgeEntry>> {
        self.save_entry(entry, None)
    }

    /// Saves an entry, writing it through `backend` when given, and returns it as stored.
    ///
    /// An id this desk has not seen is looked up in `backend` (another desk may have created
    /// it since this one opened); the edit then applies to that entry. An id known to neither
    /// is not saved and yields `Ok(None)`. If the backend write fails the snapshot is left
    /// unchanged.
    pub fn save_entry(
        &mut self,
        entry: KnowledgeEntry,
        backend: Option<&dyn KnowledgeBackend>,
    ) -> Result<Option<KnowledgeEntry>> {
        self.require_admin()?;
        let Some(mut next) = self.snapshot_holding(entry.id(), backend)? else {
            tracing::warn!(
                target: "triage::knowledge",
                entry_id = entry.id().unwrap_or_default(),
                "Edit of unknown knowledge entry ignored"
            );
            return Ok(None);
        };
        let saved = next.add_or_update(entry)?;
        if let Some(backend) = backend {
            backend.save(&saved)?;
        }
        self.knowledge = next;
        Ok(Some(saved))
    }

    pub fn delete_entry(&mut self, id: &str) -> Result<bool> {
        self.remove_entry(id, None)
    }

    /// Deletes by id, also when only `backend` knows it. Unknown ids are a no-op returning
    /// `false`.
    pub fn remove_entry(&mut self, id: &str, backend: Option<&dyn KnowledgeBackend>) -> Result<bool> {
        self.require_admin()?;
        let Some(mut next) = self.snapshot_holding(Some(id), backend)? else {
            return Ok(false);
        };
        next.delete(id);
        if let Some(backend) = backend {
            backend.remove(id)?;
        }
        self.knowledge = next;
        Ok(true)
    }

    /// A copy of the knowledge to edit: the desk's own when it has `id` (or no id is given),
    /// else a fresh load from `backend` if that has it, else `None`.
    fn snapshot_holding(
        &self,
        id: Option<&str>,
        backend: Option<&dyn KnowledgeBackend>,
    ) -> Result<Option<KnowledgeStore>> {
        let Some(id) = id else {
            return Ok(Some(self.knowledge.clone()));
        };
        if self.knowledge.get(id).is_some() {
            return Ok(Some(self.knowledge.clone()));
        }
        let Some(backend) = backend else {
            return Ok(None);
        };
        let reloaded = KnowledgeStore::from_entries(backend.load()?);
        if reloaded.get(id).is_some() {
            tracing::debug!(target: "triage::knowledge", entry_id = id, "Reloaded stale knowledge snapshot");
            Ok(Some(reloaded))
        } else {
            Ok(None)
        }
    }

    pub fn search_entries(&self, term: &str) -> Result<Vec<KnowledgeEntry>> {
        self.require_admin()?;
        Ok(self.knowledge.search(term).into_iter().cloned().collect())
    }

    fn require_admin(&self) -> Result<()> {
        if self.gate.is_unlocked() {
            Ok(())
        } else {
            Err(TriageError::AdminLocked)
        }
    }
}

impl std::fmt::Debug for SupportDesk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupportDesk")
            .field("entries", &self.knowledge.len())
            .field("messages", &self.conversation.transcript().len())
            .field("mode", &self.conversation.mode())
            .field("gate", &self.gate.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::PassphraseVerifier;
    use crate::conversation::{HUMAN_SUPPORT_ACK, NO_MATCH_OFFER};
    use crate::knowledge::MemoryKnowledgeBackend;

    struct BrokenBackend;

    impl KnowledgeBackend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }

        fn load(&self) -> Result<Vec<KnowledgeEntry>> {
            Ok(Vec::new())
        }

        fn save(&self, _entry: &KnowledgeEntry) -> Result<()> {
            Err(TriageError::Storage("disk full".to_string()))
        }

        fn remove(&self, _id: &str) -> Result<()> {
            Err(TriageError::Storage("disk full".to_string()))
        }

        fn is_seeded(&self) -> Result<bool> {
            Ok(true)
        }

        fn mark_seeded(&self) -> Result<()> {
            Ok(())
        }
    }

    fn desk() -> SupportDesk {
        SupportDesk::new(
            KnowledgeStore::seeded(),
            ConversationSession::new(),
            AdminGate::new(Arc::new(PassphraseVerifier::new("admin123"))),
        )
    }

    fn unlocked() -> SupportDesk {
        let mut d = desk();
        assert!(d.verify_admin("admin123"));
        d
    }

    #[test]
    fn admin_operations_require_unlocked_gate() {
        let mut d = desk();
        assert_eq!(
            d.add_or_update_entry(KnowledgeEntry::draft("q", "a")),
            Err(TriageError::AdminLocked)
        );
        assert_eq!(d.delete_entry("1"), Err(TriageError::AdminLocked));
        assert_eq!(d.search_entries(""), Err(TriageError::AdminLocked));
        assert_eq!(d.knowledge().len(), 3);
    }

    #[test]
    fn wrong_secret_keeps_admin_locked() {
        let mut d = desk();
        assert!(!d.verify_admin("nope"));
        assert_eq!(d.gate_state(), GateState::Locked);
    }

    #[test]
    fn new_entry_is_immediately_matchable() {
        let mut d = unlocked();
        d.add_or_update_entry(KnowledgeEntry::draft(
            "¿Cómo reinicio el servidor?",
            "Use el script restart.sh",
        ))
        .unwrap();

        let reply = d.respond("reinicio servidor").unwrap();
        assert_eq!(reply.text, "Use el script restart.sh");
    }

    #[test]
    fn deleted_entry_no_longer_matches() {
        let mut d = unlocked();
        let question = d.knowledge().get("1").unwrap().question.clone();
        assert!(d.delete_entry("1").unwrap());
        assert!(!d.delete_entry("1").unwrap());

        let reply = d.respond(&question).unwrap();
        assert_ne!(reply.text, default_answer("1"));
    }

    fn default_answer(id: &str) -> String {
        KnowledgeStore::seeded().get(id).unwrap().answer.clone()
    }

    #[test]
    fn search_filters_case_insensitively() {
        let d = unlocked();
        let all = d.search_entries("").unwrap();
        assert_eq!(all.len(), 3);
        let hits = d.search_entries("IDEMPIERE").unwrap();
        assert!(!hits.is_empty());
        assert!(hits.len() <= 3);
    }

    #[test]
    fn failed_persist_leaves_snapshot_untouched() {
        let mut d = unlocked();
        let before = d.knowledge().clone();

        let err = d
            .save_entry(KnowledgeEntry::draft("q", "a"), Some(&BrokenBackend))
            .unwrap_err();
        assert_eq!(err.kind(), "storage");
        assert_eq!(d.knowledge(), &before);

        let err = d.remove_entry("2", Some(&BrokenBackend)).unwrap_err();
        assert_eq!(err.kind(), "storage");
        assert_eq!(d.knowledge(), &before);
    }

    #[test]
    fn saved_entries_are_written_through() {
        let mut d = unlocked();
        let backend = MemoryKnowledgeBackend::new();
        let saved = d
            .save_entry(KnowledgeEntry::draft("Pregunta", "Respuesta"), Some(&backend))
            .unwrap()
            .unwrap();
        assert_eq!(backend.load().unwrap(), vec![saved.clone()]);

        d.remove_entry(saved.id().unwrap(), Some(&backend)).unwrap();
        assert!(backend.load().unwrap().is_empty());
    }

    #[test]
    fn edit_of_unknown_id_is_not_saved() {
        let mut d = unlocked();
        let before = d.knowledge().clone();
        let backend = MemoryKnowledgeBackend::with_entries(default_entries_for_test());

        let saved = d
            .save_entry(KnowledgeEntry::with_id("ghost", "Q", "A"), Some(&backend))
            .unwrap();
        assert!(saved.is_none());
        assert_eq!(d.add_or_update_entry(KnowledgeEntry::with_id("ghost", "Q", "A")), Ok(None));
        assert_eq!(d.knowledge(), &before);
        assert_eq!(backend.load().unwrap().len(), 3);
    }

    #[test]
    fn stale_desk_edits_entry_created_elsewhere_in_place() {
        let backend = MemoryKnowledgeBackend::with_entries(default_entries_for_test());
        let mut first = unlocked();
        let mut stale = unlocked();

        let created = first
            .save_entry(KnowledgeEntry::draft("Q X", "A X"), Some(&backend))
            .unwrap()
            .unwrap();
        let id = created.id().unwrap().to_string();

        let edited = stale
            .save_entry(KnowledgeEntry::with_id(id.clone(), "Q X", "A X edited"), Some(&backend))
            .unwrap()
            .unwrap();
        assert_eq!(edited.id(), Some(id.as_str()));

        let stored = backend.load().unwrap();
        assert_eq!(stored.len(), 4);
        assert_eq!(stored.iter().filter(|e| e.question == "Q X").count(), 1);
        assert_eq!(stored[3].answer, "A X edited");
        assert_eq!(stale.knowledge().get(&id).map(|e| e.answer.as_str()), Some("A X edited"));

        assert!(first.remove_entry(&id, Some(&backend)).unwrap());
        let mut other = unlocked();
        assert!(!other.remove_entry(&id, Some(&backend)).unwrap());
        assert_eq!(backend.load().unwrap().len(), 3);
    }

    fn default_entries_for_test() -> Vec<KnowledgeEntry> {
        KnowledgeStore::seeded().entries().to_vec()
    }

    #[test]
    fn handoff_round_trip() {
        let mut d = desk();
        assert!(d.request_human_support().is_some());
        assert_eq!(d.respond("hola").unwrap().text, HUMAN_SUPPORT_ACK);
        assert!(d.resume_automated());
        assert_eq!(d.respond("zzzz yyyy").unwrap().text, NO_MATCH_OFFER);
    }

    #[test]
    fn popular_topics_are_first_three_questions() {
        let d = desk();
        let topics = d.popular_topics(3);
        let expected: Vec<String> = KnowledgeStore::seeded()
            .entries()
            .iter()
            .map(|e| e.question.clone())
            .collect();
        assert_eq!(topics, expected);
    }
}
