//! In-memory, ordered knowledge store owned by a single desk.

use uuid::Uuid;

use super::KnowledgeEntry;
use crate::error::{Result, TriageError};

/// Entries every fresh desk starts with when no saved snapshot exists.
pub fn default_entries() -> Vec<KnowledgeEntry> {
    vec![
        KnowledgeEntry::with_id(
            "1",
            "¿Qué es iDempiere?",
            "iDempiere es un software ERP (Enterprise Resource Planning) de código abierto basado en Java que ofrece funcionalidades de contabilidad, gestión de inventario, ventas, compras, CRM y más.",
        ),
        KnowledgeEntry::with_id(
            "2",
            "¿Cómo instalar iDempiere?",
            "Para instalar iDempiere, debe descargar el instalador desde la página oficial, configurar su base de datos PostgreSQL y seguir las instrucciones del asistente de instalación. Se recomienda revisar la documentación oficial para requisitos detallados.",
        ),
        KnowledgeEntry::with_id(
            "3",
            "¿Cómo crear un nuevo usuario en iDempiere?",
            "Para crear un nuevo usuario en iDempiere, debe acceder a la opción \"Seguridad\" en el menú principal, seleccionar \"Usuario/Contraseñas\" y hacer clic en el botón \"Nuevo\". Complete los campos requeridos y asigne los roles correspondientes.",
        ),
    ]
}

/// Ordered question/answer entries. Ids are unique; question and answer are trimmed and
/// non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeStore {
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding [`default_entries`].
    pub fn seeded() -> Self {
        Self::from_entries(default_entries())
    }

    /// Builds a store from a loaded snapshot, enforcing the store invariants: blank entries are
    /// skipped, entries without an id get one, and a repeated id replaces the earlier entry in place.
    pub fn from_entries(entries: impl IntoIterator<Item = KnowledgeEntry>) -> Self {
        let mut store = Self::new();
        for entry in entries {
            if let Err(e) = store.restore(entry) {
                tracing::warn!(target: "triage::knowledge", error = %e, "Skipping invalid entry in snapshot");
            }
        }
        store
    }

    /// Like `add_or_update`, but an unknown id is kept instead of replaced.
    fn restore(&mut self, entry: KnowledgeEntry) -> Result<()> {
        let Some(id) = entry.id().map(str::to_string) else {
            return self.add_or_update(entry).map(|_| ());
        };
        if self.get(&id).is_some() {
            return self.add_or_update(entry).map(|_| ());
        }
        let (question, answer) = (entry.question.trim(), entry.answer.trim());
        if question.is_empty() || answer.is_empty() {
            return Err(TriageError::Validation(format!("entry '{}' is blank", id)));
        }
        self.entries.push(KnowledgeEntry::with_id(id, question, answer));
        Ok(())
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&KnowledgeEntry> {
        self.entries.iter().find(|e| e.id() == Some(id))
    }

    /// Saves an entry and returns it as stored.
    ///
    /// Rejected (store untouched) when question or answer is blank after trimming. A known id is
    /// replaced in place; a missing or unknown id gets a fresh one and is appended.
    pub fn add_or_update(&mut self, entry: KnowledgeEntry) -> Result<KnowledgeEntry> {
        let question = entry.question.trim();
        let answer = entry.answer.trim();
        if question.is_empty() || answer.is_empty() {
            return Err(TriageError::Validation(
                "question and answer are both required".to_string(),
            ));
        }

        if let Some(id) = entry.id() {
            if let Some(existing) = self.entries.iter_mut().find(|e| e.id() == Some(id)) {
                existing.question = question.to_string();
                existing.answer = answer.to_string();
                tracing::info!(
                    target: "triage::knowledge",
                    entry_id = id,
                    action = "UPDATE",
                    "Knowledge entry '{}' updated",
                    id
                );
                return Ok(existing.clone());
            }
        }

        let saved = KnowledgeEntry::with_id(Uuid::new_v4().to_string(), question, answer);
        tracing::info!(
            target: "triage::knowledge",
            entry_id = saved.id().unwrap_or_default(),
            action = "INSERT",
            entries = self.entries.len() + 1,
            "Knowledge entry added"
        );
        self.entries.push(saved.clone());
        Ok(saved)
    }

    /// Removes the entry with `id`. Returns whether anything was removed.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id() != Some(id));
        let removed = self.entries.len() != before;
        if removed {
            tracing::info!(target: "triage::knowledge", entry_id = id, action = "REMOVE", "Knowledge entry removed");
        }
        removed
    }

    /// Entries whose question or answer contains `term`, case-insensitively, in store order.
    /// An empty term returns everything.
    pub fn search(&self, term: &str) -> Vec<&KnowledgeEntry> {
        let lowered = term.to_lowercase();
        self.entries.iter().filter(|e| e.mentions(&lowered)).collect()
    }

    /// The first `n` questions, shown to users as suggested topics.
    pub fn popular_topics(&self, n: usize) -> Vec<&str> {
        self.entries.iter().take(n).map(|e| e.question.as_str()).collect()
    }
}
