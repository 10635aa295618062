use std::collections::HashMap;

use crate::error::CoreError;

/// A row owned by a [`RecordStore`], addressed by a unique id.
pub trait Record: Clone {
    fn id(&self) -> &str;
    fn description(&self) -> &str;
}

/// A record that belongs to a display group.
pub trait Categorized: Record {
    fn category(&self) -> &str;
}

/// In-memory collection of one view's records, kept in insertion order.
///
/// Mutations are synchronous and return the updated collection. Persistence happens outside the
/// store, and a failed save never rolls a mutation back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStore<T> {
    records: Vec<T>,
}

impl<T> Default for RecordStore<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<T: Record> RecordStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an authoritative collection as returned by the data source. No validation is
    /// applied; the source of truth already accepted these records.
    #[must_use]
    pub fn from_records(records: Vec<T>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn records(&self) -> &[T] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.iter().find(|record| record.id() == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|record| record.id() == id)
    }

    /// Insert `record` at the end, or replace the record with the same id in place.
    ///
    /// # Errors
    /// Returns [`CoreError::Validation`] when the id or the description is blank. The store is
    /// left untouched in that case.
    pub fn upsert(&mut self, record: T) -> Result<&[T], CoreError> {
        validate(&record)?;
        match self.position(record.id()) {
            Some(index) => self.records[index] = record,
            None => self.records.push(record),
        }
        Ok(&self.records)
    }

    /// Delete by id. Deleting an absent id is a successful no-op.
    pub fn remove(&mut self, id: &str) -> &[T] {
        self.take(id);
        &self.records
    }

    /// Delete by id and hand back the removed record, if any.
    pub fn take(&mut self, id: &str) -> Option<T> {
        self.position(id).map(|index| self.records.remove(index))
    }

    pub fn replace_all(&mut self, records: Vec<T>) {
        self.records = records;
    }
}

impl<T: Categorized> RecordStore<T> {
    /// Records grouped by category. Groups follow the first appearance of each category and keep
    /// insertion order inside a group.
    #[must_use]
    pub fn list_by_category(&self) -> Vec<(String, Vec<&T>)> {
        let mut groups: Vec<(String, Vec<&T>)> = Vec::new();
        let mut index_by_category: HashMap<&str, usize> = HashMap::new();
        for record in &self.records {
            let index = match index_by_category.get(record.category()) {
                Some(index) => *index,
                None => {
                    groups.push((record.category().to_string(), Vec::new()));
                    index_by_category.insert(record.category(), groups.len() - 1);
                    groups.len() - 1
                }
            };
            groups[index].1.push(record);
        }
        groups
    }

    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        self.list_by_category()
            .into_iter()
            .map(|(category, _)| category)
            .collect()
    }

    /// Delete every record of `category`, returning the removed records in their old order.
    pub fn remove_category(&mut self, category: &str) -> Vec<T> {
        let (removed, kept): (Vec<T>, Vec<T>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|record| record.category() == category);
        self.records = kept;
        removed
    }
}

fn validate<T: Record>(record: &T) -> Result<(), CoreError> {
    let missing = if record.id().trim().is_empty() {
        "id"
    } else if record.description().trim().is_empty() {
        "task description"
    } else {
        return Ok(());
    };
    Err(CoreError::Validation(format!("{missing} MUST be provided")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{AssignmentState, TeamTask};

    fn task(id: &str, category: &str) -> TeamTask {
        TeamTask::new(id, format!("task {id}"), category)
    }

    fn ids(records: &[TeamTask]) -> Vec<&str> {
        records.iter().map(|record| record.id.as_str()).collect()
    }

    fn store(records: Vec<TeamTask>) -> RecordStore<TeamTask> {
        let mut store = RecordStore::new();
        for record in records {
            if let Err(err) = store.upsert(record) {
                panic!("fixture record should be valid: {err}");
            }
        }
        store
    }

    #[test]
    fn upsert_inserts_then_replaces_in_place() {
        let mut store = store(vec![task("a", "1. SAFETY"), task("b", "1. SAFETY")]);
        let updated = task("a", "1. SAFETY").with_assignment("PX", AssignmentState::Primary);
        let records = match store.upsert(updated) {
            Ok(records) => records.to_vec(),
            Err(err) => panic!("replace should succeed: {err}"),
        };
        assert_eq!(ids(&records), vec!["a", "b"]);
        assert_eq!(records[0].assignment("PX"), AssignmentState::Primary);
    }

    #[test]
    fn upsert_rejects_blank_id_and_description_without_mutation() {
        let mut store = store(vec![task("a", "1. SAFETY")]);
        let blank_id = TeamTask::new("  ", "something", "1. SAFETY");
        let blank_task = TeamTask::new("b", "", "1. SAFETY");

        for record in [blank_id, blank_task] {
            match store.upsert(record) {
                Err(CoreError::Validation(message)) => assert!(message.contains("MUST")),
                Ok(_) => panic!("blank fields must be rejected"),
            }
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut store = store(vec![task("a", "x"), task("b", "x")]);
        assert_eq!(ids(store.remove("a")), vec!["b"]);
        assert_eq!(ids(store.remove("a")), vec!["b"]);
        assert!(store.take("missing").is_none());
    }

    #[test]
    fn categories_follow_first_appearance_not_alphabet() {
        let store = store(vec![
            task("a", "2. QUALITY"),
            task("b", "1. SAFETY"),
            task("c", "2. QUALITY"),
            task("d", "10. CLOSEOUT"),
        ]);
        let groups = store.list_by_category();
        let names: Vec<&str> = groups.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["2. QUALITY", "1. SAFETY", "10. CLOSEOUT"]);
        let quality: Vec<&str> = groups[0].1.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(quality, vec!["a", "c"]);
    }

    #[test]
    fn removing_a_category_leaves_other_categories_untouched() {
        let mut store = store(vec![
            task("s1", "1. SAFETY"),
            task("q1", "2. QUALITY"),
            task("s2", "1. SAFETY"),
            task("q2", "2. QUALITY"),
        ]);
        let removed = store.remove_category("1. SAFETY");
        assert_eq!(ids(&removed), vec!["s1", "s2"]);
        assert_eq!(ids(store.records()), vec!["q1", "q2"]);
        assert!(store.remove_category("1. SAFETY").is_empty());
    }
}
