//! store::tables
//!
//! Indexed in-memory tables shared by every backend.
//!
//! The repository and branch tables ([`RefTables`]) are small and cloned
//! freely: a batch is staged against a clone and swapped in only once it has
//! been persisted. Commit records are large, immutable, and only ever
//! inserted, so they are indexed in place.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::{Batch, StoreError, Write};
use crate::core::schema::{Branch, Commit, Repository};
use crate::core::types::{BranchId, BranchName, CommitId, RepositoryId};

/// Repository and branch records with their unique name index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefTables {
    pub repositories: BTreeMap<RepositoryId, Repository>,
    pub branches: BTreeMap<BranchId, Branch>,
    names: BTreeMap<BranchName, BranchId>,
}

impl RefTables {
    /// Build the tables from loaded records.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateName` if two branches share a name, and
    /// `StoreError::AlreadyExists` on a repeated id.
    pub fn from_records(
        repositories: Vec<Repository>,
        branches: Vec<Branch>,
    ) -> Result<Self, StoreError> {
        let mut tables = Self::default();
        for repo in repositories {
            if tables.repositories.contains_key(&repo.id) {
                return Err(StoreError::AlreadyExists {
                    table: "repositories",
                    key: repo.id.to_string(),
                });
            }
            tables.repositories.insert(repo.id.clone(), repo);
        }
        for branch in branches {
            if tables.branches.contains_key(&branch.id) {
                return Err(StoreError::AlreadyExists {
                    table: "branches",
                    key: branch.id.to_string(),
                });
            }
            if tables.names.contains_key(&branch.name) {
                return Err(StoreError::DuplicateName(branch.name.to_string()));
            }
            tables.names.insert(branch.name.clone(), branch.id.clone());
            tables.branches.insert(branch.id.clone(), branch);
        }
        Ok(tables)
    }

    pub fn branch_by_name(&self, name: &BranchName) -> Option<&Branch> {
        self.names.get(name).and_then(|id| self.branches.get(id))
    }

    /// Branches ordered by name.
    pub fn branches_by_name(&self) -> Vec<Branch> {
        self.names
            .values()
            .filter_map(|id| self.branches.get(id))
            .cloned()
            .collect()
    }

    /// Apply the ref writes of an already validated batch.
    fn apply(&mut self, write: &Write) {
        match write {
            Write::CreateRepository(repo) | Write::UpdateRepository(repo) => {
                self.repositories.insert(repo.id.clone(), repo.clone());
            }
            Write::InsertBranch(branch) | Write::UpdateBranch(branch) => {
                self.names.insert(branch.name.clone(), branch.id.clone());
                self.branches.insert(branch.id.clone(), branch.clone());
            }
            Write::DeleteBranch(id) => {
                if let Some(branch) = self.branches.remove(id) {
                    self.names.remove(&branch.name);
                }
            }
            Write::InsertCommit(_) => {}
        }
    }
}

/// Commit records with their branch and parent indexes.
#[derive(Debug, Default)]
pub struct CommitTables {
    records: HashMap<CommitId, Commit>,
    by_branch: HashMap<BranchId, Vec<CommitId>>,
    children: HashMap<CommitId, Vec<CommitId>>,
}

impl CommitTables {
    pub fn get(&self, id: &CommitId) -> Option<&Commit> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &CommitId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> Vec<CommitId> {
        self.records.keys().cloned().collect()
    }

    /// All commits ordered by timestamp, then id.
    pub fn sorted(&self) -> Vec<Commit> {
        sort_commits(self.records.values().cloned().collect())
    }

    pub fn on_branch(&self, branch: &BranchId) -> Vec<Commit> {
        let commits = self
            .by_branch
            .get(branch)
            .map(|ids| ids.iter().filter_map(|id| self.records.get(id)).cloned().collect())
            .unwrap_or_default();
        sort_commits(commits)
    }

    pub fn children(&self, id: &CommitId) -> Vec<CommitId> {
        self.children.get(id).cloned().unwrap_or_default()
    }

    /// Index and store a commit. Replaces nothing: callers validate first.
    pub fn insert(&mut self, commit: Commit) {
        self.by_branch
            .entry(commit.branch_id.clone())
            .or_default()
            .push(commit.id.clone());
        for parent in &commit.parents {
            self.children
                .entry(parent.clone())
                .or_default()
                .push(commit.id.clone());
        }
        self.records.insert(commit.id.clone(), commit);
    }

    /// Drop a commit and its index entries.
    pub fn remove(&mut self, id: &CommitId) -> Option<Commit> {
        let commit = self.records.remove(id)?;
        if let Some(ids) = self.by_branch.get_mut(&commit.branch_id) {
            ids.retain(|c| c != id);
        }
        for parent in &commit.parents {
            if let Some(ids) = self.children.get_mut(parent) {
                ids.retain(|c| c != id);
            }
        }
        Some(commit)
    }
}

fn sort_commits(mut commits: Vec<Commit>) -> Vec<Commit> {
    commits.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    commits
}

/// The full set of tables behind a backend.
#[derive(Debug, Default)]
pub struct Tables {
    pub refs: RefTables,
    pub commits: CommitTables,
}

impl Tables {
    /// Check every write of `batch` against the current tables plus the
    /// effects of the writes before it.
    ///
    /// # Errors
    ///
    /// Returns the first precondition that does not hold. Nothing is modified.
    pub fn validate(&self, batch: &Batch) -> Result<(), StoreError> {
        let mut repositories: HashSet<&RepositoryId> = self.refs.repositories.keys().collect();
        let mut branches: HashMap<&BranchId, &BranchName> = self
            .refs
            .branches
            .values()
            .map(|b| (&b.id, &b.name))
            .collect();
        let mut names: HashSet<&BranchName> = self.refs.names.keys().collect();
        let mut new_commits: HashSet<&CommitId> = HashSet::new();

        for write in batch.writes() {
            match write {
                Write::CreateRepository(repo) => {
                    if !repositories.insert(&repo.id) {
                        return Err(StoreError::AlreadyExists {
                            table: "repositories",
                            key: repo.id.to_string(),
                        });
                    }
                }
                Write::UpdateRepository(repo) => {
                    if !repositories.contains(&repo.id) {
                        return Err(StoreError::Missing {
                            table: "repositories",
                            key: repo.id.to_string(),
                        });
                    }
                }
                Write::InsertBranch(branch) => {
                    if branches.contains_key(&branch.id) {
                        return Err(StoreError::AlreadyExists {
                            table: "branches",
                            key: branch.id.to_string(),
                        });
                    }
                    if !names.insert(&branch.name) {
                        return Err(StoreError::DuplicateName(branch.name.to_string()));
                    }
                    branches.insert(&branch.id, &branch.name);
                }
                Write::UpdateBranch(branch) => match branches.get(&branch.id) {
                    None => {
                        return Err(StoreError::Missing {
                            table: "branches",
                            key: branch.id.to_string(),
                        })
                    }
                    Some(name) if **name != branch.name => {
                        return Err(StoreError::RenameUnsupported(name.to_string()))
                    }
                    Some(_) => {}
                },
                Write::DeleteBranch(id) => match branches.remove(id) {
                    None => {
                        return Err(StoreError::Missing {
                            table: "branches",
                            key: id.to_string(),
                        })
                    }
                    Some(name) => {
                        names.remove(name);
                    }
                },
                Write::InsertCommit(commit) => {
                    if self.commits.contains(&commit.id) || !new_commits.insert(&commit.id) {
                        return Err(StoreError::AlreadyExists {
                            table: "commits",
                            key: commit.id.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// The ref tables as they will look after `batch`.
    ///
    /// The batch must already have passed [`Tables::validate`].
    pub fn stage_refs(&self, batch: &Batch) -> RefTables {
        let mut refs = self.refs.clone();
        for write in batch.writes().iter().filter(|w| w.touches_refs()) {
            refs.apply(write);
        }
        refs
    }

    /// Install staged refs and the batch's commits.
    pub fn install(&mut self, refs: RefTables, batch: Batch) {
        self.refs = refs;
        for write in batch.writes {
            if let Write::InsertCommit(commit) = write {
                self.commits.insert(commit);
            }
        }
    }

    /// Validate and apply a batch in one step.
    pub fn apply(&mut self, batch: Batch) -> Result<(), StoreError> {
        self.validate(&batch)?;
        let refs = self.stage_refs(&batch);
        self.install(refs, batch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::UtcTimestamp;

    fn repo(active: &BranchId) -> Repository {
        Repository {
            id: RepositoryId::singleton(),
            name: "Main Repository".into(),
            created_at: UtcTimestamp::now(),
            active_branch: active.clone(),
        }
    }

    fn commit(id: &str, branch: &BranchId, parents: &[&str]) -> Commit {
        Commit {
            id: CommitId::new(id).unwrap(),
            branch_id: branch.clone(),
            message: id.into(),
            author: "user".into(),
            timestamp: UtcTimestamp::now(),
            parents: parents.iter().map(|p| CommitId::new(*p).unwrap()).collect(),
            is_snapshot: parents.is_empty(),
            payload: vec![],
            thumbnail: None,
        }
    }

    #[test]
    fn create_repository_and_branch_together() {
        let mut tables = Tables::default();
        let main = Branch::new(BranchName::main(), None);
        let batch = Batch::new()
            .with(Write::CreateRepository(repo(&main.id)))
            .with(Write::InsertBranch(main.clone()));
        tables.apply(batch).unwrap();
        assert_eq!(tables.refs.branch_by_name(&BranchName::main()), Some(&main));
    }

    #[test]
    fn invalid_batch_changes_nothing() {
        let mut tables = Tables::default();
        let main = Branch::new(BranchName::main(), None);
        let clash = Branch::new(BranchName::main(), None);
        let batch = Batch::new()
            .with(Write::CreateRepository(repo(&main.id)))
            .with(Write::InsertBranch(main))
            .with(Write::InsertBranch(clash));
        assert!(matches!(
            tables.apply(batch),
            Err(StoreError::DuplicateName(_))
        ));
        assert!(tables.refs.repositories.is_empty());
        assert!(tables.refs.branches.is_empty());
    }

    #[test]
    fn name_freed_by_delete_in_same_batch() {
        let mut tables = Tables::default();
        let old = Branch::new(BranchName::new("x").unwrap(), None);
        tables
            .apply(Batch::new().with(Write::InsertBranch(old.clone())))
            .unwrap();
        let new = Branch::new(BranchName::new("x").unwrap(), None);
        tables
            .apply(
                Batch::new()
                    .with(Write::DeleteBranch(old.id))
                    .with(Write::InsertBranch(new.clone())),
            )
            .unwrap();
        assert_eq!(tables.refs.branch_by_name(&new.name), Some(&new));
    }

    #[test]
    fn rename_rejected() {
        let mut tables = Tables::default();
        let branch = Branch::new(BranchName::new("a").unwrap(), None);
        tables
            .apply(Batch::new().with(Write::InsertBranch(branch.clone())))
            .unwrap();
        let mut renamed = branch;
        renamed.name = BranchName::new("b").unwrap();
        assert!(matches!(
            tables.apply(Batch::new().with(Write::UpdateBranch(renamed))),
            Err(StoreError::RenameUnsupported(_))
        ));
    }

    #[test]
    fn commits_are_never_overwritten() {
        let mut tables = Tables::default();
        let b = BranchId::generate();
        tables
            .apply(Batch::new().with(Write::InsertCommit(commit("c1", &b, &[]))))
            .unwrap();
        assert!(matches!(
            tables.apply(Batch::new().with(Write::InsertCommit(commit("c1", &b, &[])))),
            Err(StoreError::AlreadyExists { table: "commits", .. })
        ));
    }

    #[test]
    fn children_index_tracks_both_parents() {
        let mut tables = Tables::default();
        let b = BranchId::generate();
        let batch = Batch::new()
            .with(Write::InsertCommit(commit("a", &b, &[])))
            .with(Write::InsertCommit(commit("b", &b, &["a"])))
            .with(Write::InsertCommit(commit("m", &b, &["b", "a"])));
        tables.apply(batch).unwrap();

        let a = CommitId::new("a").unwrap();
        let mut kids = tables.commits.children(&a);
        kids.sort();
        assert_eq!(
            kids,
            vec![CommitId::new("b").unwrap(), CommitId::new("m").unwrap()]
        );
        assert_eq!(tables.commits.on_branch(&b).len(), 3);

        tables.commits.remove(&CommitId::new("m").unwrap());
        assert_eq!(tables.commits.children(&a), vec![CommitId::new("b").unwrap()]);
    }
}
