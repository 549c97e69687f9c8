use std::sync::{Arc, Mutex};

use chrono::Utc;
use quill_dag::{list_partitions, partition_exists, Aggregate, Manifest, Rehydrator, ReplayStats};
use quill_index::{ChronologicalIndex, IndexCursor, IndexOptions};
use quill_pack::{Affix, Checkpoint, JsonPacker, DATE_FIELD};
use quill_refs::{FsRefStore, InMemoryRefStore, RefError, RefStore};
use quill_store::{FsObjectStore, InMemoryObjectStore, ObjectStore};
use quill_types::{Hash, PartitionName};
use tracing::{debug, info};

use crate::append::{AppendRequest, AppendResult};
use crate::claim::{ClaimGuard, ClaimRegistry};
use crate::config::{BackendConfig, RepositoryConfig};
use crate::error::{SdkError, SdkResult};

/// High-level Quill repository API.
///
/// Owns an object store and a ref store and drives every operation against
/// one head ref. Appends through a single `Repository` are serialized;
/// reads run concurrently with them.
pub struct Repository {
    objects: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefStore>,
    head_ref: String,
    index_options: IndexOptions,
    claims: ClaimRegistry,
    append_lock: Mutex<()>,
}

impl Repository {
    /// Open the backend `config` describes.
    pub fn open(config: &RepositoryConfig) -> SdkResult<Self> {
        config.validate()?;
        let (objects, refs): (Arc<dyn ObjectStore>, Arc<dyn RefStore>) = match &config.backend {
            BackendConfig::Memory => (
                Arc::new(InMemoryObjectStore::new()),
                Arc::new(InMemoryRefStore::new()),
            ),
            BackendConfig::Filesystem { objects, refs } => (
                Arc::new(FsObjectStore::open(objects)?),
                Arc::new(FsRefStore::open(refs)?),
            ),
        };
        info!(head_ref = %config.head_ref, backend = ?config.backend, "repository opened");
        Ok(Self::with_stores(objects, refs, config))
    }

    /// A fresh in-memory repository with default settings.
    pub fn in_memory() -> Self {
        Self::with_stores(
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(InMemoryRefStore::new()),
            &RepositoryConfig::default(),
        )
    }

    /// Wrap existing stores.
    pub fn with_stores(
        objects: Arc<dyn ObjectStore>,
        refs: Arc<dyn RefStore>,
        config: &RepositoryConfig,
    ) -> Self {
        Self {
            objects,
            refs,
            head_ref: config.head_ref.clone(),
            index_options: config.index_options(),
            claims: ClaimRegistry::new(config.claim_timeout()),
            append_lock: Mutex::new(()),
        }
    }

    // ---- Write path ----

    /// Store `request`'s events, an affix grouping them by partition, and a
    /// checkpoint on top of the current head; then advance the head ref.
    ///
    /// The checkpoint is validated before anything is written. When the head
    /// ref is symbolic, the ref it resolves to is advanced and the head ref
    /// keeps pointing at it.
    pub fn append(&self, request: AppendRequest) -> SdkResult<AppendResult> {
        if request.fields.contains_key(DATE_FIELD) {
            return Err(SdkError::ReservedField(DATE_FIELD.to_string()));
        }
        let _serialized = self.append_lock.lock().map_err(|_| SdkError::LockPoisoned)?;
        let packer = JsonPacker::new();

        let mut affix = Affix::new();
        for (partition, event) in &request.events {
            affix.push(partition.clone(), *event.hash());
        }
        let packed_affix = packer.pack_affix(&affix)?;

        let branch = self.refs.resolve_name(&self.head_ref)?;
        let parent = match self.refs.retrieve(&branch) {
            Ok(hash) => Some(hash),
            Err(RefError::UnknownRef { .. }) => None,
            Err(e) => return Err(e.into()),
        };
        let mut checkpoint = Checkpoint::new(*packed_affix.hash())
            .with_command_desc(request.command_desc);
        for (key, value) in request.fields {
            checkpoint = checkpoint.with_field(key, value);
        }
        checkpoint = checkpoint.with_date(request.date.unwrap_or_else(Utc::now));
        if let Some(summary) = request.summary {
            checkpoint = checkpoint.with_summary(summary);
        }
        if let Some(parent) = parent {
            checkpoint = checkpoint.with_parent(parent);
        }
        checkpoint.validate()?;
        let packed = packer.pack_checkpoint(&checkpoint)?;

        let mut bytes_written = 0;
        for (_, event) in &request.events {
            bytes_written += self.objects.write_packed(event)?;
        }
        bytes_written += self.objects.write_packed(&packed_affix)?;
        bytes_written += self.objects.write_packed(&packed)?;

        let ref_moved = self.refs.write(&branch, packed.hash())?;
        debug!(
            checkpoint = %packed.hash().short_hex(),
            branch = %branch,
            partitions = affix.len(),
            events = affix.event_count(),
            ref_moved,
            "appended"
        );
        Ok(AppendResult {
            checkpoint: *packed.hash(),
            affix: *packed_affix.hash(),
            parent,
            bytes_written,
            ref_moved,
        })
    }

    /// Reserve `partition` for the caller until the guard drops.
    pub async fn claim(&self, partition: &PartitionName) -> SdkResult<ClaimGuard> {
        Ok(self.claims.claim(partition).await?)
    }

    // ---- Read path ----

    /// The checkpoint the head ref points at, `None` before the first append.
    pub fn head(&self) -> SdkResult<Option<Hash>> {
        match self.refs.resolve(&self.head_ref) {
            Ok(hash) => Ok(Some(hash)),
            Err(RefError::UnknownRef { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replay every event in partitions matching `pattern` onto `aggregate`,
    /// oldest first.
    pub fn rehydrate<E, A>(
        &self,
        pattern: &str,
        manifest: &Manifest<E>,
        aggregate: &mut A,
    ) -> SdkResult<ReplayStats>
    where
        A: Aggregate<E>,
    {
        self.rehydrate_at(&self.head_ref, pattern, manifest, aggregate)
    }

    /// [`rehydrate`](Self::rehydrate) from an arbitrary ref.
    pub fn rehydrate_at<E, A>(
        &self,
        ref_name: &str,
        pattern: &str,
        manifest: &Manifest<E>,
        aggregate: &mut A,
    ) -> SdkResult<ReplayStats>
    where
        A: Aggregate<E>,
    {
        let rehydrator = Rehydrator::new(&*self.objects, &*self.refs);
        Ok(rehydrator.rehydrate(ref_name, pattern, manifest, aggregate)?)
    }

    /// Whether any partition matching `pattern` has ever been appended to.
    pub fn exists(&self, pattern: &str) -> SdkResult<bool> {
        Ok(partition_exists(
            &*self.objects,
            &*self.refs,
            &self.head_ref,
            pattern,
        )?)
    }

    /// Every partition matching `pattern`, sorted by name.
    pub fn list_partitions(&self, pattern: &str) -> SdkResult<Vec<PartitionName>> {
        Ok(list_partitions(
            &*self.objects,
            &*self.refs,
            &self.head_ref,
            pattern,
        )?)
    }

    /// Build the chronological index of the head ref's history.
    pub async fn index(&self) -> SdkResult<IndexCursor> {
        self.index_at(&self.head_ref).await
    }

    pub async fn index_at(&self, ref_name: &str) -> SdkResult<IndexCursor> {
        Ok(ChronologicalIndex::build(
            Arc::clone(&self.objects),
            &*self.refs,
            ref_name,
            self.index_options,
        )
        .await?)
    }

    // ---- Accessors ----

    pub fn head_ref(&self) -> &str {
        &self.head_ref
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    pub fn refs(&self) -> &Arc<dyn RefStore> {
        &self.refs
    }

    pub fn claims(&self) -> &ClaimRegistry {
        &self.claims
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("head_ref", &self.head_ref)
            .field("index_options", &self.index_options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use quill_dag::{DagError, Event};
    use quill_refs::RefTarget;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    #[serde(tag = "type")]
    enum Ledger {
        Deposited { amount: u64 },
        Withdrawn { amount: u64 },
    }

    impl Event for Ledger {
        fn name(&self) -> &str {
            match self {
                Ledger::Deposited { .. } => "deposited",
                Ledger::Withdrawn { .. } => "withdrawn",
            }
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("overdrawn")]
    struct Overdrawn;

    #[derive(Debug, Default)]
    struct Balance {
        amount: u64,
        reactions: usize,
    }

    impl Aggregate<Ledger> for Balance {
        type Error = Overdrawn;

        fn react_to(&mut self, event: Ledger) -> Result<(), Overdrawn> {
            self.reactions += 1;
            match event {
                Ledger::Deposited { amount } => self.amount += amount,
                Ledger::Withdrawn { amount } => {
                    self.amount = self.amount.checked_sub(amount).ok_or(Overdrawn)?;
                }
            }
            Ok(())
        }
    }

    fn manifest() -> Manifest<Ledger> {
        let mut m = Manifest::new();
        m.register_json::<Ledger>("deposited").unwrap();
        m.register_json::<Ledger>("withdrawn").unwrap();
        m
    }

    fn account(id: u32) -> PartitionName {
        PartitionName::new(format!("account/{id}")).unwrap()
    }

    fn deposit(amount: u64) -> Ledger {
        Ledger::Deposited { amount }
    }

    fn at(seconds: i64) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 3, 1, 10, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    #[test]
    fn first_append_is_a_root() {
        let repo = Repository::in_memory();
        assert_eq!(repo.head().unwrap(), None);

        let request = AppendRequest::new()
            .event(account(1), &deposit(10))
            .unwrap()
            .with_summary("open");
        let result = repo.append(request).unwrap();
        assert_eq!(result.parent, None);
        assert!(result.ref_moved);
        assert!(result.bytes_written > 0);
        assert_eq!(repo.head().unwrap(), Some(result.checkpoint));
    }

    #[test]
    fn appends_chain_and_replay_oldest_first() {
        let repo = Repository::in_memory();
        let mut previous = None;
        for (i, amount) in [5, 7, 11].into_iter().enumerate() {
            let request = AppendRequest::new()
                .event(account(1), &deposit(amount))
                .unwrap()
                .with_date(at(i as i64 * 5));
            let result = repo.append(request).unwrap();
            assert_eq!(result.parent, previous);
            previous = Some(result.checkpoint);
        }
        repo.append(
            AppendRequest::new()
                .event(account(1), &Ledger::Withdrawn { amount: 20 })
                .unwrap()
                .event(account(2), &deposit(1))
                .unwrap()
                .with_date(at(20)),
        )
        .unwrap();

        let mut balance = Balance::default();
        let stats = repo.rehydrate("account/1", &manifest(), &mut balance).unwrap();
        assert_eq!(balance.amount, 3);
        assert_eq!(balance.reactions, 4);
        assert_eq!(stats.events_applied, 4);
        assert_eq!(stats.checkpoints_visited, 4);
    }

    #[test]
    fn replay_failure_is_positional() {
        let repo = Repository::in_memory();
        repo.append(
            AppendRequest::new()
                .event(account(1), &deposit(1))
                .unwrap()
                .event(account(1), &Ledger::Withdrawn { amount: 2 })
                .unwrap(),
        )
        .unwrap();

        let err = repo
            .rehydrate("account/1", &manifest(), &mut Balance::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SdkError::Dag(DagError::Aggregate { position: 2, total: 2, .. })
        ));
    }

    #[test]
    fn identical_events_are_stored_once() {
        let repo = Repository::in_memory();
        let first = repo
            .append(AppendRequest::new().event(account(1), &deposit(1)).unwrap())
            .unwrap();
        let second = repo
            .append(AppendRequest::new().event(account(1), &deposit(1)).unwrap())
            .unwrap();
        // Event and affix bytes are reused; only the checkpoint is new.
        assert!(second.bytes_written < first.bytes_written);
        assert_eq!(second.affix, first.affix);
        assert_ne!(second.checkpoint, first.checkpoint);
    }

    #[test]
    fn exists_and_list_partitions() {
        let repo = Repository::in_memory();
        repo.append(
            AppendRequest::new()
                .event(account(2), &deposit(1))
                .unwrap()
                .event(account(1), &deposit(1))
                .unwrap(),
        )
        .unwrap();
        repo.append(AppendRequest::new().event(PartitionName::root(), &deposit(1)).unwrap())
            .unwrap();

        assert!(repo.exists("account/*").unwrap());
        assert!(!repo.exists("invoice/*").unwrap());
        let names: Vec<String> = repo
            .list_partitions("account/*")
            .unwrap()
            .into_iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(names, vec!["account/1", "account/2"]);
        assert!(matches!(repo.exists("[unclosed"), Err(SdkError::Dag(_))));
    }

    #[tokio::test]
    async fn caller_date_field_is_rejected() {
        let repo = Repository::in_memory();
        for date in ["2018-03-01T10:00:00+02:00", "2018-03-01T10:00:00Z"] {
            let request = AppendRequest::new()
                .event(account(1), &deposit(1))
                .unwrap()
                .with_field("date", date);
            assert!(matches!(
                repo.append(request),
                Err(SdkError::ReservedField(key)) if key == "date"
            ));
        }
        assert_eq!(repo.head().unwrap(), None);

        let ok = repo
            .append(AppendRequest::new().event(account(1), &deposit(1)).unwrap())
            .unwrap();
        let mut cursor = repo.index().await.unwrap();
        assert_eq!(cursor.collect_all().await.unwrap(), vec![ok.checkpoint]);
    }

    #[test]
    fn invalid_checkpoint_writes_nothing() {
        let repo = Repository::in_memory();
        let request = AppendRequest::new()
            .event(account(1), &deposit(1))
            .unwrap()
            .with_field("note", "two\nlines");
        let event = *request.events[0].1.hash();
        assert!(matches!(
            repo.append(request),
            Err(SdkError::Pack(quill_pack::PackError::InvalidField { .. }))
        ));
        assert!(!repo.objects().exists(&event).unwrap());
        assert_eq!(repo.head().unwrap(), None);
    }

    #[test]
    fn appended_checkpoints_carry_a_zulu_date() {
        let repo = Repository::in_memory();
        let result = repo
            .append(
                AppendRequest::new()
                    .event(account(1), &deposit(1))
                    .unwrap()
                    .with_session("s-1")
                    .with_date(at(0)),
            )
            .unwrap();
        let packed = repo.objects().retrieve_packed(&result.checkpoint).unwrap();
        let checkpoint = JsonPacker.unpack_checkpoint(&packed).unwrap();
        assert_eq!(checkpoint.fields["date"], "2018-03-01T10:00:00Z");
        assert_eq!(checkpoint.fields["session"], "s-1");
        assert_eq!(checkpoint.date().unwrap(), at(0));
        checkpoint.validate().unwrap();
    }

    #[test]
    fn symbolic_head_advances_its_branch() {
        let config = RepositoryConfig {
            head_ref: "HEAD".into(),
            ..RepositoryConfig::default()
        };
        let repo = Repository::open(&config).unwrap();
        repo.refs().write_symbolic("HEAD", "refs/heads/main").unwrap();

        let first = repo
            .append(AppendRequest::new().event(account(1), &deposit(1)).unwrap())
            .unwrap();
        let second = repo
            .append(AppendRequest::new().event(account(1), &deposit(2)).unwrap())
            .unwrap();

        assert_eq!(second.parent, Some(first.checkpoint));
        assert_eq!(
            repo.refs().read_target("HEAD").unwrap(),
            Some(RefTarget::Symbolic("refs/heads/main".into()))
        );
        assert_eq!(repo.refs().retrieve("refs/heads/main").unwrap(), second.checkpoint);
        assert_eq!(repo.head().unwrap(), Some(second.checkpoint));

        let mut balance = Balance::default();
        repo.rehydrate("account/1", &manifest(), &mut balance).unwrap();
        assert_eq!(balance.amount, 3);
    }

    #[test]
    fn reads_before_first_append_report_unknown_ref() {
        let repo = Repository::in_memory();
        assert!(matches!(
            repo.exists("*"),
            Err(SdkError::Dag(DagError::UnresolvedRef { .. }))
        ));
    }

    #[test]
    fn filesystem_backend_persists_across_opens() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = RepositoryConfig {
            backend: BackendConfig::Filesystem {
                objects: dir.path().join("objects"),
                refs: dir.path().join("refs"),
            },
            ..RepositoryConfig::default()
        };
        let head = {
            let repo = Repository::open(&config).unwrap();
            repo.append(AppendRequest::new().event(account(9), &deposit(42)).unwrap())
                .unwrap()
                .checkpoint
        };

        let repo = Repository::open(&config).unwrap();
        assert_eq!(repo.head().unwrap(), Some(head));
        let mut balance = Balance::default();
        repo.rehydrate("account/9", &manifest(), &mut balance).unwrap();
        assert_eq!(balance.amount, 42);
    }

    #[tokio::test]
    async fn index_lists_appends_in_date_order() {
        let repo = Repository::in_memory();
        let mut expected = Vec::new();
        for i in 0..4 {
            let result = repo
                .append(
                    AppendRequest::new()
                        .event(account(1), &deposit(i))
                        .unwrap()
                        .with_date(at(i as i64 * 5)),
                )
                .unwrap();
            expected.push(result.checkpoint);
        }

        let mut cursor = repo.index().await.unwrap();
        assert_eq!(cursor.collect_all().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn claim_serializes_writers() {
        let config = RepositoryConfig {
            claim_timeout_ms: 20,
            ..RepositoryConfig::default()
        };
        let repo = Repository::open(&config).unwrap();
        let guard = repo.claim(&account(1)).await.unwrap();
        assert!(matches!(
            repo.claim(&account(1)).await,
            Err(SdkError::Claim(crate::claim::ClaimError::Timeout { .. }))
        ));
        drop(guard);
        repo.claim(&account(1)).await.unwrap();
    }
}
