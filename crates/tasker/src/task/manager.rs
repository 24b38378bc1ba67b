use std::sync::Arc;

use bytes::Bytes;
use portable_atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    CreateTaskRequest, DeleteTaskRequest, Error, FieldPath, GetTaskRequest, IdGenerator, LexBound,
    ListTasksRequest, ListTasksResponse, PageToken, PageTokenCodec, Result, Script, Status, Store,
    StoreError, TRY_AGAIN, Task, TaskId, UpdateTaskRequest, generate_with_retry,
    task::model::is_blank,
};

/// Page size used when neither the request nor its token names one.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Upper bound applied to every page size.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Total generator calls made by `create` before reporting an overflow.
pub const DEFAULT_ID_ATTEMPTS: usize = 3;

const STORE_ERROR: &str = "store error";
const SERIALIZATION_ERROR: &str = "serialization error";

/// Where tasks live in the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Keyspace {
    /// Primary entries are stored under `"{prefix}:{id}"`.
    pub prefix: String,
    /// The sorted set indexing every task id.
    pub index: String,
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new("taskID", "sortSet")
    }
}

impl Keyspace {
    pub fn new(prefix: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            index: index.into(),
        }
    }

    pub fn primary_key(&self, id: &str) -> String {
        format!("{}:{id}", self.prefix)
    }
}

/// Page size policy for `list`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageLimits {
    pub default_size: usize,
    pub max_size: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_PAGE_SIZE,
            max_size: MAX_PAGE_SIZE,
        }
    }
}

impl AsRef<str> for GetTaskRequest {
    fn as_ref(&self) -> &str {
        &self.id
    }
}

impl AsRef<str> for DeleteTaskRequest {
    fn as_ref(&self) -> &str {
        &self.id
    }
}

/// The record store protocol.
///
/// A task lives in two places: its primary entry (the JSON record under
/// [`Keyspace::primary_key`]) and its zero-padded id in the
/// [`Keyspace::index`] sorted set. Padding keeps lexicographic member order
/// equal to creation order whatever the number of digits; responses and
/// primary keys use the canonical decimal id.
/// `create` and `delete` change both through one atomic [`Script`]; a task
/// is therefore either in both structures or in neither.
///
/// The manager holds no lock of its own. Any number of operations may run
/// concurrently; concurrent updates of one task are last-writer-wins.
pub struct TaskManager<S, G> {
    store: Arc<S>,
    generator: Arc<G>,
    codec: PageTokenCodec,
    keyspace: Keyspace,
    limits: PageLimits,
    id_attempts: usize,
    rollbacks: Arc<AtomicU64>,
}

impl<S, G> TaskManager<S, G>
where
    S: Store,
    G: IdGenerator,
{
    pub fn new(store: Arc<S>, generator: Arc<G>, codec: PageTokenCodec) -> Self {
        Self {
            store,
            generator,
            codec,
            keyspace: Keyspace::default(),
            limits: PageLimits::default(),
            id_attempts: DEFAULT_ID_ATTEMPTS,
            rollbacks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_keyspace(mut self, keyspace: Keyspace) -> Self {
        self.keyspace = keyspace;
        self
    }

    pub fn with_page_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets how many times in total `create` asks the generator for an id,
    /// waiting a millisecond after each exhausted one. Zero counts as one.
    pub fn with_id_attempts(mut self, attempts: usize) -> Self {
        self.id_attempts = attempts;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    pub fn page_limits(&self) -> PageLimits {
        self.limits
    }

    /// Number of failed atomic mutations that needed the client-side
    /// fallback.
    pub fn rollback_count(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    /// Creates a task with a freshly minted id.
    ///
    /// # Errors
    ///
    /// - [`Error::RequiredField`] for a blank name.
    /// - [`Error::InvalidValue`] for an unknown status.
    /// - [`Error::Overflow`] when the generator stays exhausted.
    /// - [`Error::Internal`] on an id collision or any store failure; the
    ///   store then holds neither the primary entry nor the index entry.
    #[instrument(level = "debug", skip_all)]
    pub async fn create(&self, request: CreateTaskRequest) -> Result<Task> {
        if is_blank(&request.name) {
            return Err(Error::RequiredField { field: "name" });
        }
        let status = Status::try_from(request.status)?;

        let task_id = generate_with_retry(&*self.generator, self.id_attempts)
            .await
            .inspect_err(|e| warn!(error = %e, "id generation failed"))?;
        let id = task_id.to_string();
        let primary = self.keyspace.primary_key(&id);

        let occupied = self
            .store
            .exists(&primary)
            .await
            .map_err(|e| store_failure("exists", &primary, e))?;
        if occupied || is_blank(&id) {
            error!(key = %primary, "generated id is unusable");
            return Err(Error::internal(TRY_AGAIN));
        }

        let task = Task {
            id,
            name: request.name,
            status,
        };
        let value = encode_task(&task, &primary)?;

        self.run_atomic(Mutation::Create {
            index: self.keyspace.index.clone(),
            member: task_id.to_padded_string(),
            primary,
            value,
        })
        .await?;

        debug!(id = %task.id, "task created");
        Ok(task)
    }

    /// Loads one task.
    ///
    /// # Errors
    ///
    /// [`Error::RequiredField`] for a blank id, [`Error::NotFound`] when no
    /// primary entry exists, [`Error::Internal`] on store or decode failure.
    #[instrument(level = "debug", skip_all, fields(id = id.as_ref()))]
    pub async fn get(&self, id: impl AsRef<str>) -> Result<Task> {
        let id = id.as_ref();
        if is_blank(id) {
            return Err(Error::RequiredField { field: "id" });
        }
        self.load(id).await
    }

    /// Applies the masked fields of `request.task` to a stored task.
    ///
    /// Fields not named by the mask are left untouched even when the patch
    /// carries a value for them. Unknown mask paths are ignored. The index is
    /// never touched.
    ///
    /// # Errors
    ///
    /// - [`Error::RequiredField`] for a blank id, a missing patch, or a
    ///   masked blank name.
    /// - [`Error::InvalidValue`] for an unknown patch status.
    /// - [`Error::NotFound`] when the task does not exist.
    #[instrument(level = "debug", skip_all, fields(id = %request.id))]
    pub async fn update(&self, request: UpdateTaskRequest) -> Result<Task> {
        let UpdateTaskRequest {
            id,
            task: patch,
            update_mask,
        } = request;
        if is_blank(&id) {
            return Err(Error::RequiredField { field: "id" });
        }
        let Some(patch) = patch else {
            return Err(Error::RequiredField { field: "task" });
        };
        let status = Status::try_from(patch.status)?;
        let fields = FieldPath::from_mask(&update_mask);
        if fields.contains(&FieldPath::Name) && is_blank(&patch.name) {
            return Err(Error::RequiredField { field: "name" });
        }

        let mut task = self.load(&id).await?;
        for field in fields {
            match field {
                FieldPath::Name => task.name.clone_from(&patch.name),
                FieldPath::Status => task.status = status,
            }
        }

        let primary = self.keyspace.primary_key(&id);
        let value = encode_task(&task, &primary)?;
        if let Err(err) = self
            .store
            .execute_atomic(Script::UpdateTask, &[primary.clone()], &[value])
            .await
        {
            // a concurrent delete won the race
            let vanished = matches!(err, StoreError::ScriptFailed { .. })
                && matches!(self.store.exists(&primary).await, Ok(false));
            if vanished {
                return Err(Error::NotFound { id });
            }
            return Err(store_failure("update", &primary, err));
        }
        Ok(task)
    }

    /// Removes a task from both the primary entries and the index.
    ///
    /// # Errors
    ///
    /// [`Error::RequiredField`] for a blank id, [`Error::NotFound`] when the
    /// task does not exist or another caller deleted it first,
    /// [`Error::Internal`] when the removal failed; the task is then still
    /// fully present.
    #[instrument(level = "debug", skip_all, fields(id = id.as_ref()))]
    pub async fn delete(&self, id: impl AsRef<str>) -> Result<()> {
        let id = id.as_ref();
        if is_blank(id) {
            return Err(Error::RequiredField { field: "id" });
        }
        let primary = self.keyspace.primary_key(id);
        let prior = self
            .store
            .get(&primary)
            .await
            .map_err(|e| store_failure("get", &primary, e))?
            .ok_or_else(|| Error::NotFound { id: id.to_string() })?;

        let task_id = id.parse::<TaskId>().ok();
        self.run_atomic(Mutation::Delete {
            id: id.to_string(),
            index: self.keyspace.index.clone(),
            member: index_member(id),
            score: task_id.map_or(0.0, |id| id.as_f64()),
            primary,
            prior,
        })
        .await?;

        debug!("task deleted");
        Ok(())
    }

    /// Lists tasks in index order.
    ///
    /// An unusable page token restarts the listing from the beginning. The
    /// page size is the request's when nonzero, else the token's when
    /// positive, else the default, capped at the configured maximum. A next
    /// token is returned only when the page came back full.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidValue`] for a negative page size, [`Error::Internal`]
    /// when the index scan fails. Individual tasks that cannot be loaded are
    /// skipped.
    #[instrument(level = "debug", skip_all, fields(page_size = request.page_size))]
    pub async fn list(&self, request: ListTasksRequest) -> Result<ListTasksResponse> {
        if request.page_size < 0 {
            return Err(Error::invalid("page_size", request.page_size));
        }
        let cursor = self.decode_cursor(&request.page_token);
        let size = self.effective_page_size(request.page_size, cursor.as_ref());
        let start = match cursor {
            Some(token) => LexBound::Exclusive(index_member(&token.id)),
            None => LexBound::Unbounded,
        };

        let index = &self.keyspace.index;
        let members = self
            .store
            .range_by_lex(index, start, LexBound::Unbounded, 0, size)
            .await
            .map_err(|e| store_failure("range_by_lex", index, e))?;

        let mut tasks = Vec::with_capacity(members.len());
        for member in &members {
            let Ok(id) = member.parse::<TaskId>() else {
                warn!(member = %member, "skipping malformed index member");
                continue;
            };
            let primary = self.keyspace.primary_key(&id.to_string());
            match self.store.get(&primary).await {
                Ok(Some(bytes)) => match serde_json::from_slice::<Task>(&bytes) {
                    Ok(task) => tasks.push(task),
                    Err(e) => warn!(key = %primary, error = %e, "skipping undecodable task"),
                },
                Ok(None) => warn!(key = %primary, "skipping indexed id without a record"),
                Err(e) => warn!(key = %primary, error = %e, "skipping task that failed to load"),
            }
        }

        let next_page_token = match members.last() {
            Some(last) if members.len() == size => {
                let size = i64::try_from(size).unwrap_or(i64::MAX);
                let id = last
                    .parse::<TaskId>()
                    .map_or_else(|_| last.clone(), |id| id.to_string());
                Some(self.codec.encode(&PageToken::new(id, size)))
            }
            _ => None,
        };

        Ok(ListTasksResponse {
            tasks,
            next_page_token,
        })
    }

    fn decode_cursor(&self, page_token: &str) -> Option<PageToken> {
        if is_blank(page_token) {
            return None;
        }
        self.codec
            .decode(page_token)
            .inspect_err(|e| debug!(error = %e, "ignoring unusable page token"))
            .ok()
    }

    fn effective_page_size(&self, requested: i32, cursor: Option<&PageToken>) -> usize {
        let requested = usize::try_from(requested).ok().filter(|&s| s > 0);
        let remembered = cursor
            .and_then(|token| usize::try_from(token.size).ok())
            .filter(|&s| s > 0);
        requested
            .or(remembered)
            .unwrap_or(self.limits.default_size)
            .clamp(1, self.limits.max_size.max(1))
    }

    async fn load(&self, id: &str) -> Result<Task> {
        let primary = self.keyspace.primary_key(id);
        let bytes = self
            .store
            .get(&primary)
            .await
            .map_err(|e| store_failure("get", &primary, e))?
            .ok_or_else(|| Error::NotFound { id: id.to_string() })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            error!(key = %primary, error = %e, "stored task is not valid JSON");
            Error::internal(SERIALIZATION_ERROR)
        })
    }

    /// Runs `mutation` on its own task so that a cancelled caller cannot
    /// interrupt the script or its fallback half way.
    async fn run_atomic(&self, mutation: Mutation) -> Result<()> {
        let store = Arc::clone(&self.store);
        let rollbacks = Arc::clone(&self.rollbacks);
        tokio::spawn(async move { mutation.apply(&*store, &rollbacks).await })
            .await
            .map_err(|e| {
                error!(error = %e, "atomic mutation task did not complete");
                Error::internal(TRY_AGAIN)
            })?
    }
}

/// A change that must land in both structures or in neither.
enum Mutation {
    Create {
        primary: String,
        index: String,
        member: String,
        value: Bytes,
    },
    Delete {
        id: String,
        primary: String,
        index: String,
        member: String,
        score: f64,
        prior: Bytes,
    },
}

impl Mutation {
    async fn apply<S: Store>(self, store: &S, rollbacks: &AtomicU64) -> Result<()> {
        let (script, keys, args) = match &self {
            Self::Create {
                primary,
                index,
                member,
                value,
                ..
            } => (
                Script::AddTask,
                [primary.clone(), index.clone()],
                vec![value.clone(), Bytes::from(member.clone())],
            ),
            Self::Delete {
                primary,
                index,
                member,
                ..
            } => (
                Script::DeleteTask,
                [primary.clone(), index.clone()],
                vec![Bytes::from(member.clone())],
            ),
        };

        let Err(err) = store.execute_atomic(script, &keys, &args).await else {
            return Ok(());
        };
        warn!(script = script.id(), key = %keys[0], error = %err, "atomic script failed");

        match err {
            // only an aborted script leaves a half-applied mutation behind
            StoreError::Aborted { step, .. } => {
                rollbacks.fetch_add(1, Ordering::Relaxed);
                match self.fall_back(store).await {
                    Ok(()) => info!(
                        script = script.id(),
                        key = %keys[0],
                        step,
                        "mutation rolled back"
                    ),
                    Err(e) => error!(
                        script = script.id(),
                        key = %keys[0],
                        step,
                        error = %e,
                        invariant_violated = true,
                        "rollback failed, invariant may be violated"
                    ),
                }
            }
            StoreError::ScriptFailed { .. } => {
                // a concurrent delete removed the task first
                if let Self::Delete { id, primary, .. } = &self {
                    if matches!(store.exists(primary).await, Ok(false)) {
                        return Err(Error::NotFound { id: id.clone() });
                    }
                }
            }
            StoreError::Unavailable { .. } | StoreError::InvalidArguments { .. } => {}
        }
        Err(Error::internal(TRY_AGAIN))
    }

    /// Puts both structures back into the state they had before the
    /// mutation.
    async fn fall_back<S: Store>(&self, store: &S) -> core::result::Result<(), StoreError> {
        match self {
            Self::Create {
                primary,
                index,
                member,
                ..
            } => {
                if store.exists(primary).await? {
                    store.delete(primary).await?;
                }
                store.sorted_set_remove(index, member).await?;
            }
            Self::Delete {
                primary,
                index,
                member,
                score,
                prior,
                ..
            } => {
                if !store.exists(primary).await? {
                    store.set(primary, prior.clone()).await?;
                }
                store.sorted_set_add(index, *score, member).await?;
            }
        }
        Ok(())
    }
}

/// The index member of `id`: the zero-padded form for ids, so that
/// lexicographic order of members is numeric order of ids.
fn index_member(id: &str) -> String {
    id.parse::<TaskId>()
        .map_or_else(|_| id.to_string(), |id| id.to_padded_string())
}

fn encode_task(task: &Task, key: &str) -> Result<Bytes> {
    serde_json::to_vec(task).map(Bytes::from).map_err(|e| {
        error!(key, error = %e, "task serialization failed");
        Error::internal(SERIALIZATION_ERROR)
    })
}

fn store_failure(op: &'static str, key: &str, err: StoreError) -> Error {
    error!(op, key, error = %err, "store call failed");
    Error::internal(STORE_ERROR)
}
