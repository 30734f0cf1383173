use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_futures::Instrument;

use crate::{
    config::LoaderConfig,
    error::{ConfigResult, LoadError},
    key::{KeyCodec, UintKey},
    loaders::*,
    model::User,
    store::Store,
};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static CURRENT: Arc<Loaders>;
}

/// The full set of loaders of one request.
///
/// A fresh set is built for every request, so nothing one request loaded is ever visible to
/// another. All loaders share the request's store handle, config and cancellation token.
pub struct Loaders {
    pub users: UserLoader,
    pub profiles: ProfileLoader,
    pub exercises: ExerciseLoader,
    pub friendships: FriendshipLoader,
    /// Accepted friendships, keyed by either side.
    pub friendships_by_user: FriendshipsByUserLoader,
    /// Pending friendships, keyed by requestee.
    pub friend_requests: FriendshipsByUserLoader,
    pub recommended_users: RecommendedUsersLoader,
    pub workouts: WorkoutLoader,
    pub workouts_by_user: WorkoutsByUserLoader,
    pub workouts_by_group: WorkoutsByGroupLoader,
    pub workout_exercises_by_workout: WorkoutExercisesLoader,
    pub workout_exercises_by_exercise: WorkoutExercisesLoader,
    pub set_logs: SetLogsLoader,
    pub workout_groups: WorkoutGroupLoader,
}

impl Loaders {
    /// Builds every loader and spawns its worker on the current runtime.
    pub fn new(store: Arc<dyn Store>, config: &LoaderConfig, cancel: &CancellationToken) -> Self {
        macro_rules! loader {
            ($loader:ty, $batch_fn:expr) => {
                <$loader>::new($batch_fn, store.clone(), config.clone(), cancel.clone())
            };
        }

        Self {
            users: loader!(UserLoader, UsersById),
            profiles: loader!(ProfileLoader, ProfilesByUserId),
            exercises: loader!(ExerciseLoader, ExercisesById),
            friendships: loader!(FriendshipLoader, FriendshipsById),
            friendships_by_user: loader!(FriendshipsByUserLoader, FriendshipsByUserId),
            friend_requests: loader!(FriendshipsByUserLoader, FriendRequestsByUserId),
            recommended_users: loader!(RecommendedUsersLoader, RecommendedUsersByUserId),
            workouts: loader!(WorkoutLoader, WorkoutsById),
            workouts_by_user: loader!(WorkoutsByUserLoader, WorkoutsByUserId),
            workouts_by_group: loader!(WorkoutsByGroupLoader, WorkoutsByGroupId),
            workout_exercises_by_workout: loader!(
                WorkoutExercisesLoader,
                WorkoutExercisesByWorkoutId
            ),
            workout_exercises_by_exercise: loader!(
                WorkoutExercisesLoader,
                WorkoutExercisesByExerciseId
            ),
            set_logs: loader!(SetLogsLoader, SetLogsByWorkoutExerciseId),
            workout_groups: loader!(WorkoutGroupLoader, WorkoutGroupsById),
        }
    }

    /// The loaders of the request the calling task runs in.
    ///
    /// # Panics
    ///
    /// Panics when called outside [`RequestScope::run`]. Reaching for loaders without a request
    /// is a wiring bug, not a recoverable condition.
    pub fn current() -> Arc<Loaders> {
        match Self::try_current() {
            Some(loaders) => loaders,
            None => panic!("Loaders::current called outside of a request scope"),
        }
    }

    pub fn try_current() -> Option<Arc<Loaders>> {
        CURRENT.try_with(Arc::clone).ok()
    }

    /// The users `raw_user_id` has an accepted friendship with, in friendship order.
    ///
    /// Friends whose user row is gone are skipped.
    pub async fn friends_of(&self, raw_user_id: &str) -> Result<Vec<Arc<User>>, LoadError> {
        let user_id = UintKey.parse(raw_user_id)?;
        let friend_ids = self
            .friendships_by_user
            .load_key(user_id)
            .await?
            .iter()
            .filter_map(|friendship| friendship.counterpart(user_id))
            .collect::<Vec<_>>();
        let friends = self.users.load_keys(friend_ids).await;
        friends.into_iter().filter_map(Result::transpose).collect()
    }
}

/// Owns the loaders of one request from creation to teardown.
///
/// Dropping the scope cancels its token: loads still waiting for a batch fail with
/// [`LoadError::Cancelled`] and the workers wind down.
pub struct RequestScope {
    id: u64,
    loaders: Arc<Loaders>,
    cancel: CancellationToken,
    span: tracing::Span,
}

impl RequestScope {
    /// Opens a scope and spawns its loaders. Fails if `config` does not validate.
    pub fn new(store: Arc<dyn Store>, config: &LoaderConfig) -> ConfigResult<Self> {
        Self::build(store, config, CancellationToken::new())
    }

    /// A scope that is also cancelled when `parent` is, e.g. when the server shuts down.
    pub fn with_parent(
        store: Arc<dyn Store>,
        config: &LoaderConfig,
        parent: &CancellationToken,
    ) -> ConfigResult<Self> {
        Self::build(store, config, parent.child_token())
    }

    fn build(
        store: Arc<dyn Store>,
        config: &LoaderConfig,
        cancel: CancellationToken,
    ) -> ConfigResult<Self> {
        config.validate()?;
        let id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        let span = tracing::debug_span!("request", id);
        let loaders = span.in_scope(|| Arc::new(Loaders::new(store, config, &cancel)));
        tracing::debug!(id, "request scope opened");
        Ok(Self { id, loaders, cancel, span })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn loaders(&self) -> &Arc<Loaders> {
        &self.loaders
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fails every load of this request that has not been dispatched yet.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs `fut` with this scope's loaders available through [`Loaders::current`].
    pub async fn run<F>(&self, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(self.loaders.clone(), fut).instrument(self.span.clone()).await
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.cancel.cancel();
        tracing::debug!(id = self.id, "request scope closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn scope_ids_are_unique() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let config = LoaderConfig::default();
        let first = RequestScope::new(store.clone(), &config).unwrap();
        let second = RequestScope::new(store, &config).unwrap();
        assert_ne!(first.id(), second.id());
    }

    #[tokio::test]
    async fn parent_cancellation_reaches_the_scope() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let parent = CancellationToken::new();
        let scope = RequestScope::with_parent(store, &LoaderConfig::default(), &parent).unwrap();
        assert!(!scope.is_cancelled());
        parent.cancel();
        assert!(scope.is_cancelled());
    }

    #[tokio::test]
    async fn current_is_only_set_inside_run() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let scope = RequestScope::new(store, &LoaderConfig::default()).unwrap();
        assert!(Loaders::try_current().is_none());
        let inside = scope.run(async { Loaders::try_current().is_some() }).await;
        assert!(inside);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let config = LoaderConfig::default().with_max_batch_size(0);
        assert!(matches!(RequestScope::new(store, &config), Err(ConfigError::Validation(_))));
    }
}
