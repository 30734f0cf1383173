use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;

use super::{Store, RECOMMENDATION_LIMIT};
use crate::error::StoreError;
use crate::model::{
    Exercise, Friendship, FriendshipStatus, Id, Profile, Recommendation, SetLog, User, Workout,
    WorkoutExercise, WorkoutGroup,
};

/// One batch query served by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub relation: &'static str,
    pub keys: Vec<Id>,
}

#[derive(Debug, Default)]
struct Rows {
    users: Vec<User>,
    profiles: Vec<Profile>,
    exercises: Vec<Exercise>,
    friendships: Vec<Friendship>,
    workouts: Vec<Workout>,
    workout_exercises: Vec<WorkoutExercise>,
    set_logs: Vec<SetLog>,
    workout_groups: Vec<WorkoutGroup>,
}

/// A [`Store`] over rows held in memory.
///
/// Every batch query is journaled (see [`MemoryStore::queries`]) and any relation can be made to
/// fail, which is what the loader tests lean on. Rows come back in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Rows>,
    journal: Mutex<Vec<Query>>,
    failures: RwLock<HashMap<&'static str, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        self.write().users.push(user);
    }

    pub fn insert_profile(&self, profile: Profile) {
        self.write().profiles.push(profile);
    }

    pub fn insert_exercise(&self, exercise: Exercise) {
        self.write().exercises.push(exercise);
    }

    pub fn insert_friendship(&self, friendship: Friendship) {
        self.write().friendships.push(friendship);
    }

    pub fn insert_workout(&self, workout: Workout) {
        self.write().workouts.push(workout);
    }

    pub fn insert_workout_exercise(&self, workout_exercise: WorkoutExercise) {
        self.write().workout_exercises.push(workout_exercise);
    }

    pub fn insert_set_log(&self, set_log: SetLog) {
        self.write().set_logs.push(set_log);
    }

    pub fn insert_workout_group(&self, workout_group: WorkoutGroup) {
        self.write().workout_groups.push(workout_group);
    }

    /// Makes every query on `relation` fail until [`MemoryStore::recover`] is called.
    pub fn fail(&self, relation: &'static str, reason: impl Into<String>) {
        self.failures.write().unwrap_or_else(PoisonError::into_inner).insert(relation, reason.into());
    }

    pub fn recover(&self) {
        self.failures.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Every batch query served so far, oldest first.
    pub fn queries(&self) -> Vec<Query> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The key sets of the batch queries served on `relation`.
    pub fn queries_for(&self, relation: &str) -> Vec<Vec<Id>> {
        self.queries()
            .into_iter()
            .filter(|query| query.relation == relation)
            .map(|query| query.keys)
            .collect()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Rows> {
        self.rows.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Journals the query and fails it if its relation was told to.
    fn record(&self, relation: &'static str, ids: &[Id]) -> Result<(), StoreError> {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Query { relation, keys: ids.to_vec() });
        match self.failures.read().unwrap_or_else(PoisonError::into_inner).get(relation) {
            Some(reason) => Err(StoreError::Query { relation, reason: reason.clone() }),
            None => Ok(()),
        }
    }

    fn select<T, R, P>(
        &self,
        relation: &'static str,
        ids: &[Id],
        rows: R,
        matches: P,
    ) -> Result<Vec<T>, StoreError>
    where
        T: Clone,
        R: Fn(&Rows) -> &Vec<T>,
        P: Fn(&T, &HashSet<Id>) -> bool,
    {
        self.record(relation, ids)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let wanted = ids.iter().copied().collect::<HashSet<_>>();
        let guard = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rows(&*guard).iter().filter(|row| matches(row, &wanted)).cloned().collect())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn users_by_ids(&self, ids: &[Id]) -> Result<Vec<User>, StoreError> {
        self.select("users", ids, |rows| &rows.users, |user, ids| ids.contains(&user.id))
    }

    async fn profiles_by_user_ids(&self, user_ids: &[Id]) -> Result<Vec<Profile>, StoreError> {
        self.select("profiles", user_ids, |rows| &rows.profiles, |profile, ids| {
            ids.contains(&profile.user_id)
        })
    }

    async fn exercises_by_ids(&self, ids: &[Id]) -> Result<Vec<Exercise>, StoreError> {
        self.select("exercises", ids, |rows| &rows.exercises, |exercise, ids| {
            ids.contains(&exercise.id)
        })
    }

    async fn friendships_by_ids(&self, ids: &[Id]) -> Result<Vec<Friendship>, StoreError> {
        self.select("friendships", ids, |rows| &rows.friendships, |friendship, ids| {
            ids.contains(&friendship.id)
        })
    }

    async fn accepted_friendships_by_user_ids(
        &self,
        user_ids: &[Id],
    ) -> Result<Vec<Friendship>, StoreError> {
        self.select("accepted_friendships", user_ids, |rows| &rows.friendships, |friendship, ids| {
            friendship.status == FriendshipStatus::Accepted
                && (ids.contains(&friendship.requester_id) || ids.contains(&friendship.requestee_id))
        })
    }

    async fn pending_requests_by_requestee_ids(
        &self,
        user_ids: &[Id],
    ) -> Result<Vec<Friendship>, StoreError> {
        self.select("friend_requests", user_ids, |rows| &rows.friendships, |friendship, ids| {
            friendship.status == FriendshipStatus::Pending && ids.contains(&friendship.requestee_id)
        })
    }

    async fn recommendations_by_user_ids(
        &self,
        user_ids: &[Id],
    ) -> Result<Vec<Recommendation>, StoreError> {
        self.record("recommendations", user_ids)?;
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let mut candidates = rows.users.iter().collect::<Vec<_>>();
        candidates.sort_by_key(|user| user.id);

        let mut recommendations = Vec::new();
        for &for_user in user_ids {
            let mut excluded = rows
                .friendships
                .iter()
                .filter_map(|friendship| friendship.counterpart(for_user))
                .collect::<HashSet<_>>();
            excluded.insert(for_user);
            recommendations.extend(
                candidates
                    .iter()
                    .filter(|user| !excluded.contains(&user.id))
                    .take(RECOMMENDATION_LIMIT)
                    .map(|user| Recommendation { for_user, user: (*user).clone() }),
            );
        }
        Ok(recommendations)
    }

    async fn workouts_by_ids(&self, ids: &[Id]) -> Result<Vec<Workout>, StoreError> {
        self.select("workouts", ids, |rows| &rows.workouts, |workout, ids| ids.contains(&workout.id))
    }

    async fn workouts_by_user_ids(&self, user_ids: &[Id]) -> Result<Vec<Workout>, StoreError> {
        self.select("workouts_by_user", user_ids, |rows| &rows.workouts, |workout, ids| {
            ids.contains(&workout.user_id)
        })
    }

    async fn workouts_by_group_ids(&self, group_ids: &[Id]) -> Result<Vec<Workout>, StoreError> {
        self.select("workouts_by_group", group_ids, |rows| &rows.workouts, |workout, ids| {
            workout.workout_group_id.map_or(false, |group_id| ids.contains(&group_id))
        })
    }

    async fn workout_exercises_by_workout_ids(
        &self,
        workout_ids: &[Id],
    ) -> Result<Vec<WorkoutExercise>, StoreError> {
        self.select(
            "workout_exercises_by_workout",
            workout_ids,
            |rows| &rows.workout_exercises,
            |workout_exercise, ids| ids.contains(&workout_exercise.workout_id),
        )
    }

    async fn workout_exercises_by_exercise_ids(
        &self,
        exercise_ids: &[Id],
    ) -> Result<Vec<WorkoutExercise>, StoreError> {
        self.select(
            "workout_exercises_by_exercise",
            exercise_ids,
            |rows| &rows.workout_exercises,
            |workout_exercise, ids| ids.contains(&workout_exercise.exercise_id),
        )
    }

    async fn set_logs_by_workout_exercise_ids(
        &self,
        workout_exercise_ids: &[Id],
    ) -> Result<Vec<SetLog>, StoreError> {
        self.select("set_logs", workout_exercise_ids, |rows| &rows.set_logs, |set_log, ids| {
            ids.contains(&set_log.workout_exercise_id)
        })
    }

    async fn workout_groups_by_ids(&self, ids: &[Id]) -> Result<Vec<WorkoutGroup>, StoreError> {
        self.select("workout_groups", ids, |rows| &rows.workout_groups, |group, ids| {
            ids.contains(&group.id)
        })
    }
}
