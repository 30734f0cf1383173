//! The data-access boundary the loaders batch against.

mod memory;

pub use memory::{MemoryStore, Query};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{
    Exercise, Friendship, Id, Profile, Recommendation, SetLog, User, Workout, WorkoutExercise,
    WorkoutGroup,
};

/// How many users are suggested to a single user.
pub const RECOMMENDATION_LIMIT: usize = 50;

/// One batch query per loader. Every method receives the deduplicated ids of one batch and may
/// return rows in any order; an empty id slice yields no rows.
#[async_trait]
pub trait Store: Send + Sync {
    async fn users_by_ids(&self, ids: &[Id]) -> Result<Vec<User>, StoreError>;
    async fn profiles_by_user_ids(&self, user_ids: &[Id]) -> Result<Vec<Profile>, StoreError>;
    async fn exercises_by_ids(&self, ids: &[Id]) -> Result<Vec<Exercise>, StoreError>;

    async fn friendships_by_ids(&self, ids: &[Id]) -> Result<Vec<Friendship>, StoreError>;
    /// Accepted friendships in which any of the users is either side.
    async fn accepted_friendships_by_user_ids(
        &self,
        user_ids: &[Id],
    ) -> Result<Vec<Friendship>, StoreError>;
    /// Pending friendships addressed to any of the users.
    async fn pending_requests_by_requestee_ids(
        &self,
        user_ids: &[Id],
    ) -> Result<Vec<Friendship>, StoreError>;
    /// Up to [`RECOMMENDATION_LIMIT`] suggestions per user, each tagged with the user it is for.
    async fn recommendations_by_user_ids(
        &self,
        user_ids: &[Id],
    ) -> Result<Vec<Recommendation>, StoreError>;

    async fn workouts_by_ids(&self, ids: &[Id]) -> Result<Vec<Workout>, StoreError>;
    async fn workouts_by_user_ids(&self, user_ids: &[Id]) -> Result<Vec<Workout>, StoreError>;
    async fn workouts_by_group_ids(&self, group_ids: &[Id]) -> Result<Vec<Workout>, StoreError>;

    async fn workout_exercises_by_workout_ids(
        &self,
        workout_ids: &[Id],
    ) -> Result<Vec<WorkoutExercise>, StoreError>;
    async fn workout_exercises_by_exercise_ids(
        &self,
        exercise_ids: &[Id],
    ) -> Result<Vec<WorkoutExercise>, StoreError>;

    async fn set_logs_by_workout_exercise_ids(
        &self,
        workout_exercise_ids: &[Id],
    ) -> Result<Vec<SetLog>, StoreError>;

    async fn workout_groups_by_ids(&self, ids: &[Id]) -> Result<Vec<WorkoutGroup>, StoreError>;
}
