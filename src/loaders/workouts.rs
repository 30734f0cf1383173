use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    batch_function::BatchFunction,
    error::StoreError,
    group,
    key::UintKey,
    model::{Id, Workout},
    multi::MultiLoader,
    single::SingleLoader,
    store::Store,
};

pub type WorkoutLoader = SingleLoader<Id, Workout, UintKey>;
pub type WorkoutsByUserLoader = MultiLoader<Id, Workout, UintKey>;
pub type WorkoutsByGroupLoader = MultiLoader<Id, Workout, UintKey>;

pub struct WorkoutsById;

#[async_trait]
impl BatchFunction<Id, Arc<Workout>> for WorkoutsById {
    type Context = Arc<dyn Store>;
    type Entity = Workout;
    type Error = StoreError;
    type Codec = UintKey;

    async fn fetch(ids: &[Id], store: &Arc<dyn Store>) -> Result<Vec<Workout>, StoreError> {
        store.workouts_by_ids(ids).await
    }

    fn group(workouts: Vec<Workout>) -> HashMap<Id, Arc<Workout>> {
        group::by_key(workouts, |workout| workout.id)
    }
}

pub struct WorkoutsByUserId;

#[async_trait]
impl BatchFunction<Id, Vec<Arc<Workout>>> for WorkoutsByUserId {
    type Context = Arc<dyn Store>;
    type Entity = Workout;
    type Error = StoreError;
    type Codec = UintKey;

    async fn fetch(user_ids: &[Id], store: &Arc<dyn Store>) -> Result<Vec<Workout>, StoreError> {
        store.workouts_by_user_ids(user_ids).await
    }

    fn group(workouts: Vec<Workout>) -> HashMap<Id, Vec<Arc<Workout>>> {
        group::by_keys(workouts, |workout| Some(workout.user_id))
    }
}

/// Workouts filed under a workout group. Workouts that belong to no group are never returned
/// for any key.
pub struct WorkoutsByGroupId;

#[async_trait]
impl BatchFunction<Id, Vec<Arc<Workout>>> for WorkoutsByGroupId {
    type Context = Arc<dyn Store>;
    type Entity = Workout;
    type Error = StoreError;
    type Codec = UintKey;

    async fn fetch(group_ids: &[Id], store: &Arc<dyn Store>) -> Result<Vec<Workout>, StoreError> {
        store.workouts_by_group_ids(group_ids).await
    }

    fn group(workouts: Vec<Workout>) -> HashMap<Id, Vec<Arc<Workout>>> {
        group::by_keys(workouts, |workout| workout.workout_group_id)
    }
}
