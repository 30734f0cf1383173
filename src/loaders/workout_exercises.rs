use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    batch_function::BatchFunction,
    error::StoreError,
    group,
    key::UintKey,
    model::{Id, WorkoutExercise},
    multi::MultiLoader,
    store::Store,
};

pub type WorkoutExercisesLoader = MultiLoader<Id, WorkoutExercise, UintKey>;

pub struct WorkoutExercisesByWorkoutId;

#[async_trait]
impl BatchFunction<Id, Vec<Arc<WorkoutExercise>>> for WorkoutExercisesByWorkoutId {
    type Context = Arc<dyn Store>;
    type Entity = WorkoutExercise;
    type Error = StoreError;
    type Codec = UintKey;

    async fn fetch(
        workout_ids: &[Id],
        store: &Arc<dyn Store>,
    ) -> Result<Vec<WorkoutExercise>, StoreError> {
        store.workout_exercises_by_workout_ids(workout_ids).await
    }

    fn group(workout_exercises: Vec<WorkoutExercise>) -> HashMap<Id, Vec<Arc<WorkoutExercise>>> {
        group::by_keys(workout_exercises, |workout_exercise| Some(workout_exercise.workout_id))
    }
}

pub struct WorkoutExercisesByExerciseId;

#[async_trait]
impl BatchFunction<Id, Vec<Arc<WorkoutExercise>>> for WorkoutExercisesByExerciseId {
    type Context = Arc<dyn Store>;
    type Entity = WorkoutExercise;
    type Error = StoreError;
    type Codec = UintKey;

    async fn fetch(
        exercise_ids: &[Id],
        store: &Arc<dyn Store>,
    ) -> Result<Vec<WorkoutExercise>, StoreError> {
        store.workout_exercises_by_exercise_ids(exercise_ids).await
    }

    fn group(workout_exercises: Vec<WorkoutExercise>) -> HashMap<Id, Vec<Arc<WorkoutExercise>>> {
        group::by_keys(workout_exercises, |workout_exercise| Some(workout_exercise.exercise_id))
    }
}
