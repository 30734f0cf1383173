use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    batch_function::BatchFunction,
    error::StoreError,
    group,
    key::UintKey,
    model::{Id, SetLog},
    multi::MultiLoader,
    store::Store,
};

pub type SetLogsLoader = MultiLoader<Id, SetLog, UintKey>;

/// The sets logged against a workout exercise.
pub struct SetLogsByWorkoutExerciseId;

#[async_trait]
impl BatchFunction<Id, Vec<Arc<SetLog>>> for SetLogsByWorkoutExerciseId {
    type Context = Arc<dyn Store>;
    type Entity = SetLog;
    type Error = StoreError;
    type Codec = UintKey;

    async fn fetch(
        workout_exercise_ids: &[Id],
        store: &Arc<dyn Store>,
    ) -> Result<Vec<SetLog>, StoreError> {
        store.set_logs_by_workout_exercise_ids(workout_exercise_ids).await
    }

    fn group(set_logs: Vec<SetLog>) -> HashMap<Id, Vec<Arc<SetLog>>> {
        group::by_keys(set_logs, |set_log| Some(set_log.workout_exercise_id))
    }
}
