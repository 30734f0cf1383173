use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    batch_function::BatchFunction,
    error::StoreError,
    group,
    key::UintKey,
    model::{Exercise, Id},
    single::SingleLoader,
    store::Store,
};

pub type ExerciseLoader = SingleLoader<Id, Exercise, UintKey>;

pub struct ExercisesById;

#[async_trait]
impl BatchFunction<Id, Arc<Exercise>> for ExercisesById {
    type Context = Arc<dyn Store>;
    type Entity = Exercise;
    type Error = StoreError;
    type Codec = UintKey;

    async fn fetch(ids: &[Id], store: &Arc<dyn Store>) -> Result<Vec<Exercise>, StoreError> {
        store.exercises_by_ids(ids).await
    }

    fn group(exercises: Vec<Exercise>) -> HashMap<Id, Arc<Exercise>> {
        group::by_key(exercises, |exercise| exercise.id)
    }
}
