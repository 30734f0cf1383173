use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    batch_function::BatchFunction,
    error::StoreError,
    group,
    key::UintKey,
    model::{Id, WorkoutGroup},
    single::SingleLoader,
    store::Store,
};

pub type WorkoutGroupLoader = SingleLoader<Id, WorkoutGroup, UintKey>;

pub struct WorkoutGroupsById;

#[async_trait]
impl BatchFunction<Id, Arc<WorkoutGroup>> for WorkoutGroupsById {
    type Context = Arc<dyn Store>;
    type Entity = WorkoutGroup;
    type Error = StoreError;
    type Codec = UintKey;

    async fn fetch(ids: &[Id], store: &Arc<dyn Store>) -> Result<Vec<WorkoutGroup>, StoreError> {
        store.workout_groups_by_ids(ids).await
    }

    fn group(groups: Vec<WorkoutGroup>) -> HashMap<Id, Arc<WorkoutGroup>> {
        group::by_key(groups, |workout_group| workout_group.id)
    }
}
