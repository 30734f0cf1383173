use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    batch_function::BatchFunction,
    error::StoreError,
    group,
    key::UintKey,
    model::{Id, User},
    single::SingleLoader,
    store::Store,
};

pub type UserLoader = SingleLoader<Id, User, UintKey>;

/// Users by id.
pub struct UsersById;

#[async_trait]
impl BatchFunction<Id, Arc<User>> for UsersById {
    type Context = Arc<dyn Store>;
    type Entity = User;
    type Error = StoreError;
    type Codec = UintKey;

    async fn fetch(ids: &[Id], store: &Arc<dyn Store>) -> Result<Vec<User>, StoreError> {
        store.users_by_ids(ids).await
    }

    fn group(users: Vec<User>) -> HashMap<Id, Arc<User>> {
        group::by_key(users, |user| user.id)
    }
}
