use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    batch_function::BatchFunction,
    error::StoreError,
    group,
    key::UintKey,
    model::{Id, Profile},
    single::SingleLoader,
    store::Store,
};

pub type ProfileLoader = SingleLoader<Id, Profile, UintKey>;

/// A user's profile, keyed by user id. Users without a profile resolve to `None`.
pub struct ProfilesByUserId;

#[async_trait]
impl BatchFunction<Id, Arc<Profile>> for ProfilesByUserId {
    type Context = Arc<dyn Store>;
    type Entity = Profile;
    type Error = StoreError;
    type Codec = UintKey;

    async fn fetch(user_ids: &[Id], store: &Arc<dyn Store>) -> Result<Vec<Profile>, StoreError> {
        store.profiles_by_user_ids(user_ids).await
    }

    fn group(profiles: Vec<Profile>) -> HashMap<Id, Arc<Profile>> {
        group::by_key(profiles, |profile| profile.user_id)
    }
}
