use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    batch_function::BatchFunction,
    error::StoreError,
    group,
    key::UintKey,
    model::{Friendship, Id, Recommendation, User},
    multi::MultiLoader,
    single::SingleLoader,
    store::Store,
};

pub type FriendshipLoader = SingleLoader<Id, Friendship, UintKey>;
pub type FriendshipsByUserLoader = MultiLoader<Id, Friendship, UintKey>;
pub type RecommendedUsersLoader = MultiLoader<Id, User, UintKey>;

pub struct FriendshipsById;

#[async_trait]
impl BatchFunction<Id, Arc<Friendship>> for FriendshipsById {
    type Context = Arc<dyn Store>;
    type Entity = Friendship;
    type Error = StoreError;
    type Codec = UintKey;

    async fn fetch(ids: &[Id], store: &Arc<dyn Store>) -> Result<Vec<Friendship>, StoreError> {
        store.friendships_by_ids(ids).await
    }

    fn group(friendships: Vec<Friendship>) -> HashMap<Id, Arc<Friendship>> {
        group::by_key(friendships, |friendship| friendship.id)
    }
}

/// Accepted friendships of a user, whichever side of the request the user was on.
///
/// One row answers the lookups of both of its users, so it is filed under the requester and the
/// requestee alike.
pub struct FriendshipsByUserId;

#[async_trait]
impl BatchFunction<Id, Vec<Arc<Friendship>>> for FriendshipsByUserId {
    type Context = Arc<dyn Store>;
    type Entity = Friendship;
    type Error = StoreError;
    type Codec = UintKey;

    async fn fetch(user_ids: &[Id], store: &Arc<dyn Store>) -> Result<Vec<Friendship>, StoreError> {
        store.accepted_friendships_by_user_ids(user_ids).await
    }

    fn group(friendships: Vec<Friendship>) -> HashMap<Id, Vec<Arc<Friendship>>> {
        group::by_keys(friendships, |friendship| [friendship.requester_id, friendship.requestee_id])
    }
}

/// Pending friend requests addressed to a user.
pub struct FriendRequestsByUserId;

#[async_trait]
impl BatchFunction<Id, Vec<Arc<Friendship>>> for FriendRequestsByUserId {
    type Context = Arc<dyn Store>;
    type Entity = Friendship;
    type Error = StoreError;
    type Codec = UintKey;

    async fn fetch(user_ids: &[Id], store: &Arc<dyn Store>) -> Result<Vec<Friendship>, StoreError> {
        store.pending_requests_by_requestee_ids(user_ids).await
    }

    fn group(friendships: Vec<Friendship>) -> HashMap<Id, Vec<Arc<Friendship>>> {
        group::by_keys(friendships, |friendship| Some(friendship.requestee_id))
    }
}

/// Users suggested as new friends.
///
/// A suggested user row says nothing about which requested user it was computed for, so the
/// data source returns `Recommendation` rows that carry their key and grouping only has to read it.
pub struct RecommendedUsersByUserId;

#[async_trait]
impl BatchFunction<Id, Vec<Arc<User>>> for RecommendedUsersByUserId {
    type Context = Arc<dyn Store>;
    type Entity = Recommendation;
    type Error = StoreError;
    type Codec = UintKey;

    async fn fetch(
        user_ids: &[Id],
        store: &Arc<dyn Store>,
    ) -> Result<Vec<Recommendation>, StoreError> {
        store.recommendations_by_user_ids(user_ids).await
    }

    fn group(recommendations: Vec<Recommendation>) -> HashMap<Id, Vec<Arc<User>>> {
        let mut grouped: HashMap<Id, Vec<Arc<User>>> = HashMap::new();
        for recommendation in recommendations {
            grouped.entry(recommendation.for_user).or_default().push(Arc::new(recommendation.user));
        }
        grouped
    }
}
