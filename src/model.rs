//! Rows the loaders hand out. Only the columns the loaders group by, plus enough payload to tell
//! rows apart, are modelled here.

/// Every entity is identified by an unsigned 32-bit id.
pub type Id = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Id,
    /// External identity provider uid.
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: Id,
    pub user_id: Id,
    pub name: String,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exercise {
    pub id: Id,
    pub name: String,
    pub description: String,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FriendshipStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Friendship {
    pub id: Id,
    pub requester_id: Id,
    pub requestee_id: Id,
    pub status: FriendshipStatus,
}

impl Friendship {
    /// The other side of the friendship as seen from `user_id`.
    pub fn counterpart(&self, user_id: Id) -> Option<Id> {
        if self.requester_id == user_id {
            Some(self.requestee_id)
        } else if self.requestee_id == user_id {
            Some(self.requester_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workout {
    pub id: Id,
    pub user_id: Id,
    pub workout_group_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkoutExercise {
    pub id: Id,
    pub workout_id: Id,
    pub exercise_id: Id,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetLog {
    pub id: Id,
    pub workout_exercise_id: Id,
    pub weight: i32,
    pub rep_count: i32,
    pub set_number: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkoutGroup {
    pub id: Id,
    pub title: String,
    pub image_url: Option<String>,
}

/// A user suggested to `for_user`. Recommendations are computed per user, so each row says which
/// user it was computed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub for_user: Id,
    pub user: User,
}
