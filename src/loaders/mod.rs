//! The concrete loaders of the workout API, one per relation a resolver walks.

mod exercises;
mod friendships;
mod profiles;
mod set_logs;
mod users;
mod workout_exercises;
mod workout_groups;
mod workouts;

pub use exercises::{ExerciseLoader, ExercisesById};
pub use friendships::{
    FriendRequestsByUserId, FriendshipLoader, FriendshipsById, FriendshipsByUserId,
    FriendshipsByUserLoader, RecommendedUsersByUserId, RecommendedUsersLoader,
};
pub use profiles::{ProfileLoader, ProfilesByUserId};
pub use set_logs::{SetLogsByWorkoutExerciseId, SetLogsLoader};
pub use users::{UserLoader, UsersById};
pub use workout_exercises::{
    WorkoutExercisesByExerciseId, WorkoutExercisesByWorkoutId, WorkoutExercisesLoader,
};
pub use workout_groups::{WorkoutGroupLoader, WorkoutGroupsById};
pub use workouts::{
    WorkoutLoader, WorkoutsByGroupId, WorkoutsByGroupLoader, WorkoutsById, WorkoutsByUserId,
    WorkoutsByUserLoader,
};
