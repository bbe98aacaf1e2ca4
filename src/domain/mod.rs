pub mod activity;
pub mod follow;
pub mod identity;

pub use activity::{
    Activity, ActivityRef, AddActivitiesResponse, ApiResponse, FeedResponse, NewActivity,
    RemoveActivityResponse, TargetUpdateResponse,
};
pub use follow::{FollowPage, FollowRecord};
pub use identity::{feed_id, validate_feed_slug, validate_user_id, FeedIdentity, Signature};
