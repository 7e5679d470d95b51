mod automation;
mod clock;
mod commands;
mod error;
mod events;
pub mod keys;
pub mod keywords;
mod models;
pub mod protocol;
pub mod reply;
mod work;

pub use automation::{
    AutomationDefinition, ButtonConfig, CombinedLimits, ContentRules, DelayRange, Edge, Node,
    NodeKind, ReplyConfig, SafetyActionTypes, SafetyConfig, TriggerConfig,
    ACTION_SEND_MESSAGE, TRIGGER_COMMENT_RECEIVED,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::ReplyIntent;
pub use error::DomainError;
pub use events::CommentNotification;
pub use models::{ActionKind, CommentEvent};
pub use work::ScheduledWorkItem;
