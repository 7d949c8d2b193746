//! Danmaku engine
//!
//! Schedules time-stamped comments onto horizontal lanes over a playing video:
//! - `comment`: comment items, types and color helpers
//! - `options`: effective options, user overrides and the options file
//! - `bullet`: live comment instance and its motion
//! - `pool`: bullet arena with a free-list
//! - `lanes`: per-family lane slots and the allocation policies
//! - `scheduler`: time-window cursor over the comment queue
//! - `stage`: lanes, pool and layout bound together
//! - `controller`: `Danmaku`, the handle attached to a host player
//!
//! ## Data flow
//! ```text
//! time-update --> Danmaku::fire --> FireScheduler --> Stage (CommentSink)
//!                                                     |-- LaneTable (allocate)
//!                                                     `-- BulletPool (acquire)
//! ```

pub mod bullet;
pub mod comment;
pub mod controller;
pub mod lanes;
pub mod options;
pub mod pool;
pub mod scheduler;
pub mod stage;

pub use bullet::{Bullet, BulletId};
pub use comment::{BlockKind, CommentItem, CommentType, load_comments};
pub use controller::{Danmaku, SharedDanmaku};
pub use lanes::Rejection;
pub use options::{Area, DanmakuOptions, DanmakuOverrides, OptionsError};
pub use scheduler::{FireReport, SchedulerStats};
