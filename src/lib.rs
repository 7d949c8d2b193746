//! Rustle danmaku
//!
//! Lane allocation and comment scheduling for scrolling video comments, plus
//! the host player seam it is driven by and an offline replay harness.

pub mod danmaku;
pub mod player;
pub mod replay;

pub use danmaku::{CommentItem, CommentType, Danmaku, DanmakuOverrides, SharedDanmaku};
pub use player::{PlayerHost, SimulatedPlayer, ViewportRect};
