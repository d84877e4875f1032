pub mod scroll;

pub use scroll::{ScrollBehavior, ScrollFollow, ScrollGesture, ScrollMetrics};
