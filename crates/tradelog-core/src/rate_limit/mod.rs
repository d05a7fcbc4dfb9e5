//! Sliding-window admission check.
//!
//! A [`RateLimitPolicy`] says how many requests an identity may make inside a
//! trailing window. A [`WindowLog`] holds the arrival times still inside that
//! window and decides each request, producing an [`Admission`].

mod admission;
mod identity;
mod policy;
mod presets;
mod window;

pub use admission::{Admission, FailureMode, retry_after_secs};
pub use identity::RequestIdentity;
pub use policy::{DEFAULT_DENIAL_MESSAGE, KeyFn, RateLimitPolicy, SkipFn};
pub use presets::{Preset, PresetLimits, RateLimitPresets};
pub use window::WindowLog;
