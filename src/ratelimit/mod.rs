//! Rate limiting logic and state management.

mod attempt;
mod backend;
mod counter;
mod key;
mod limiter;
mod registry;

pub use attempt::{AuthAttempt, BucketKey};
pub use backend::AdmissionBackend;
pub use counter::{SlidingWindowCounter, WindowSettings, DEFAULT_TICK_INTERVAL, DEFAULT_WINDOW_LENGTH};
pub use key::{Namespace, WindowKey};
pub use limiter::{Policy, RateLimiter};
pub use registry::WindowRegistry;
