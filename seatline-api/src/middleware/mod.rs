pub mod caller;

pub use caller::{caller_token_middleware, CallerToken};
