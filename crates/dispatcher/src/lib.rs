//! Routes a user request to the responders for its intents.
//!
//! Each request goes through three steps:
//!
//! 1. **Classify** the text into a primary label plus confident secondaries
//! 2. **Fall back** on keywords when the primary is below threshold
//! 3. **Dispatch** to each selected label's responder in order, and join
//!    the answers as `[Title] answer` blocks
//!
//! A responder that errors or panics contributes an error block for its own
//! label and never aborts the request.

pub mod router;
pub mod session;

pub use router::{DecisionSource, Dispatcher, NO_RESPONDER_NOTICE, RoutingDecision};
pub use session::{SessionFactory, keyword_matcher, routing_settings};
