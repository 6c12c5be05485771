//! stackres: custom-resource handlers for CloudFormation stacks.
//!
//! Every handler follows the same pipeline:
//! validate properties → query the provider → select one match →
//! (optionally) reconcile it → (optionally) wait for convergence → respond.

pub mod config;
pub mod criteria;
pub mod error;
pub mod fetch;
pub mod handlers;
pub mod invocation;
pub mod matching;
pub mod provider;
pub mod reconcile;
pub mod response;
pub mod wait;

pub use config::HandlerConfig;
pub use criteria::{Properties, TagSet};
pub use error::{HandlerError, ProviderError, ValidationError};
pub use handlers::{Handler, Outputs, Registry};
pub use invocation::{Dispatcher, Event, InvocationContext, RequestType};
pub use matching::{MatchResult, Score, ScoreCard};
pub use provider::{MemoryProvider, Providers};
pub use reconcile::{Operation, Outcome, Reconciler, reconcile};
pub use response::{HttpResponder, Responder, ResponseBody, ResponseError, Status};
pub use wait::{WaitOutcome, Waiter};
