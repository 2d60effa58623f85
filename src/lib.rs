//! dealflow - event-driven sales pipeline orchestration
//!
//! A CRM webhook reports deal changes. The [`TransitionEngine`] turns each change
//! into stage notifications, replaying any stages the deal skipped, and records the
//! deal in a ledger. Stage handlers subscribe to those notifications: they create
//! the project's folder layout, copy per-stage documents from templates, write the
//! document links back to the deal, open messaging channels and notify people.
//!
//! # Example Usage
//!
//! ```no_run
//! use dealflow::sandbox::Sandbox;
//! use dealflow::FlowConfig;
//!
//! # async fn run(body: &str) {
//! let sandbox = Sandbox::new(FlowConfig::default());
//! sandbox.refresh_templates().await.expect("templates");
//! let report = sandbox.deliver_webhook(body).await;
//! for step in sandbox.trace() {
//!     println!("{}", step);
//! }
//! assert!(report.failed().is_empty());
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`pipeline`]: webhook parsing, field resolution and the transition engine
//! - [`notify`]: notifications, topics, routing and the local dispatcher
//! - [`handlers`]: one stage handler per subscription
//! - [`clients`]: CRM, document store and messaging clients plus fakes
//! - [`store`]: deal ledger, folder and channel registries, template catalog

pub mod cli;
pub mod clients;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod pipeline;
pub mod response;
pub mod sandbox;
pub mod services;
pub mod store;
pub mod util;

pub use config::{ConfigError, FlowConfig};
pub use error::{ErrorClass, FlowError, FlowResult};
pub use handlers::{run_handler, StageHandler};
pub use notify::{Attributes, HandlerKind, Notification, Publisher};
pub use pipeline::{handle_webhook, DealEvent, Stage, TransitionEngine, TransitionOutcome};
pub use response::ActivationResponse;
pub use services::{Fakes, Services};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
