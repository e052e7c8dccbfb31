//! Step-wise settlement price updates through a seller dashboard.
//!
//! A [`BrowserSession`] drives a Chromium-family browser over the DevTools
//! protocol. [`SellerDashboard`] exposes the pricing UI through the
//! [`PricingAdapter`] trait, and [`ConvergenceEngine`] raises each listing's
//! settlement value toward its target in bounded steps.

pub mod adapter;
pub mod batch;
pub mod browser;
pub mod cdp;
pub mod config;
pub mod dashboard;
pub mod element;
pub mod engine;
pub mod errors;
pub mod input;
pub mod locator;
pub mod page;
pub mod selector;
pub mod types;

pub use adapter::PricingAdapter;
pub use batch::{run_batch, run_batch_until, RunSummary, SummaryReport};
pub use browser::BrowserSession;
pub use config::Config;
pub use dashboard::SellerDashboard;
pub use engine::{ApplyPolicy, ConvergenceEngine, GROWTH_FACTOR};
pub use errors::{AdapterError, AutomationError, ConfigError, InputError, SessionError, TaskError};
pub use input::{load_tasks, TaskRow};
pub use locator::{Locator, WaitCondition};
pub use page::Page;
pub use selector::Selector;
pub use types::{PriceTask, StepResult, TaskOutcome, TaskPhase, TaskReport};
