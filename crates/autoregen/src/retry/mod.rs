//! Failure handling: the coordinator state machine and everything it talks to.
//!
//! - [`coordinator`]: [`RetryCoordinator`], the single owner of the failure
//!   count and lock. Serializes overlapping failure reports into one retry.
//! - [`trigger`]: [`ActionTrigger`] host capability and the delayed
//!   [`RetryTrigger`] dispatcher.
//! - [`events`]: [`RetryEvent`] and the [`EventHandler`] chain.
//! - [`failure`]: [`Failure`] / [`FailureKind`] taxonomy.
//! - [`state`]: [`RetryState`], [`RetryPhase`], [`RetrySnapshot`].

pub mod coordinator;
pub mod events;
pub mod failure;
pub mod state;
pub mod trigger;

pub use coordinator::{CoordinatorBuilder, RetryCoordinator};
pub use events::{
    CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler, RetryEvent,
};
pub use failure::{Failure, FailureKind};
pub use state::{RetryPhase, RetrySnapshot, RetryState};
pub use trigger::{
    ActionTrigger, ChannelTrigger, FnTrigger, RegenerateCommand, RetryTrigger, TriggerOutcome,
};
