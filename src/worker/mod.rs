//! # Worker Pipeline Channel
//!
//! Runs task pipelines in another execution context. The client sends an
//! initialization request, gets back a callable [`RemotePipeline`], and every
//! call is matched to its reply purely by correlation id. Callback options
//! travel as references and are invoked back across the same channel.

pub mod bridge;
pub mod channel;
pub mod client;
pub mod host;
pub mod message;

pub use bridge::{CallbackRegistry, FunctionRef, OptionValue, Options};
pub use channel::{message_channel, Inbox, MessagePort, Outbox};
pub use client::{RemotePipeline, WorkerClient};
pub use host::{Pipeline, PipelineFactory, WorkerHost};
pub use message::{CorrelationId, PipelineRequest, Reply, WorkerMessage};
