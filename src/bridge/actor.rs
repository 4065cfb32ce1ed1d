//! Actor components behind the bridge facade.
//!
//! # Components
//!
//! - `ResponseRouter`: Settles pending requests via oneshot channels
//! - `Reader`: Background tasks that read the child's stdout and stderr
//! - `Writer`: Background task that writes the FIFO queue to the child's stdin

mod line_codec;
mod outbound_message;
mod reader;
mod response_router;
mod writer;

pub(crate) use line_codec::LineCodec;
pub(crate) use outbound_message::OutboundMessage;
pub(crate) use reader::{InboundHandler, spawn_stderr_reader, spawn_stdout_reader};
pub use response_router::{ResponseRouter, Settlement};
pub(crate) use writer::{WriterContext, spawn_writer_task};
