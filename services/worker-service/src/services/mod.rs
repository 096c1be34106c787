//! Persistence sinks provided by the worker service.

mod result_sink;

pub use result_sink::{RedisResultSink, ResultRecord};
