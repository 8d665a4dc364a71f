//! Shared model for the Argo CD MCP server: a lenient typed view over
//! application documents, the listing filter engine, resource references and
//! finite log stream decoding. No I/O happens here.

pub mod application;
pub mod filter;
pub mod logs;
pub mod resource;

pub use application::Application;
pub use filter::{FilterCriteria, LabelPredicate, filter_applications};
pub use logs::{DEFAULT_TAIL_LINES, LogCollector, LogEntry, LogStreamError};
pub use resource::ResourceRef;
