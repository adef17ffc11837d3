//! Bundled hook sets attached with `subscribe`.

pub mod debug;
pub mod result_mock;

pub use debug::DebugSubscriber;
pub use result_mock::{MockResult, ResultMock};
