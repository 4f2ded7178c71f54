pub mod analytics;
pub mod backend;
pub mod commit;
pub mod config;
pub mod error;
pub mod ipc;
pub mod ledger;
pub mod logging;
pub mod pagination;
pub mod status;
pub mod view;
pub mod working_set;

pub use backend::AttendanceBackend;
pub use error::{EngineError, EngineResult, ErrorKind};
pub use view::AttendanceView;
