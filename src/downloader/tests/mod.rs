pub(crate) use super::test_helpers::*;
pub(crate) use crate::error::Error;
pub(crate) use crate::types::{Status, Task, TaskId, TaskKind, TaskOptions};

mod lifecycle;
