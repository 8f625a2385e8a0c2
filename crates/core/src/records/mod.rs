//! Stored records
//!
//! The five record kinds persisted by the engine, serialized as JSON under
//! their primary keys:
//!
//! | Record | Primary key | Secondary key |
//! |--------|-------------|---------------|
//! | `Assistant` | `(org, ASSISTANT, id)` | `(ASSISTANT, id)` |
//! | `Thread` | `(org, THREAD, id)` | `(THREAD, id)` |
//! | `Message` | `(thread, MESSAGE, id)` | none |
//! | `Run` | `(thread, RUN, id)` | `(RUN, id)` |
//! | `Step` | `(run, STEP, id)` | `(STEP, id)` |

mod assistant;
mod message;
mod run;
mod status;
mod step;
mod thread;

use std::collections::BTreeMap;

pub use assistant::Assistant;
pub use message::{Message, MessageContent, Role, TextContent};
pub use run::Run;
pub use status::{LastError, LastErrorCode, RunStatus, StepStatus};
pub use step::{MessageCreation, Step, StepDetails, StepType};
pub use thread::Thread;

/// Free-form string pairs attached to a record
pub type Metadata = BTreeMap<String, String>;
