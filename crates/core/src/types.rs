//! Core types for Runkeeper
//!
//! This module defines the foundational types:
//! - Entity ids: `AssistantId`, `ThreadId`, `MessageId`, `RunId`, `StepId`,
//!   `OrganizationId`
//! - TypeTag: kind discriminator for stored entities
//! - Key: primary `(parent, kind, id)` or secondary `(kind, id)` keys
//! - KeyPrefix: the `(parent, kind)` pair used for ordered scans

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Prefix used by generated ids
            pub const PREFIX: &'static str = $prefix;

            /// Generate a fresh, time-ordered id
            pub fn generate() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7().simple()))
            }

            /// Borrow the id as a string slice
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume into the underlying string
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

entity_id!(
    /// Id of an organization (the owner of assistants and threads)
    OrganizationId,
    "org"
);
entity_id!(
    /// Id of an assistant (`asst_...`)
    AssistantId,
    "asst"
);
entity_id!(
    /// Id of a thread (`thrd_...`)
    ThreadId,
    "thrd"
);
entity_id!(
    /// Id of a message (`msg_...`)
    MessageId,
    "msg"
);
entity_id!(
    /// Id of a run (`run_...`)
    RunId,
    "run"
);
entity_id!(
    /// Id of a run step (`step_...`)
    StepId,
    "step"
);

impl Default for OrganizationId {
    fn default() -> Self {
        OrganizationId::from("org_default")
    }
}

/// Type tag for discriminating entity kinds in the store
///
/// Ordering: Assistant < Thread < Message < Run < Step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[repr(u8)]
pub enum TypeTag {
    /// Assistant configuration records
    Assistant = 0x01,
    /// Conversation threads
    Thread = 0x02,
    /// Thread messages
    Message = 0x03,
    /// Runs
    Run = 0x04,
    /// Run steps
    Step = 0x05,
}

impl TypeTag {
    /// Convert to byte representation
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Try to create from byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(TypeTag::Assistant),
            0x02 => Some(TypeTag::Thread),
            0x03 => Some(TypeTag::Message),
            0x04 => Some(TypeTag::Run),
            0x05 => Some(TypeTag::Step),
            _ => None,
        }
    }

    /// Public object name of records of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Assistant => "assistant",
            TypeTag::Thread => "thread",
            TypeTag::Message => "thread.message",
            TypeTag::Run => "thread.run",
            TypeTag::Step => "thread.run.step",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of a stored entry
///
/// A primary key `(parent, kind, id)` holds the record itself; a secondary
/// key `(kind, id)` has no parent and holds a pointer to the primary key, so
/// an entity can be found from its public id alone.
///
/// # Ordering
///
/// Keys are ordered by: parent → type_tag → id, with secondary keys (no
/// parent) sorting before every primary key. All children of one parent and
/// kind are contiguous, and because generated ids are time-ordered they scan
/// oldest first.
///
/// # Examples
///
/// ```
/// use runkeeper_core::{Key, KeyPrefix, RunId, ThreadId};
///
/// let thread = ThreadId::from("thrd-1");
/// let run = RunId::from("run-1");
///
/// let primary = Key::run(&thread, &run);
/// let secondary = Key::run_index(&run);
///
/// assert!(primary.starts_with(&KeyPrefix::runs(&thread)));
/// assert!(!secondary.is_primary());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    /// Owning entity id; `None` for secondary keys
    pub parent: Option<String>,
    /// Kind of the entity
    pub type_tag: TypeTag,
    /// Public id of the entity
    pub id: String,
}

impl Key {
    /// Create a primary key
    pub fn primary(parent: impl Into<String>, type_tag: TypeTag, id: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            type_tag,
            id: id.into(),
        }
    }

    /// Create a secondary key
    pub fn secondary(type_tag: TypeTag, id: impl Into<String>) -> Self {
        Self {
            parent: None,
            type_tag,
            id: id.into(),
        }
    }

    /// Primary key of an assistant: `(org, ASSISTANT, id)`
    pub fn assistant(org: &OrganizationId, id: &AssistantId) -> Self {
        Self::primary(org.as_str(), TypeTag::Assistant, id.as_str())
    }

    /// Secondary key of an assistant: `(ASSISTANT, id)`
    pub fn assistant_index(id: &AssistantId) -> Self {
        Self::secondary(TypeTag::Assistant, id.as_str())
    }

    /// Primary key of a thread: `(org, THREAD, id)`
    pub fn thread(org: &OrganizationId, id: &ThreadId) -> Self {
        Self::primary(org.as_str(), TypeTag::Thread, id.as_str())
    }

    /// Secondary key of a thread: `(THREAD, id)`
    pub fn thread_index(id: &ThreadId) -> Self {
        Self::secondary(TypeTag::Thread, id.as_str())
    }

    /// Primary key of a message: `(thread, MESSAGE, id)`
    pub fn message(thread: &ThreadId, id: &MessageId) -> Self {
        Self::primary(thread.as_str(), TypeTag::Message, id.as_str())
    }

    /// Primary key of a run: `(thread, RUN, id)`
    pub fn run(thread: &ThreadId, id: &RunId) -> Self {
        Self::primary(thread.as_str(), TypeTag::Run, id.as_str())
    }

    /// Secondary key of a run: `(RUN, id)`
    pub fn run_index(id: &RunId) -> Self {
        Self::secondary(TypeTag::Run, id.as_str())
    }

    /// Primary key of a step: `(run, STEP, id)`
    pub fn step(run: &RunId, id: &StepId) -> Self {
        Self::primary(run.as_str(), TypeTag::Step, id.as_str())
    }

    /// Secondary key of a step: `(STEP, id)`
    pub fn step_index(id: &StepId) -> Self {
        Self::secondary(TypeTag::Step, id.as_str())
    }

    /// True for primary keys
    pub fn is_primary(&self) -> bool {
        self.parent.is_some()
    }

    /// Check if this key falls under the given prefix
    pub fn starts_with(&self, prefix: &KeyPrefix) -> bool {
        self.parent.as_deref() == Some(prefix.parent.as_str()) && self.type_tag == prefix.type_tag
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "{}/{}/{}", parent, self.type_tag, self.id),
            None => write!(f, "{}/{}", self.type_tag, self.id),
        }
    }
}

/// Ordering implementation for BTreeMap
///
/// Keys are ordered by: parent → type_tag → id
impl Ord for Key {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.parent
            .cmp(&other.parent)
            .then(self.type_tag.cmp(&other.type_tag))
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// All primary keys of one kind under one parent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPrefix {
    /// Owning entity id
    pub parent: String,
    /// Kind of the children
    pub type_tag: TypeTag,
}

impl KeyPrefix {
    /// Create a prefix
    pub fn new(parent: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            parent: parent.into(),
            type_tag,
        }
    }

    /// Runs of a thread
    pub fn runs(thread: &ThreadId) -> Self {
        Self::new(thread.as_str(), TypeTag::Run)
    }

    /// Steps of a run
    pub fn steps(run: &RunId) -> Self {
        Self::new(run.as_str(), TypeTag::Step)
    }

    /// Messages of a thread
    pub fn messages(thread: &ThreadId) -> Self {
        Self::new(thread.as_str(), TypeTag::Message)
    }

    /// Smallest key under this prefix; the start of a range scan
    pub fn lower_bound(&self) -> Key {
        Key::primary(self.parent.clone(), self.type_tag, String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_generated_ids_are_prefixed_and_unique() {
        let a = RunId::generate();
        let b = RunId::generate();
        assert!(a.as_str().starts_with("run_"));
        assert_ne!(a, b);
        assert!(StepId::generate().as_str().starts_with("step_"));
        assert!(ThreadId::generate().as_str().starts_with("thrd_"));
        assert!(AssistantId::generate().as_str().starts_with("asst_"));
        assert!(MessageId::generate().as_str().starts_with("msg_"));
    }

    #[test]
    fn test_generated_ids_sort_by_creation() {
        let ids: Vec<MessageId> = (0..100).map(|_| MessageId::generate()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_id_serde_is_bare_string() {
        let id = RunId::from("run-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"run-1\"");
    }

    #[test]
    fn test_type_tag_byte_roundtrip() {
        for tag in [
            TypeTag::Assistant,
            TypeTag::Thread,
            TypeTag::Message,
            TypeTag::Run,
            TypeTag::Step,
        ] {
            assert_eq!(TypeTag::from_byte(tag.as_byte()), Some(tag));
        }
        assert_eq!(TypeTag::from_byte(0xFF), None);
    }

    #[test]
    fn test_type_tag_object_names() {
        assert_eq!(TypeTag::Run.as_str(), "thread.run");
        assert_eq!(TypeTag::Step.as_str(), "thread.run.step");
        assert_eq!(TypeTag::Message.as_str(), "thread.message");
    }

    #[test]
    fn test_key_prefix_matching() {
        let thread = ThreadId::from("thrd-1");
        let other = ThreadId::from("thrd-2");
        let run = RunId::from("run-1");

        assert!(Key::run(&thread, &run).starts_with(&KeyPrefix::runs(&thread)));
        assert!(!Key::run(&other, &run).starts_with(&KeyPrefix::runs(&thread)));
        assert!(!Key::message(&thread, &MessageId::from("m")).starts_with(&KeyPrefix::runs(&thread)));
        assert!(!Key::run_index(&run).starts_with(&KeyPrefix::runs(&thread)));
    }

    #[test]
    fn test_children_are_contiguous_in_btree() {
        let t1 = ThreadId::from("thrd-1");
        let t2 = ThreadId::from("thrd-2");
        let mut map = BTreeMap::new();
        map.insert(Key::run(&t1, &RunId::from("run-b")), 2);
        map.insert(Key::message(&t1, &MessageId::from("msg-a")), 0);
        map.insert(Key::run(&t2, &RunId::from("run-a")), 9);
        map.insert(Key::run(&t1, &RunId::from("run-a")), 1);
        map.insert(Key::run_index(&RunId::from("run-a")), 7);

        let prefix = KeyPrefix::runs(&t1);
        let found: Vec<i32> = map
            .range(prefix.lower_bound()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(_, v)| *v)
            .collect();
        assert_eq!(found, vec![1, 2]);
    }

    #[test]
    fn test_secondary_keys_sort_before_primary() {
        let secondary = Key::run_index(&RunId::from("zzz"));
        let primary = Key::run(&ThreadId::from("a"), &RunId::from("a"));
        assert!(secondary < primary);
    }

    #[test]
    fn test_key_display() {
        let key = Key::step(&RunId::from("run-1"), &StepId::from("step-1"));
        assert_eq!(key.to_string(), "run-1/thread.run.step/step-1");
        assert_eq!(
            Key::step_index(&StepId::from("step-1")).to_string(),
            "thread.run.step/step-1"
        );
    }

    #[test]
    fn test_default_organization() {
        assert_eq!(OrganizationId::default().as_str(), "org_default");
    }
}
