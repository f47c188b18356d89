//! Identifier newtypes and the runtime event value.
//!
//! Machines reference states, events, actions, and guards by name. Each name
//! gets its own newtype so a transition target cannot be confused with an
//! action id at a call site.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// View the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True for the empty identifier.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:?}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

id_type!(
    /// Uniquely identifies a state within a machine.
    StateId
);

id_type!(
    /// A named event type.
    EventId
);

id_type!(
    /// A named action registered on the machine.
    ActionId
);

id_type!(
    /// A named guard registered on the machine.
    GuardId
);

/// A runtime event: a named type plus an opaque payload.
///
/// The payload is never inspected by the engine; actions and guards that
/// know the concrete type can recover it with [`Event::payload`].
///
/// # Example
///
/// ```rust
/// use statecraft::core::Event;
///
/// let plain = Event::new("SUBMIT");
/// assert_eq!(plain.id().as_str(), "SUBMIT");
///
/// let with_data = Event::with_payload("SUBMIT", 42u32);
/// assert_eq!(with_data.payload::<u32>(), Some(&42));
/// assert_eq!(with_data.payload::<String>(), None);
/// ```
#[derive(Clone)]
pub struct Event {
    id: EventId,
    payload: Option<Arc<dyn Any + Send + Sync>>,
}

impl Event {
    /// Create an event with no payload.
    pub fn new(id: impl Into<EventId>) -> Self {
        Self {
            id: id.into(),
            payload: None,
        }
    }

    /// Create an event carrying a payload value.
    pub fn with_payload<P>(id: impl Into<EventId>, payload: P) -> Self
    where
        P: Any + Send + Sync,
    {
        Self {
            id: id.into(),
            payload: Some(Arc::new(payload)),
        }
    }

    /// The engine-internal event: empty type, no payload. Delivered to actions
    /// during initial entry and delayed-transition firing.
    pub(crate) fn empty() -> Self {
        Self {
            id: EventId::default(),
            payload: None,
        }
    }

    /// The event's type.
    pub fn id(&self) -> &EventId {
        &self.id
    }

    /// Downcast the payload to a concrete type, if one was attached.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_compare_by_value() {
        let a = StateId::from("idle");
        let b = StateId::from("idle".to_string());
        assert_eq!(a, b);
        assert_eq!(a, "idle");
        assert_ne!(a, StateId::from("working"));
    }

    #[test]
    fn ids_display_as_bare_names() {
        assert_eq!(EventId::from("START").to_string(), "START");
        assert_eq!(format!("{:?}", ActionId::from("log")), "\"log\"");
    }

    #[test]
    fn default_id_is_empty() {
        assert!(EventId::default().is_empty());
        assert!(!EventId::from("GO").is_empty());
    }

    #[test]
    fn ids_roundtrip_serialization() {
        let id = StateId::from("active");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"active\"");
        let back: StateId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn event_payload_downcasts_by_type() {
        let event = Event::with_payload("DATA", String::from("hello"));
        assert_eq!(event.payload::<String>(), Some(&String::from("hello")));
        assert_eq!(event.payload::<u32>(), None);
        assert_eq!(Event::new("PLAIN").payload::<String>(), None);
    }

    #[test]
    fn empty_event_has_empty_type() {
        let event = Event::empty();
        assert!(event.id().is_empty());
        assert!(event.payload::<()>().is_none());
    }

    #[test]
    fn events_clone_cheaply() {
        let event = Event::with_payload("DATA", vec![1u8, 2, 3]);
        let copy = event.clone();
        assert_eq!(copy.payload::<Vec<u8>>(), Some(&vec![1u8, 2, 3]));
    }
}
