//! Static reference data: process types, step types and step statuses.
//!
//! Each catalog is a closed enum whose numeric ids and labels mirror the rows
//! provisioned in the `process_types`, `process_step_types` and
//! `process_step_statuses` tables. Pairing of actions with their retrigger and
//! decline counterparts is expressed as exhaustive `match` tables so that a new
//! step type cannot be added without deciding its place in the state machine.

macro_rules! catalog_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident = $id:literal => $label:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn id(self) -> i64 {
                match self {
                    $($name::$variant => $id,)+
                }
            }

            pub fn from_id(id: i64) -> Option<Self> {
                match id {
                    $($id => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            pub fn parse_label(raw: &str) -> Option<Self> {
                let normalized = raw.trim().to_ascii_uppercase();
                match normalized.as_str() {
                    $($label => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.label())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                $crate::shared::serde_ext::parse_via_string(deserializer, $kind, Self::parse_label)
            }
        }
    };
}

pub mod process_types;
pub mod step_status;
pub mod step_types;

pub use process_types::ProcessTypeId;
pub use step_status::StepStatus;
pub use step_types::{StepRole, StepTypeId};
