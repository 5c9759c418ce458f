//! Macros for declaring machine states and events.

/// Declare a unit-variant state enum and its State implementation.
///
/// Alongside the trait impl the enum gets an `ALL` constant listing every
/// variant in declaration order, for tables that add the same transition
/// to each state.
///
/// # Example
///
/// ```
/// use caseflow::state_enum;
///
/// state_enum! {
///     pub enum PublishState {
///         Draft,
///         Publishing,
///         Published,
///         Failed,
///     }
///     final: [Published]
///     error: [Failed]
/// }
///
/// assert_eq!(PublishState::ALL.len(), 4);
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }

        $(final: [$($final:ident),* $(,)?])?
        $(error: [$($error:ident),* $(,)?])?
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $name {
            #[allow(dead_code)]
            pub const ALL: &'static [$name] = &[$($name::$variant),*];
        }

        impl $crate::core::State for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }

            fn is_final(&self) -> bool {
                match self {
                    $($(Self::$final => true,)*)?
                    _ => false,
                }
            }

            fn is_error(&self) -> bool {
                match self {
                    $($(Self::$error => true,)*)?
                    _ => false,
                }
            }
        }
    };
}

/// Generate an event enum and its Event trait implementation.
///
/// Each variant is paired with the tag transitions refer to it by.
///
/// # Example
///
/// ```
/// use caseflow::event_enum;
///
/// event_enum! {
///     pub enum ReferralEvent {
///         Send => "SEND",
///         AddUnit(String) => "ADD_UNIT",
///     }
/// }
/// ```
#[macro_export]
macro_rules! event_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( ( $($field:ty),* $(,)? ) )? => $label:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant $( ( $($field),* ) )?
            ),*
        }

        impl $crate::core::Event for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant { .. } => $label),*
                }
            }

            fn names() -> &'static [&'static str] {
                &[$($label),*]
            }
        }
    };
}
