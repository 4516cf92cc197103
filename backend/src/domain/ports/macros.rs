//! Defines helper macros for generating domain port error enums.
//!
//! Each variant may be prefixed with the `transient` marker before its
//! message. The generated `is_transient` accessor reports that marker so
//! consumers can decide between redelivery and dropping a message without
//! matching on adapter-specific variants.

macro_rules! define_port_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        define_port_error!(@ctor_impl $variant () () $( $field : $ty, )*);
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) ) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) $field:ident : $ty:ty, $($rest:tt)*) => {
        define_port_error!(
            @ctor_impl
            $variant
            ($($params)* $field: impl Into<$ty>,)
            ($($inits)* $field: $field.into(),)
            $($rest)*
        );
    };

    (@transient transient) => {
        true
    };

    (@transient) => {
        false
    };

    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )?
                    => $($class:ident)? $message:literal
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*

            /// Return whether retrying the failed operation may succeed.
            pub fn is_transient(&self) -> bool {
                match self {
                    $(
                        Self::$variant { .. } => define_port_error!(@transient $($class)?),
                    )*
                }
            }
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    define_port_error! {
        pub enum ExamplePortError {
            Unreachable { message: String } => transient "unreachable: {message}",
            Rejected { count: u32 } => "rejected: {count}",
            Both { message: String, count: u32 } => "both: {message} ({count})",
            Closed => transient "closed",
        }
    }

    #[test]
    fn constructors_accept_str_for_string_fields() {
        let err = ExamplePortError::unreachable("broker down");
        assert_eq!(err.to_string(), "unreachable: broker down");
    }

    #[test]
    fn constructors_preserve_non_string_types() {
        let err = ExamplePortError::both("template", 3_u32);
        assert_eq!(err.to_string(), "both: template (3)");
    }

    #[test]
    fn unit_variants_get_constructors() {
        assert_eq!(ExamplePortError::closed(), ExamplePortError::Closed);
    }

    #[test]
    fn transient_marker_drives_classification() {
        assert!(ExamplePortError::unreachable("x").is_transient());
        assert!(ExamplePortError::closed().is_transient());
        assert!(!ExamplePortError::rejected(1_u32).is_transient());
        assert!(!ExamplePortError::both("x", 2_u32).is_transient());
    }
}
