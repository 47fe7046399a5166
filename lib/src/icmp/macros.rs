/// Declare a newtype over a `u8` wire field with named constants.
///
/// The doc string of each constant doubles as its human readable name.
macro_rules! __wire_enum {
    (
        $(#[$meta:meta])*
        pub struct $ty:ident {
            $(
                #[doc = $doc:literal]
                $name:ident = $value:expr;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        pub struct $ty(u8);

        impl $ty {
            $(
                #[doc = $doc]
                pub const $name: Self = Self($value);
            )*

            /// Construct from a raw wire value.
            #[inline]
            pub const fn new(value: u8) -> Self {
                Self(value)
            }

            /// The raw wire value.
            #[inline]
            pub const fn get(self) -> u8 {
                self.0
            }

            /// The human readable name of a known value.
            pub const fn name(self) -> Option<&'static str> {
                match self.0 {
                    $(value if value == $value => Some($doc.trim_ascii()),)*
                    _ => None,
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.name() {
                    Some(name) => f.write_str(name),
                    None => write!(f, "unknown ({})", self.0),
                }
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.0 {
                    $(value if value == $value => f.write_str(stringify!($name)),)*
                    value => write!(f, "{}({value})", stringify!($ty)),
                }
            }
        }
    };
}

pub(super) use __wire_enum as wire_enum;
