//! Boilerplate generators for API enums and parameter structs.

/// Declares an extensible string enum.
///
/// Known wire values map to named variants; anything else decodes into
/// `Other(String)` and encodes back unchanged, so a server adding a status
/// never breaks decoding.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// A value this client version does not know about.
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $( $name::$variant => $wire, )+
                    $name::Other(value) => value.as_str(),
                }
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                match value {
                    $( $wire => $name::$variant, )+
                    other => $name::Other(other.to_string()),
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> ::std::result::Result<Self, D::Error> {
                let value = <::std::string::String as ::serde::Deserialize>::deserialize(deserializer)?;
                Ok($name::from(value.as_str()))
            }
        }
    };
}

/// Implements `Params` for structs carrying an `extra_fields: Extras` member.
macro_rules! impl_params {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::codec::Params for $ty {
                fn extra_fields(&self) -> &$crate::codec::Extras {
                    &self.extra_fields
                }
            }
        )+
    };
}

/// Constructor and option layering shared by every service.
macro_rules! impl_service {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl $ty {
                pub(crate) fn new(client: $crate::client::Client) -> Self {
                    Self {
                        client,
                        options: $crate::options::RequestOptions::new(),
                    }
                }

                /// A copy of this service with `options` layered on top.
                pub fn with_options(&self, options: $crate::options::RequestOptions) -> Self {
                    Self {
                        client: self.client.clone(),
                        options: self.options.merge(&options),
                    }
                }
            }
        )+
    };
}

pub(crate) use impl_params;
pub(crate) use impl_service;
pub(crate) use string_enum;

#[cfg(test)]
mod tests {
    string_enum! {
        pub enum Color {
            Red => "red",
            DarkBlue => "dark_blue",
        }
    }

    #[test]
    fn known_values_round_trip() {
        let color: Color = serde_json::from_str(r#""dark_blue""#).unwrap();
        assert_eq!(color, Color::DarkBlue);
        assert_eq!(serde_json::to_string(&color).unwrap(), r#""dark_blue""#);
    }

    #[test]
    fn unknown_values_are_preserved() {
        let color: Color = serde_json::from_str(r#""ultraviolet""#).unwrap();
        assert_eq!(color, Color::Other("ultraviolet".to_string()));
        assert_eq!(color.to_string(), "ultraviolet");
        assert_eq!(serde_json::to_string(&color).unwrap(), r#""ultraviolet""#);
    }
}
