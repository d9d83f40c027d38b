//! Common macro for implementing 128-bit ID wrapper types.

macro_rules! impl_uuid_id {
    ($($name:ident),* $(,)?) => {
        $(
            impl $name {
                /// Width of the id on the wire.
                pub const LEN: usize = 16;

                pub fn new() -> Self {
                    Self(uuid::Uuid::new_v4())
                }

                pub const fn nil() -> Self {
                    Self(uuid::Uuid::nil())
                }

                pub fn from_bytes(bytes: [u8; 16]) -> Self {
                    Self(uuid::Uuid::from_bytes(bytes))
                }

                pub fn as_bytes(&self) -> &[u8; 16] {
                    self.0.as_bytes()
                }

                pub fn is_nil(&self) -> bool {
                    self.0.is_nil()
                }

                pub fn inner(&self) -> &uuid::Uuid {
                    &self.0
                }
            }

            impl Default for $name {
                fn default() -> Self {
                    Self::nil()
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl std::str::FromStr for $name {
                type Err = uuid::Error;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    uuid::Uuid::parse_str(s).map(Self)
                }
            }

            impl From<uuid::Uuid> for $name {
                fn from(id: uuid::Uuid) -> Self {
                    Self(id)
                }
            }

            impl From<$name> for uuid::Uuid {
                fn from(id: $name) -> Self {
                    id.0
                }
            }
        )*
    };
}

pub(crate) use impl_uuid_id;
