use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            /// The reserved "no resource" value.
            pub const NONE: Self = Self(0);

            pub fn is_valid(self) -> bool {
                self.0 != 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

gpu_handle!(
    /// A linked shader program owned by a graphics device.
    ProgramHandle,
    "program"
);
gpu_handle!(
    /// A vertex or index buffer owned by a graphics device.
    BufferHandle,
    "buffer"
);
gpu_handle!(
    /// A vertex-array object: a vertex buffer, an index buffer and the
    /// attribute layouts configured against them.
    VertexArrayHandle,
    "vao"
);
gpu_handle!(
    /// A sampled 2D texture owned by a graphics device.
    TextureHandle,
    "texture"
);
