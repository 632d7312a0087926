use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Inline marker for a handle that is carried in the handle table.
pub const HANDLE_PRESENT: u32 = u32::MAX;

/// Inline marker for an absent nullable handle.
pub const HANDLE_ABSENT: u32 = 0;

/// A raw handle value. The runtime never interprets it; moving the
/// underlying kernel object is the transport's business.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    pub const fn from_raw(raw: u32) -> Handle {
        Handle(raw)
    }

    pub const fn invalid() -> Handle {
        Handle(HANDLE_ABSENT)
    }

    pub const fn raw(&self) -> u32 {
        self.0
    }

    pub const fn is_valid(&self) -> bool {
        self.0 != HANDLE_ABSENT
    }
}

/// Implemented by the marker type generated for each protocol.
pub trait ProtocolMarker {
    /// Fully qualified protocol name, e.g. `demo.geometry.Calculator`.
    const NAME: &'static str;
}

macro_rules! endpoint {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name<P> {
            handle:  Handle,
            _marker: PhantomData<P>,
        }

        impl<P> $name<P> {
            pub fn new(handle: Handle) -> Self {
                $name { handle, _marker: PhantomData }
            }

            pub fn handle(&self) -> &Handle {
                &self.handle
            }

            pub fn into_handle(self) -> Handle {
                self.handle
            }
        }

        impl<P> fmt::Debug for $name<P> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.handle).finish()
            }
        }

        impl<P> Clone for $name<P> {
            fn clone(&self) -> Self {
                $name::new(self.handle.clone())
            }
        }

        impl<P> PartialEq for $name<P> {
            fn eq(&self, other: &Self) -> bool {
                self.handle == other.handle
            }
        }

        impl<P> Eq for $name<P> {}

        impl<P> Hash for $name<P> {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.handle.hash(state)
            }
        }
    };
}

endpoint! {
    /// The client end of a channel speaking protocol `P`.
    ClientEnd
}

endpoint! {
    /// The server end of a channel speaking protocol `P`.
    ServerEnd
}
