//! Opaque OpenCL handle tokens.
//!
//! The binding never creates, frees, or dereferences OpenCL objects; it
//! only forwards handles between the caller's OpenCL layer and the plugin.
//! Each token is a `#[repr(transparent)]` pointer-width newtype so a slice
//! of tokens has exactly the layout the C ABI expects for a handle array.
//!
//! The tokens are deliberately not `Send`/`Sync`: a plugin handle and the
//! OpenCL objects driven through it belong to one caller thread.

use std::ffi::c_void;

macro_rules! opaque_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        pub struct $name(*mut c_void);

        impl $name {
            /// Wrap a raw handle obtained from the caller's OpenCL layer.
            pub const fn from_raw(ptr: *mut c_void) -> Self {
                Self(ptr)
            }

            /// The null handle.
            pub const fn null() -> Self {
                Self(std::ptr::null_mut())
            }

            /// The raw pointer-width value to hand back to OpenCL.
            pub const fn as_ptr(self) -> *mut c_void {
                self.0
            }

            /// Whether this is the null handle.
            pub fn is_null(self) -> bool {
                self.0.is_null()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::null()
            }
        }
    };
}

opaque_handle! {
    /// An OpenCL context (`cl_context`).
    ClContext
}

opaque_handle! {
    /// An OpenCL device (`cl_device_id`).
    ClDeviceId
}

opaque_handle! {
    /// An OpenCL command queue (`cl_command_queue`).
    ClCommandQueue
}

opaque_handle! {
    /// An OpenCL memory object (`cl_mem`).
    ClMem
}

opaque_handle! {
    /// An OpenCL event (`cl_event`).
    ClEvent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_roundtrip() {
        let ev = ClEvent::null();
        assert!(ev.is_null());
        assert_eq!(ev, ClEvent::default());
    }

    #[test]
    fn test_raw_roundtrip() {
        let raw = 0x1234 as *mut c_void;
        let mem = ClMem::from_raw(raw);
        assert!(!mem.is_null());
        assert_eq!(mem.as_ptr(), raw);
    }

    #[test]
    fn test_token_is_pointer_sized() {
        assert_eq!(
            std::mem::size_of::<ClMem>(),
            std::mem::size_of::<*mut c_void>()
        );
    }
}
