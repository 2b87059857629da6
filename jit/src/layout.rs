//! The memory layout of boxed string objects.
//!
//! Generated code stores strings as a single heap object: a 32 bits length
//! header, immediately followed by the bytes of the string and a trailing NULL
//! byte. In LLVM terms a string of N bytes has the type `{ i32, [N+1 x i8] }`.
//!
//! The offset of the bytes is part of the ABI shared with generated code. If
//! the header ever changes, `STRING_DATA_OFFSET` and the tests in this module
//! (and those of the JIT engine) must be updated accordingly.
use crate::error::Error;
use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::mem::{align_of, size_of};
use std::ptr::{copy_nonoverlapping, NonNull};
use std::slice;

const NULL_BYTE: u8 = 0;

/// The offset (in bytes) of the first byte of a boxed string, relative to the
/// start of the object.
pub const STRING_DATA_OFFSET: usize = 4;

/// The header that precedes the bytes of a boxed string.
#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BoxedStringHeader {
    /// The number of bytes in the string, excluding the NULL byte.
    pub length: i32,
}

/// A string allocated using the boxed string layout.
///
/// A `BoxedString` is what generated code expects to receive when a string is
/// passed by pointer, and what it produces when returning one. The object is
/// owned by this type and released when it's dropped, so any pointers handed
/// out must not outlive it.
pub struct BoxedString {
    ptr: NonNull<u8>,
    length: usize,
    layout: Layout,
}

impl BoxedString {
    pub fn new(value: &str) -> Result<BoxedString, Error> {
        Self::from_bytes(value.as_bytes())
    }

    /// Allocates a boxed string containing a copy of the given bytes.
    ///
    /// The bytes are copied as-is. Reading the string back through a NULL
    /// terminated reader stops at the first NULL byte, should the input
    /// contain any.
    pub fn from_bytes(bytes: &[u8]) -> Result<BoxedString, Error> {
        let length = bytes.len();
        let header =
            i32::try_from(length).map_err(|_| Error::TooLarge(length))?;
        let layout = Self::layout(length)?;

        unsafe {
            let raw = alloc(layout);
            let ptr = NonNull::new(raw)
                .unwrap_or_else(|| handle_alloc_error(layout));
            let data = raw.add(STRING_DATA_OFFSET);

            (raw as *mut BoxedStringHeader)
                .write(BoxedStringHeader { length: header });
            copy_nonoverlapping(bytes.as_ptr(), data, length);
            data.add(length).write(NULL_BYTE);

            Ok(BoxedString { ptr, length, layout })
        }
    }

    /// Returns the number of bytes, excluding the NULL byte.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the header as stored in the object.
    pub fn header(&self) -> BoxedStringHeader {
        unsafe { *(self.ptr.as_ptr() as *const BoxedStringHeader) }
    }

    /// Returns the bytes of the string, without the NULL byte.
    pub fn as_bytes(&self) -> &[u8] {
        unsafe {
            slice::from_raw_parts(
                self.ptr.as_ptr().add(STRING_DATA_OFFSET),
                self.length,
            )
        }
    }

    /// Returns a pointer to the start of the object (i.e. its header).
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn layout(length: usize) -> Result<Layout, Error> {
        STRING_DATA_OFFSET
            .checked_add(length)
            .and_then(|size| size.checked_add(1))
            .and_then(|size| {
                let align = align_of::<BoxedStringHeader>();

                Layout::from_size_align(size, align).ok()
            })
            .ok_or(Error::TooLarge(length))
    }
}

impl Drop for BoxedString {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

const _: () = assert!(size_of::<BoxedStringHeader>() == STRING_DATA_OFFSET);
