//! Reading the generic values produced by LLVM's execution engines.
//!
//! LLVM's C API passes the results of running code around as an opaque
//! `LLVMGenericValueRef`. What such a handle contains depends on the return
//! type of the code that produced it, and the handle itself doesn't record
//! this type. This module provides a read-only view over such handles, and a
//! typed wrapper for when the type _is_ known.
use crate::error::Error;
use crate::layout::{BoxedString, STRING_DATA_OFFSET};
use llvm_sys_170::core::{LLVMDoubleType, LLVMFloatType, LLVMIntType};
use llvm_sys_170::execution_engine::{
    LLVMCreateGenericValueOfFloat, LLVMCreateGenericValueOfInt,
    LLVMCreateGenericValueOfPointer, LLVMDisposeGenericValue,
    LLVMGenericValueIntWidth, LLVMGenericValueRef, LLVMGenericValueToFloat,
    LLVMGenericValueToInt, LLVMGenericValueToPointer,
};
use llvm_sys_170::prelude::LLVMTypeRef;
use log::debug;
use std::ffi::{c_char, c_void, CStr};
use std::fmt;
use std::marker::PhantomData;
use std::mem::forget;

/// The type of data stored in a generic value.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Kind {
    Int,
    Float,
    Double,
    Pointer,

    /// A pointer to a boxed string object.
    String,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Kind::Int => write!(f, "Int"),
            Kind::Float => write!(f, "Float"),
            Kind::Double => write!(f, "Double"),
            Kind::Pointer => write!(f, "Pointer"),
            Kind::String => write!(f, "String"),
        }
    }
}

/// The width of a floating point value, used to decide how LLVM decodes the
/// value stored in a generic value.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FloatWidth {
    Single,
    Double,
}

impl FloatWidth {
    /// Returns the LLVM type used as the width selector.
    ///
    /// These types belong to LLVM's global context.
    fn type_ref(self) -> LLVMTypeRef {
        unsafe {
            match self {
                FloatWidth::Single => LLVMFloatType(),
                FloatWidth::Double => LLVMDoubleType(),
            }
        }
    }
}

/// An owned generic value, disposed of when dropped.
#[derive(Debug)]
pub struct GenericValue {
    handle: LLVMGenericValueRef,
}

impl GenericValue {
    /// Takes ownership of a raw handle.
    ///
    /// The handle must be valid and not be disposed of by anything else.
    pub unsafe fn from_raw(handle: LLVMGenericValueRef) -> GenericValue {
        GenericValue { handle }
    }

    pub fn of_pointer(pointer: *mut c_void) -> GenericValue {
        let handle = unsafe { LLVMCreateGenericValueOfPointer(pointer) };

        GenericValue { handle }
    }

    pub fn of_f64(value: f64) -> GenericValue {
        let typ = FloatWidth::Double.type_ref();

        GenericValue {
            handle: unsafe { LLVMCreateGenericValueOfFloat(typ, value) },
        }
    }

    pub fn of_f32(value: f32) -> GenericValue {
        GenericValue {
            handle: unsafe {
                LLVMCreateGenericValueOfFloat(
                    FloatWidth::Single.type_ref(),
                    value as f64,
                )
            },
        }
    }

    /// Returns a generic value for an integer of `width` bits.
    pub fn of_int(width: u32, value: u64, signed: bool) -> GenericValue {
        GenericValue {
            handle: unsafe {
                LLVMCreateGenericValueOfInt(
                    LLVMIntType(width),
                    value,
                    signed as _,
                )
            },
        }
    }

    pub fn view(&self) -> GenericValueView<'_> {
        GenericValueView { handle: self.handle, _owner: PhantomData }
    }

    pub fn as_raw(&self) -> LLVMGenericValueRef {
        self.handle
    }

    /// Returns the raw handle, without disposing of it.
    pub fn into_raw(self) -> LLVMGenericValueRef {
        let handle = self.handle;

        forget(self);
        handle
    }
}

impl Drop for GenericValue {
    fn drop(&mut self) {
        unsafe { LLVMDisposeGenericValue(self.handle) };
    }
}

/// A read-only view of a generic value.
///
/// A view doesn't own the handle it wraps, nor any of the memory the handle
/// points to. This is the only place where the contents of a generic value are
/// reinterpreted, so any offset calculations on such values belong here.
#[derive(Copy, Clone, Debug)]
pub struct GenericValueView<'a> {
    handle: LLVMGenericValueRef,
    _owner: PhantomData<&'a GenericValue>,
}

impl<'a> GenericValueView<'a> {
    /// Returns a view of a handle owned by something else, such as an
    /// execution engine.
    ///
    /// The handle must stay valid for as long as the view is in use.
    pub unsafe fn from_raw(
        handle: LLVMGenericValueRef,
    ) -> GenericValueView<'a> {
        GenericValueView { handle, _owner: PhantomData }
    }

    /// Reads the value as a pointer to a boxed string, returning its bytes
    /// without the trailing NULL byte.
    ///
    /// The first word of the value is the address of the boxed string object.
    /// The bytes start right after the object's length header and continue up
    /// to the first NULL byte.
    ///
    /// The value must point to a boxed string that outlives the returned
    /// `CStr`. No checks are performed: calling this on any other kind of
    /// value reads arbitrary memory.
    pub unsafe fn read_c_str(&self) -> &'a CStr {
        let object = LLVMGenericValueToPointer(self.handle) as *const u8;

        CStr::from_ptr(object.add(STRING_DATA_OFFSET) as *const c_char)
    }

    /// Reads the value as a boxed string.
    ///
    /// Invalid UTF-8 sequences are replaced with `U+FFFD REPLACEMENT
    /// CHARACTER`. The same requirements as `read_c_str()` apply.
    pub unsafe fn read_string(&self) -> String {
        self.read_c_str().to_string_lossy().into_owned()
    }

    /// Reads the value as a 64 bits float.
    pub fn to_f64(&self) -> f64 {
        self.to_float(FloatWidth::Double)
    }

    /// Reads the value as a float of the given width, widened to a 64 bits
    /// float.
    pub fn to_float(&self, width: FloatWidth) -> f64 {
        unsafe { LLVMGenericValueToFloat(width.type_ref(), self.handle) }
    }

    pub fn to_int(&self, signed: bool) -> u64 {
        unsafe { LLVMGenericValueToInt(self.handle, signed as _) }
    }

    /// Returns the number of bits of an integer value.
    pub fn int_width(&self) -> u32 {
        unsafe { LLVMGenericValueIntWidth(self.handle) }
    }

    pub fn to_pointer(&self) -> *mut c_void {
        unsafe { LLVMGenericValueToPointer(self.handle) }
    }
}

/// A generic value along with the kind of data it stores.
///
/// The lifetime `'a` is that of the memory the value may point to, such as a
/// `BoxedString` or the global data of an execution engine.
#[derive(Debug)]
pub struct TypedValue<'a> {
    value: GenericValue,
    kind: Kind,
    _source: PhantomData<&'a ()>,
}

impl<'a> TypedValue<'a> {
    /// Returns a typed value for a generic value of the given kind.
    ///
    /// The kind must match the data stored in the value, and any memory the
    /// value points to must remain valid for the lifetime `'a`.
    pub unsafe fn new(value: GenericValue, kind: Kind) -> TypedValue<'a> {
        TypedValue { value, kind, _source: PhantomData }
    }

    pub fn of_string(string: &'a BoxedString) -> TypedValue<'a> {
        let value = GenericValue::of_pointer(string.as_ptr() as *mut c_void);

        unsafe { TypedValue::new(value, Kind::String) }
    }

    pub fn of_pointer(pointer: *mut c_void) -> TypedValue<'a> {
        let value = GenericValue::of_pointer(pointer);

        unsafe { TypedValue::new(value, Kind::Pointer) }
    }

    pub fn of_f64(value: f64) -> TypedValue<'a> {
        unsafe { TypedValue::new(GenericValue::of_f64(value), Kind::Double) }
    }

    pub fn of_f32(value: f32) -> TypedValue<'a> {
        unsafe { TypedValue::new(GenericValue::of_f32(value), Kind::Float) }
    }

    pub fn of_int(width: u32, value: u64, signed: bool) -> TypedValue<'a> {
        let value = GenericValue::of_int(width, value, signed);

        unsafe { TypedValue::new(value, Kind::Int) }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn view(&self) -> GenericValueView<'_> {
        self.value.view()
    }

    pub fn into_value(self) -> GenericValue {
        self.value
    }

    /// Reads the value as a boxed string.
    pub fn string(&self) -> Result<String, Error> {
        self.expect(Kind::String)?;

        let view = self.view();

        if view.to_pointer().is_null() {
            return Err(Error::NullPointer);
        }

        let bytes = unsafe { view.read_c_str() };

        Ok(bytes.to_str()?.to_string())
    }

    /// Reads the value as a float, widening single precision floats.
    pub fn double(&self) -> Result<f64, Error> {
        match self.kind {
            Kind::Double => Ok(self.view().to_f64()),
            Kind::Float => Ok(self.view().to_float(FloatWidth::Single)),
            found => Err(self.mismatch(Kind::Double, found)),
        }
    }

    pub fn int(&self, signed: bool) -> Result<u64, Error> {
        self.expect(Kind::Int)?;
        Ok(self.view().to_int(signed))
    }

    /// Returns the pointer stored in the value.
    ///
    /// Strings are pointers too, so this also returns the address of a boxed
    /// string object.
    pub fn pointer(&self) -> Result<*mut c_void, Error> {
        match self.kind {
            Kind::Pointer | Kind::String => Ok(self.view().to_pointer()),
            found => Err(self.mismatch(Kind::Pointer, found)),
        }
    }

    fn expect(&self, kind: Kind) -> Result<(), Error> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(self.mismatch(kind, self.kind))
        }
    }

    fn mismatch(&self, expected: Kind, found: Kind) -> Error {
        debug!("can't read a {} value as a {}", found, expected);
        Error::WrongKind { expected, found }
    }
}
