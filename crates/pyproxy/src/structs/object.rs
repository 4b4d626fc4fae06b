use crate::{
    address::Address,
    error::Error,
    layout::{FieldKind, StructKind},
    proxy::{Decode, FieldProxy, PointerProxy, Struct, StructProxy},
    version::{Endianness, Target},
};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Longest type name we are prepared to read.
const MAX_TYPE_NAME: usize = 256;

/// The header of every object, `PyObject`.
pub enum PyObject {}

impl Struct for PyObject {
    const KIND: StructKind = StructKind::PyObject;
}

/// The header of variable-sized objects, `PyVarObject`.
pub enum PyVarObject {}

impl Struct for PyVarObject {
    const KIND: StructKind = StructKind::PyVarObject;
}

/// A type object, `PyTypeObject`.
pub enum PyTypeObject {}

impl Struct for PyTypeObject {
    const KIND: StructKind = StructKind::PyTypeObject;
}

/// A dictionary, `PyDictObject`.
pub enum PyDictObject {}

impl Struct for PyDictObject {
    const KIND: StructKind = StructKind::PyDictObject;
}

bitflags::bitflags! {
    /// The `tp_flags` of a type object.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeFlags: u64 {
        const HEAPTYPE = 1 << 9;
        const BASETYPE = 1 << 10;
        const READY = 1 << 12;
        const READYING = 1 << 13;
        const HAVE_GC = 1 << 14;
        /// Python 2 only.
        const INT_SUBCLASS = 1 << 23;
        const LONG_SUBCLASS = 1 << 24;
        const LIST_SUBCLASS = 1 << 25;
        const TUPLE_SUBCLASS = 1 << 26;
        /// `str` in python 2.
        const BYTES_SUBCLASS = 1 << 27;
        const UNICODE_SUBCLASS = 1 << 28;
        const DICT_SUBCLASS = 1 << 29;
        const BASE_EXC_SUBCLASS = 1 << 30;
        const TYPE_SUBCLASS = 1 << 31;
    }
}

impl Decode for TypeFlags {
    const NAME: &'static str = "type flags";

    fn accepts(kind: FieldKind, size: u64) -> bool {
        u64::accepts(kind, size)
    }

    fn decode(buf: &[u8], _: bool, target: &Target) -> Result<Self, Error> {
        // NB: `tp_flags` is a signed long in python 2, only the bits matter.
        let bits = match target.endianness {
            Endianness::LittleEndian => LittleEndian::read_uint(buf, buf.len()),
            Endianness::BigEndian => BigEndian::read_uint(buf, buf.len()),
        };

        Ok(TypeFlags::from_bits_retain(bits))
    }
}

impl<'a> StructProxy<'a, PyObject> {
    pub fn ob_refcnt(&self) -> Result<FieldProxy<'a, i64>, Error> {
        self.scalar("ob_refcnt")
    }

    pub fn ob_type(&self) -> Result<PointerProxy<'a, PyTypeObject>, Error> {
        self.pointer("ob_type")
    }

    /// Read the name of the type of this object.
    pub fn type_name(&self) -> Result<String, Error> {
        self.ob_type()?.deref()?.name()
    }

    /// Test if the object is a dictionary, or an instance of a subclass of
    /// one.
    pub fn is_dict(&self) -> Result<bool, Error> {
        let flags = self.ob_type()?.deref()?.tp_flags()?.read()?;
        Ok(flags.contains(TypeFlags::DICT_SUBCLASS))
    }
}

impl<'a> StructProxy<'a, PyVarObject> {
    pub fn ob_base(&self) -> Result<StructProxy<'a, PyObject>, Error> {
        self.nested("ob_base")
    }

    pub fn ob_size(&self) -> Result<FieldProxy<'a, i64>, Error> {
        self.scalar("ob_size")
    }
}

impl<'a> StructProxy<'a, PyTypeObject> {
    pub fn ob_base(&self) -> Result<StructProxy<'a, PyVarObject>, Error> {
        self.nested("ob_base")
    }

    pub fn tp_name(&self) -> Result<FieldProxy<'a, Address>, Error> {
        self.raw_pointer("tp_name")
    }

    /// Read the name of the type, following `tp_name`.
    pub fn name(&self) -> Result<String, Error> {
        let address = self.tp_name()?.read()?;

        if address.is_null() {
            return Err(Error::NullPointer(PyTypeObject::KIND));
        }

        self.handle().read_c_string(address, MAX_TYPE_NAME)
    }

    pub fn tp_basicsize(&self) -> Result<FieldProxy<'a, i64>, Error> {
        self.scalar("tp_basicsize")
    }

    pub fn tp_itemsize(&self) -> Result<FieldProxy<'a, i64>, Error> {
        self.scalar("tp_itemsize")
    }

    pub fn tp_flags(&self) -> Result<FieldProxy<'a, TypeFlags>, Error> {
        self.scalar("tp_flags")
    }
}

impl<'a> StructProxy<'a, PyDictObject> {
    pub fn ob_base(&self) -> Result<StructProxy<'a, PyObject>, Error> {
        self.nested("ob_base")
    }

    /// Number of items in the dictionary.
    pub fn ma_used(&self) -> Result<FieldProxy<'a, i64>, Error> {
        self.scalar("ma_used")
    }
}
