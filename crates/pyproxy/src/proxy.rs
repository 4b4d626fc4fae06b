//! Typed views over structs living in the memory of another process.
//!
//! Proxies are cheap values: constructing one, or asking it for a field, is
//! address arithmetic and never touches remote memory. Memory is only read
//! when a field is explicitly read, and every read goes to the process since
//! it might have changed since the last time.

use crate::{
    address::{Address, Size},
    error::{Error, LayoutError},
    layout::{FieldKind, FieldLayout, StructKind, StructLayout},
    process_handle::ProcessHandle,
    version::{Endianness, Target},
};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::{
    convert::TryFrom,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    sync::Arc,
};

/// Largest scalar we ever decode.
const MAX_SCALAR: usize = 8;

/// A native struct with a known [StructKind].
pub trait Struct: 'static {
    const KIND: StructKind;
}

/// A value which can be decoded from the bytes of a field.
pub trait Decode: Sized {
    /// Name of the type for diagnostics.
    const NAME: &'static str;

    /// Test if a field of the given kind and size can be decoded into this
    /// type. Values which don't fit are only detected when decoded.
    fn accepts(kind: FieldKind, size: u64) -> bool;

    /// Decode the raw field, `signed` tells if the field is declared as a
    /// signed integer.
    fn decode(buf: &[u8], signed: bool, target: &Target) -> Result<Self, Error>;
}

/// Read an integer of any width, only sign-extending signed fields.
fn read_integer(buf: &[u8], signed: bool, target: &Target) -> i128 {
    let n = buf.len();

    match (target.endianness, signed) {
        (Endianness::LittleEndian, true) => i128::from(LittleEndian::read_int(buf, n)),
        (Endianness::LittleEndian, false) => i128::from(LittleEndian::read_uint(buf, n)),
        (Endianness::BigEndian, true) => i128::from(BigEndian::read_int(buf, n)),
        (Endianness::BigEndian, false) => i128::from(BigEndian::read_uint(buf, n)),
    }
}

macro_rules! decode_int {
    ($($ty:ty),* $(,)?) => {
        $(
        impl Decode for $ty {
            const NAME: &'static str = stringify!($ty);

            fn accepts(kind: FieldKind, size: u64) -> bool {
                match kind {
                    FieldKind::Scalar { .. } => size as usize <= std::mem::size_of::<$ty>(),
                    _ => false,
                }
            }

            fn decode(buf: &[u8], signed: bool, target: &Target) -> Result<Self, Error> {
                let value = read_integer(buf, signed, target);
                <$ty>::try_from(value).map_err(|_| Error::ValueConversion(value, Self::NAME))
            }
        }
        )*
    }
}

decode_int!(u8, u16, u32, u64, i8, i16, i32, i64);

impl Decode for bool {
    const NAME: &'static str = "bool";

    fn accepts(kind: FieldKind, size: u64) -> bool {
        match kind {
            FieldKind::Scalar { .. } => size as usize <= MAX_SCALAR,
            _ => false,
        }
    }

    fn decode(buf: &[u8], _: bool, _: &Target) -> Result<Self, Error> {
        Ok(buf.iter().any(|b| *b != 0))
    }
}

impl Decode for Address {
    const NAME: &'static str = "pointer";

    fn accepts(kind: FieldKind, _: u64) -> bool {
        match kind {
            FieldKind::Pointer(..) => true,
            _ => false,
        }
    }

    fn decode(buf: &[u8], _: bool, target: &Target) -> Result<Self, Error> {
        if buf.len() != target.pointer.size() {
            return Err(Error::ValueConversion(buf.len() as i128, Self::NAME));
        }

        Ok(Address::decode(buf, target.pointer, target.endianness))
    }
}

/// A typed view over one field of one struct instance.
pub struct FieldProxy<'a, T> {
    handle: &'a ProcessHandle,
    address: Address,
    size: usize,
    signed: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T> FieldProxy<'a, T>
where
    T: Decode,
{
    pub(crate) fn new(
        handle: &'a ProcessHandle,
        address: Address,
        size: usize,
        signed: bool,
    ) -> Self {
        Self {
            handle,
            address,
            size,
            signed,
            _marker: PhantomData,
        }
    }

    /// The address of the field.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The size of the field in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Read and decode the current value of the field.
    pub fn read(&self) -> Result<T, Error> {
        let mut buf = [0u8; MAX_SCALAR];

        let buf = match buf.get_mut(..self.size) {
            Some(buf) if !buf.is_empty() => buf,
            _ => return Err(Error::ValueConversion(self.size as i128, T::NAME)),
        };

        self.handle.read_memory(self.address, buf)?;
        T::decode(buf, self.signed, &self.handle.version().target)
    }
}

impl<T> Clone for FieldProxy<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldProxy<'_, T> {}

impl<T> fmt::Debug for FieldProxy<'_, T>
where
    T: Decode,
{
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("FieldProxy")
            .field("type", &T::NAME)
            .field("address", &self.address)
            .field("size", &self.size)
            .field("signed", &self.signed)
            .finish()
    }
}

/// A field holding the address of a struct of kind `S`.
pub struct PointerProxy<'a, S> {
    field: FieldProxy<'a, Address>,
    _marker: PhantomData<fn() -> S>,
}

impl<'a, S> PointerProxy<'a, S>
where
    S: Struct,
{
    /// Construct a proxy for a pointer stored at `address`.
    ///
    /// This doesn't read any memory.
    pub fn at(handle: &'a ProcessHandle, address: Address) -> Self {
        let size = handle.version().target.pointer.size();
        Self::from_field(FieldProxy::new(handle, address, size, false))
    }

    fn from_field(field: FieldProxy<'a, Address>) -> Self {
        Self {
            field,
            _marker: PhantomData,
        }
    }

    /// The address the pointer itself is stored at.
    pub fn address(&self) -> Address {
        self.field.address()
    }

    /// Read the address the pointer currently points to.
    pub fn read(&self) -> Result<Address, Error> {
        self.field.read()
    }

    /// Test if the pointer is currently null.
    pub fn is_null(&self) -> Result<bool, Error> {
        Ok(self.read()?.is_null())
    }

    /// Read the pointer and construct a proxy for what it points to.
    ///
    /// A null pointer is not an error, it results in `None`.
    pub fn try_deref(&self) -> Result<Option<StructProxy<'a, S>>, Error> {
        let address = self.read()?;

        if address.is_null() {
            return Ok(None);
        }

        Ok(Some(StructProxy::new(self.field.handle, address)))
    }

    /// Read the pointer and construct a proxy for what it points to, failing
    /// if it is null.
    pub fn deref(&self) -> Result<StructProxy<'a, S>, Error> {
        self.try_deref()?.ok_or_else(|| Error::NullPointer(S::KIND))
    }
}

impl<S> Clone for PointerProxy<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for PointerProxy<'_, S> {}

impl<S> fmt::Debug for PointerProxy<'_, S>
where
    S: Struct,
{
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "PointerProxy<{}>({})", S::KIND, self.field.address)
    }
}

impl<S> PartialEq for PointerProxy<'_, S> {
    fn eq(&self, other: &Self) -> bool {
        self.field.handle.id() == other.field.handle.id()
            && self.field.address == other.field.address
    }
}

impl<S> Eq for PointerProxy<'_, S> {}

/// A typed view over a struct of kind `S` at a fixed address.
///
/// Multiple proxies may refer to the same struct. Two proxies are equal if
/// they refer to the same address in the same process.
pub struct StructProxy<'a, S> {
    handle: &'a ProcessHandle,
    address: Address,
    _marker: PhantomData<fn() -> S>,
}

impl<'a, S> StructProxy<'a, S>
where
    S: Struct,
{
    /// Construct a new proxy. This doesn't read any memory.
    pub fn new(handle: &'a ProcessHandle, address: Address) -> Self {
        Self {
            handle,
            address,
            _marker: PhantomData,
        }
    }

    /// Construct a new proxy, refusing null addresses.
    pub fn non_null(handle: &'a ProcessHandle, address: Address) -> Result<Self, Error> {
        if address.is_null() {
            return Err(Error::NullPointer(S::KIND));
        }

        Ok(Self::new(handle, address))
    }

    /// The kind of struct proxied.
    pub fn kind(&self) -> StructKind {
        S::KIND
    }

    /// The base address of the struct.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The process the struct lives in.
    pub fn handle(&self) -> &'a ProcessHandle {
        self.handle
    }

    /// The layout of the struct.
    pub fn layout(&self) -> Result<Arc<StructLayout>, Error> {
        self.handle.layout(S::KIND)
    }

    /// Resolve a field and its absolute address.
    fn locate(&self, name: &str) -> Result<(FieldLayout, Address), Error> {
        let field = self.handle.resolve_field(S::KIND, name)?;
        let address = self.address.add(Size::new(field.offset))?;
        Ok((field, address))
    }

    /// Access a scalar field.
    pub fn scalar<T>(&self, name: &str) -> Result<FieldProxy<'a, T>, Error>
    where
        T: Decode,
    {
        let (field, address) = self.locate(name)?;

        if !T::accepts(field.kind, field.size) {
            // NB: a zero-sized probe tells kind mismatches apart from width ones.
            let error = if T::accepts(field.kind, 0) {
                LayoutError::FieldWidth {
                    kind: S::KIND,
                    field: name.to_string(),
                    size: field.size,
                    ty: T::NAME,
                }
            } else {
                LayoutError::FieldKind {
                    kind: S::KIND,
                    field: name.to_string(),
                    expected: T::NAME,
                    actual: field.kind,
                }
            };

            return Err(error.into());
        }

        let signed = match field.kind {
            FieldKind::Scalar { signed } => signed,
            _ => false,
        };

        Ok(FieldProxy::new(
            self.handle,
            address,
            field.size as usize,
            signed,
        ))
    }

    /// Access a pointer field pointing to a struct of kind `P`.
    ///
    /// Opaque pointer fields may be viewed as pointing to anything.
    pub fn pointer<P>(&self, name: &str) -> Result<PointerProxy<'a, P>, Error>
    where
        P: Struct,
    {
        let (field, address) = self.locate(name)?;

        match field.kind {
            FieldKind::Pointer(Some(kind)) if kind == P::KIND => (),
            FieldKind::Pointer(None) => (),
            kind => {
                return Err(LayoutError::FieldKind {
                    kind: S::KIND,
                    field: name.to_string(),
                    expected: "pointer",
                    actual: kind,
                }
                .into())
            }
        }

        Ok(PointerProxy::from_field(FieldProxy::new(
            self.handle,
            address,
            field.size as usize,
            false,
        )))
    }

    /// Access a pointer field as a raw address, whatever it points to.
    pub fn raw_pointer(&self, name: &str) -> Result<FieldProxy<'a, Address>, Error> {
        self.scalar::<Address>(name)
    }

    /// Access a struct embedded by value.
    pub fn nested<N>(&self, name: &str) -> Result<StructProxy<'a, N>, Error>
    where
        N: Struct,
    {
        let (field, address) = self.locate(name)?;

        match field.kind {
            FieldKind::Struct(kind) if kind == N::KIND => (),
            kind => {
                return Err(LayoutError::FieldKind {
                    kind: S::KIND,
                    field: name.to_string(),
                    expected: "struct",
                    actual: kind,
                }
                .into())
            }
        }

        Ok(StructProxy::new(self.handle, address))
    }

    /// Reinterpret the struct as another kind of struct at the same address,
    /// like viewing any object through its `PyObject` header.
    pub fn cast<T>(&self) -> StructProxy<'a, T>
    where
        T: Struct,
    {
        StructProxy::new(self.handle, self.address)
    }
}

impl<S> Clone for StructProxy<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for StructProxy<'_, S> {}

impl<S> PartialEq for StructProxy<'_, S> {
    fn eq(&self, other: &Self) -> bool {
        self.handle.id() == other.handle.id() && self.address == other.address
    }
}

impl<S> Eq for StructProxy<'_, S> {}

impl<S> Hash for StructProxy<'_, S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.id().hash(state);
        self.address.hash(state);
    }
}

impl<S> fmt::Debug for StructProxy<'_, S>
where
    S: Struct,
{
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{} @ {}", S::KIND, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::Decode;
    use crate::{
        error::Error,
        layout::FieldKind,
        version::{Endianness, Target, Width},
        Address,
    };

    #[test]
    fn test_decode_scalars() {
        let le = Target::lp64();
        let be = Target {
            endianness: Endianness::BigEndian,
            ..Target::lp64()
        };

        assert_eq!(0x0102u16, u16::decode(&[0x02, 0x01], false, &le).unwrap());
        assert_eq!(0x0201u16, u16::decode(&[0x02, 0x01], false, &be).unwrap());
        assert_eq!(-1i32, i32::decode(&[0xff; 4], true, &le).unwrap());
        assert_eq!(-1i64, i64::decode(&[0xff; 4], true, &le).unwrap());
        assert_eq!(0xffff_ffffu64, u64::decode(&[0xff; 4], false, &le).unwrap());
        assert!(bool::decode(&[0, 0, 1, 0], false, &le).unwrap());
        assert!(!bool::decode(&[0], true, &le).unwrap());
    }

    #[test]
    fn test_decode_respects_field_sign() {
        let ilp32 = Target::ilp32();

        // unsigned fields are never sign-extended.
        let thread_id = 0xf7a0_0000u32.to_le_bytes();
        assert_eq!(0xf7a0_0000i64, i64::decode(&thread_id, false, &ilp32).unwrap());
        assert_eq!(0xf7a0_0000u32, u32::decode(&thread_id, false, &ilp32).unwrap());
        assert!(matches!(
            i32::decode(&thread_id, false, &ilp32),
            Err(Error::ValueConversion(0xf7a0_0000, "i32"))
        ));
        assert!(matches!(
            i64::decode(&[0xff; 8], false, &ilp32),
            Err(Error::ValueConversion(..))
        ));

        // negative values don't fit unsigned types.
        let depth = (-1i32).to_le_bytes();
        assert_eq!(-1i64, i64::decode(&depth, true, &ilp32).unwrap());
        assert!(matches!(
            u32::decode(&depth, true, &ilp32),
            Err(Error::ValueConversion(-1, "u32"))
        ));
        assert!(matches!(
            u64::decode(&depth, true, &ilp32),
            Err(Error::ValueConversion(-1, "u64"))
        ));
    }

    #[test]
    fn test_decode_address() {
        let ilp32 = Target::ilp32();
        assert_eq!(ilp32.pointer, Width::W32);

        assert_eq!(
            Address::new(0x1000),
            Address::decode(&[0x00, 0x10, 0, 0], ilp32.pointer, ilp32.endianness)
        );
        assert_eq!(
            Address::new(0x1000),
            <Address as Decode>::decode(&[0x00, 0x10, 0, 0], false, &ilp32).unwrap()
        );
        assert!(
            <Address as Decode>::decode(&[0x00, 0x10, 0, 0], false, &Target::lp64()).is_err()
        );
    }

    #[test]
    fn test_accepts() {
        let signed = FieldKind::Scalar { signed: true };
        assert!(u64::accepts(signed, 8));
        assert!(i32::accepts(signed, 4));
        assert!(!i32::accepts(signed, 8));
        assert!(!u64::accepts(FieldKind::Pointer(None), 8));
        assert!(Address::accepts(FieldKind::Pointer(None), 8));
        assert!(!Address::accepts(signed, 8));
    }
}
