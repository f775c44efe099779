/// Implements [`Pack`](super::Pack), [`Unpack`](super::Unpack) and
/// `TryFrom<u32>` for a `#[repr(u32)]` enum with unit variants.
macro_rules! xdr_enum {
    ($name:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::xdr_codec::Pack for $name {
            fn packed_size(&self) -> usize {
                4
            }

            fn pack(
                &self,
                out: &mut impl ::std::io::Write,
            ) -> $crate::xdr_codec::Result<usize> {
                $crate::xdr_codec::Pack::pack(&(*self as u32), out)
            }
        }

        impl $crate::xdr_codec::Unpack for $name {
            fn unpack(
                input: &mut impl ::std::io::Read,
            ) -> $crate::xdr_codec::Result<(Self, usize)> {
                let (value, bytes_read) = <u32 as $crate::xdr_codec::Unpack>::unpack(input)?;
                Ok((Self::try_from(value)?, bytes_read))
            }
        }

        impl ::std::convert::TryFrom<u32> for $name {
            type Error = $crate::xdr_codec::Error;

            fn try_from(value: u32) -> Result<Self, Self::Error> {
                match value {
                    $(v if v == Self::$variant as u32 => Ok(Self::$variant),)+
                    _ => Err($crate::xdr_codec::Error::InvalidEnumValue(value)),
                }
            }
        }
    };
}

pub(crate) use xdr_enum;
