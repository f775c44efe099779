//! XDR (RFC 4506) encoding and decoding.
//!
//! Everything on the wire is big-endian and padded to a 4-byte boundary.
//! Types implement [`Pack`] and [`Unpack`] by hand; both report the number of
//! bytes they consumed or produced so composite types can account for
//! themselves exactly.

pub(crate) mod enums;
pub(crate) mod error;
pub(crate) mod opaque;
pub(crate) mod primitives;
pub(crate) mod traits;
pub(crate) mod util;
pub(crate) mod void;

pub use self::error::Error;
pub use self::opaque::Opaque;
pub use self::traits::{Pack, Unpack};
pub use self::util::{add_padding, get_padding, zero_padding};
pub use self::void::Void;

pub type Result<T, E = Error> = std::result::Result<T, E>;
