use crate::errors::{ErrorKind, TagcacheError, TagcacheResult};

// The low 15 bits of the flags select the encoding, bit 15 and up carry
// compression.

/// Raw bytes, no encoding.
pub const FLAG_RAW: u32 = 0;
/// Gob encoded payload.
pub const FLAG_GOB: u32 = 1;
/// JSON encoded payload.
pub const FLAG_JSON: u32 = 1 << 1;
/// Protobuf encoded payload.
pub const FLAG_PROTOBUF: u32 = 1 << 2;
/// Gzip compressed payload.
pub const FLAG_GZIP: u32 = 1 << 15;

const FLAG_ENCODING_MASK: u32 = !0xFFFF_8000;

/// A key and the value stored under it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Item {
    /// The item's key.
    pub key: String,
    /// The raw payload.
    pub value: Vec<u8>,
    /// Encoding and compression bits, see the `FLAG_*` constants.
    pub flags: u32,
    /// Time to live in seconds. Zero means no expiry.
    pub expiration: i32,
}

impl Item {
    /// Creates a raw item.
    pub fn new<K: Into<String>, V: Into<Vec<u8>>>(key: K, value: V) -> Item {
        Item {
            key: key.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    /// Encodes `value` as JSON and marks the item accordingly.
    #[cfg(feature = "json")]
    #[cfg_attr(docsrs, doc(cfg(feature = "json")))]
    pub fn json<K: Into<String>, T: serde::Serialize + ?Sized>(
        key: K,
        value: &T,
    ) -> TagcacheResult<Item> {
        let value = serde_json::to_vec(value).map_err(|err| {
            TagcacheError::from((
                ErrorKind::Decode,
                "cannot encode item as json",
                err.to_string(),
            ))
        })?;
        Ok(Item {
            key: key.into(),
            value,
            flags: FLAG_JSON,
            expiration: 0,
        })
    }

    /// Sets the time to live in seconds.
    pub fn with_expiration(mut self, seconds: i32) -> Item {
        self.expiration = seconds;
        self
    }

    /// Replaces the flag bits.
    pub fn with_flags(mut self, flags: u32) -> Item {
        self.flags = flags;
        self
    }

    /// Returns the encoding bits of the flags.
    pub fn encoding(&self) -> u32 {
        self.flags & FLAG_ENCODING_MASK
    }

    /// Returns true if the payload is gzip compressed.
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_GZIP != 0
    }
}

/// Conversion of a fetched item into a caller side value.
///
/// This is the decode half of the item codec: raw text and raw bytes are
/// always available, structured values go through [`Json`].
///
/// The server keeps no flags, so fetched items always arrive raw. `String`
/// and `Vec<u8>` hand back the stored payload as is, including the quotes
/// of a value written with [`Item::json`]; read those through [`Json`].
pub trait FromItem: Sized {
    /// Decodes `item`.
    fn from_item(item: &Item) -> TagcacheResult<Self>;
}

fn raw_payload(item: &Item) -> TagcacheResult<&[u8]> {
    if item.is_compressed() {
        fail!((
            ErrorKind::Decode,
            "compressed payloads are not supported",
            item.key.clone()
        ));
    }
    match item.encoding() {
        FLAG_RAW | FLAG_JSON => Ok(&item.value),
        FLAG_GOB => fail!((
            ErrorKind::Decode,
            "gob payloads are not supported",
            item.key.clone()
        )),
        FLAG_PROTOBUF => fail!((
            ErrorKind::Decode,
            "protobuf payloads are not supported",
            item.key.clone()
        )),
        other => fail!((
            ErrorKind::Decode,
            "unknown item encoding",
            format!("{} (flags {other:#x})", item.key)
        )),
    }
}

impl FromItem for Item {
    fn from_item(item: &Item) -> TagcacheResult<Self> {
        Ok(item.clone())
    }
}

impl FromItem for Vec<u8> {
    fn from_item(item: &Item) -> TagcacheResult<Self> {
        raw_payload(item).map(<[u8]>::to_vec)
    }
}

impl FromItem for String {
    fn from_item(item: &Item) -> TagcacheResult<Self> {
        let payload = raw_payload(item)?;
        String::from_utf8(payload.to_vec()).map_err(|err| {
            TagcacheError::from((
                ErrorKind::Decode,
                "item value is not valid utf-8",
                format!("{}: {err}", item.key),
            ))
        })
    }
}

/// Decodes a structured value stored as JSON.
///
/// Raw items are parsed as JSON as well, since values written by plain
/// `SET` commands carry no flags.
#[cfg(feature = "json")]
#[cfg_attr(docsrs, doc(cfg(feature = "json")))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Json<T>(pub T);

#[cfg(feature = "json")]
impl<T> Json<T> {
    /// Unwraps the decoded value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

#[cfg(feature = "json")]
impl<T: serde::de::DeserializeOwned> FromItem for Json<T> {
    fn from_item(item: &Item) -> TagcacheResult<Self> {
        let payload = raw_payload(item)?;
        Ok(Json(serde_json::from_slice(payload)?))
    }
}
