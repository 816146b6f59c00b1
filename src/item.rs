use std::mem::size_of;

/// Runtime-side type tag for a fixed-size item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemTag {
    Char,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    Unsigned,
    Long,
    UnsignedLong,
    Float,
    Double,
}

impl ItemTag {
    /// Size in bytes of one item carrying this tag.
    pub fn size(self) -> usize {
        match self {
            ItemTag::Char | ItemTag::UnsignedChar => 1,
            ItemTag::Short | ItemTag::UnsignedShort => 2,
            ItemTag::Int | ItemTag::Unsigned | ItemTag::Float => 4,
            ItemTag::Long | ItemTag::UnsignedLong | ItemTag::Double => 8,
        }
    }
}

/// A fixed-size value stored in a flat binary file.
///
/// The byte size and the runtime tag are resolved at compile time, so callers
/// never pass the tag alongside the generic type. Items are stored in native
/// byte order.
pub trait Item: Copy + Default + Send + Sync + 'static {
    const TAG: ItemTag;
    const SIZE: usize = size_of::<Self>();

    fn write_ne(self, out: &mut [u8]);
    fn read_ne(bytes: &[u8]) -> Self;
}

macro_rules! impl_item {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl Item for $ty {
                const TAG: ItemTag = ItemTag::$tag;

                fn write_ne(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_ne_bytes());
                }

                fn read_ne(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_ne_bytes(raw)
                }
            }
        )*
    };
}

impl_item! {
    i8 => Char,
    u8 => UnsignedChar,
    i16 => Short,
    u16 => UnsignedShort,
    i32 => Int,
    u32 => Unsigned,
    i64 => Long,
    u64 => UnsignedLong,
    f32 => Float,
    f64 => Double,
}

pub fn encode<T: Item>(items: &[T]) -> Vec<u8> {
    let mut bytes = vec![0u8; items.len() * T::SIZE];
    for (item, out) in items.iter().zip(bytes.chunks_exact_mut(T::SIZE)) {
        item.write_ne(out);
    }
    bytes
}

/// Decodes whole items; a trailing partial item is ignored.
pub fn decode<T: Item>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(T::SIZE).map(T::read_ne).collect()
}
