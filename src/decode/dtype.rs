use num_traits::AsPrimitive;

use crate::descriptor::DataType;

/// A value type that can be read from the little endian bytes of a frame.
pub trait Primitive: Copy + AsPrimitive<f32> + AsPrimitive<f64> {
    const SIZE: usize;
    fn from_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_primitive {
    ($t:ty) => {
        impl Primitive for $t {
            const SIZE: usize = std::mem::size_of::<$t>();
            fn from_le(bytes: &[u8]) -> Self {
                <$t>::from_le_bytes(bytes.try_into().expect("called with SIZE bytes"))
            }
        }
    };
}

impl_primitive!(i8);
impl_primitive!(u8);
impl_primitive!(i16);
impl_primitive!(u16);
impl_primitive!(i32);
impl_primitive!(u32);
impl_primitive!(f32);
impl_primitive!(f64);

fn extend<T: Primitive>(values: &mut Vec<T>, bytes: &[u8]) {
    values.extend(bytes.chunks_exact(T::SIZE).map(T::from_le));
}

/// Sign extend a packed 3 byte little endian integer
fn int24(bytes: &[u8]) -> i32 {
    let fill = if bytes[2] & 0x80 == 0 { 0x00 } else { 0xFF };
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], fill])
}

/// Decoded values of one chunk, laid out row major (sample after sample).
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    /// Also holds widened 24 bit integers
    I32(Vec<i32>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! for_each_variant {
    ($values:expr, $v:ident => $body:expr) => {
        match $values {
            Values::I8($v) => $body,
            Values::U8($v) => $body,
            Values::I16($v) => $body,
            Values::I32($v) => $body,
            Values::U16($v) => $body,
            Values::U32($v) => $body,
            Values::F32($v) => $body,
            Values::F64($v) => $body,
        }
    };
}

impl Values {
    pub(crate) fn with_capacity(data_type: DataType, capacity: usize) -> Self {
        match data_type {
            DataType::Int8 => Values::I8(Vec::with_capacity(capacity)),
            DataType::UInt8 => Values::U8(Vec::with_capacity(capacity)),
            DataType::Int16 => Values::I16(Vec::with_capacity(capacity)),
            DataType::UInt16 => Values::U16(Vec::with_capacity(capacity)),
            DataType::Int24 | DataType::Int32 => Values::I32(Vec::with_capacity(capacity)),
            DataType::UInt32 => Values::U32(Vec::with_capacity(capacity)),
            DataType::Float32 => Values::F32(Vec::with_capacity(capacity)),
            DataType::Float64 => Values::F64(Vec::with_capacity(capacity)),
        }
    }

    /// Decode and append all values in `bytes`. Its length must be a
    /// multiple of the datatype size.
    pub(crate) fn extend_from_le(&mut self, data_type: DataType, bytes: &[u8]) {
        debug_assert_eq!(bytes.len() % data_type.size(), 0);
        match (self, data_type) {
            (Values::I8(v), DataType::Int8) => extend(v, bytes),
            (Values::U8(v), DataType::UInt8) => extend(v, bytes),
            (Values::I16(v), DataType::Int16) => extend(v, bytes),
            (Values::U16(v), DataType::UInt16) => extend(v, bytes),
            (Values::I32(v), DataType::Int24) => v.extend(bytes.chunks_exact(3).map(int24)),
            (Values::I32(v), DataType::Int32) => extend(v, bytes),
            (Values::U32(v), DataType::UInt32) => extend(v, bytes),
            (Values::F32(v), DataType::Float32) => extend(v, bytes),
            (Values::F64(v), DataType::Float64) => extend(v, bytes),
            (values, data_type) => {
                unreachable!("values {values:?} created for another type then {data_type:?}")
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        for_each_variant!(self, v => v.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        for_each_variant!(self, v => v.get(index).map(|x| AsPrimitive::<f64>::as_(*x)))
    }

    /// Keep only the runs of `width` values whose flag is set
    pub(crate) fn retain_rows(&mut self, width: usize, keep: &[bool]) {
        for_each_variant!(self, v => {
            let mut row = 0;
            let mut i = 0;
            v.retain(|_| {
                let kept = keep[row];
                i += 1;
                if i == width {
                    i = 0;
                    row += 1;
                }
                kept
            });
        })
    }

    /// Convert to `f32` and multiply each value by the factor for its
    /// column. Reuses the allocation if the values already are `f32`.
    pub(crate) fn scale(self, factors: &[f32]) -> Vec<f32> {
        fn convert<T: Primitive>(values: Vec<T>, factors: &[f32]) -> Vec<f32> {
            values
                .iter()
                .zip(factors.iter().cycle())
                .map(|(x, factor)| AsPrimitive::<f32>::as_(*x) * factor)
                .collect()
        }

        match self {
            Values::F32(mut v) => {
                for (x, factor) in v.iter_mut().zip(factors.iter().cycle()) {
                    *x *= factor;
                }
                v
            }
            Values::I8(v) => convert(v, factors),
            Values::U8(v) => convert(v, factors),
            Values::I16(v) => convert(v, factors),
            Values::I32(v) => convert(v, factors),
            Values::U16(v) => convert(v, factors),
            Values::U32(v) => convert(v, factors),
            Values::F64(v) => convert(v, factors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int24_sign_extension() {
        let bytes = [0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x00, 0x00, 0x00, 0x80, 0xFF, 0xFF, 0x7F];
        let mut values = Values::with_capacity(DataType::Int24, 4);
        values.extend_from_le(DataType::Int24, &bytes);
        assert_eq!(values, Values::I32(vec![-1, 1, -8_388_608, 8_388_607]));
    }

    #[test]
    fn little_endian_floats() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-2.25f32).to_le_bytes());
        let mut values = Values::with_capacity(DataType::Float32, 2);
        values.extend_from_le(DataType::Float32, &bytes);
        assert_eq!(values, Values::F32(vec![1.5, -2.25]));
    }

    #[test]
    fn retain_whole_rows() {
        let mut values = Values::I16(vec![1, 2, 3, 4, 5, 6]);
        values.retain_rows(2, &[true, false, true]);
        assert_eq!(values, Values::I16(vec![1, 2, 5, 6]));
    }

    #[test]
    fn scale_per_column() {
        let values = Values::I16(vec![2, 4, -2, 8]);
        assert_eq!(values.scale(&[0.5, 2.0]), vec![1.0, 8.0, -1.0, 16.0]);
    }
}
