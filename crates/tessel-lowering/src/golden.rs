//! Golden tensors: reference values of intermediate or final results that are embedded in a binary so that the
//! runtime can check its own results against them.

use half::{bf16, f16};
use tessel_ir::DataType;
use tessel_schema as schema;

use crate::descriptors::data_type;
use crate::errors::LoweringError;

/// Element type that golden tensor data can be created from.
pub trait GoldenElement: Copy {
    const DATA_TYPE: DataType;

    /// Appends the little-endian representation of this value to `buffer`.
    fn write_le_bytes(self, buffer: &mut Vec<u8>);
}

macro_rules! golden_element {
    ($($ty:ty => $data_type:ident),* $(,)?) => {
        $(impl GoldenElement for $ty {
            const DATA_TYPE: DataType = DataType::$data_type;

            fn write_le_bytes(self, buffer: &mut Vec<u8>) {
                buffer.extend_from_slice(&self.to_le_bytes());
            }
        })*
    };
}

golden_element!(
    f32 => Float32,
    f16 => Float16,
    bf16 => BFloat16,
    i32 => Int32,
    u32 => UInt32,
    u16 => UInt16,
    u8 => UInt8,
);

/// Dense, row-major reference tensor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GoldenTensor {
    name: String,
    shape: Vec<i64>,
    stride: Vec<i64>,
    data_type: DataType,
    data: Vec<u8>,
}

impl GoldenTensor {
    /// Creates a new [`GoldenTensor`] named `name` from `values`, which are laid out in row-major order and must
    /// contain exactly one value per element of `shape`.
    pub fn new<N: Into<String>, T: GoldenElement>(
        name: N,
        shape: Vec<i64>,
        values: &[T],
    ) -> Result<Self, LoweringError> {
        let name = name.into();
        let expected = shape.iter().try_fold(1usize, |count, &dimension| {
            usize::try_from(dimension).ok().and_then(|dimension| count.checked_mul(dimension))
        });
        if expected != Some(values.len()) {
            return Err(LoweringError::InvalidGoldenTensor {
                name,
                shape,
                length: values.len(),
                expected: expected.unwrap_or_default(),
            });
        }
        let mut data = Vec::with_capacity(values.len() * size_of::<T>());
        for &value in values {
            value.write_le_bytes(&mut data);
        }
        let stride = row_major_strides(&shape);
        Ok(Self { name, shape, stride, data_type: T::DATA_TYPE, data })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[i64] {
        &self.shape
    }

    /// Distance, in elements, between consecutive entries of each dimension.
    pub fn stride(&self) -> &[i64] {
        &self.stride
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Raw little-endian bytes of the tensor values.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn to_record(&self) -> schema::GoldenTensor {
        schema::GoldenTensor {
            name: self.name.clone(),
            shape: self.shape.clone(),
            stride: self.stride.clone(),
            data_type: data_type(self.data_type).into(),
            data: self.data.clone(),
        }
    }
}

fn row_major_strides(shape: &[i64]) -> Vec<i64> {
    let mut strides = vec![1; shape.len()];
    for index in (0..shape.len().saturating_sub(1)).rev() {
        strides[index] = strides[index + 1] * shape[index + 1];
    }
    strides
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_golden_tensor() {
        let tensor = GoldenTensor::new("loss", vec![2, 3], &[1i32, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(tensor.name(), "loss");
        assert_eq!(tensor.stride(), &[3, 1]);
        assert_eq!(tensor.data_type(), DataType::Int32);
        assert_eq!(tensor.data().len(), 24);
        assert_eq!(&tensor.data()[4..8], &[2, 0, 0, 0]);

        let record = tensor.to_record();
        assert_eq!(record.shape, vec![2, 3]);
        assert_eq!(record.stride, vec![3, 1]);
        assert_eq!(record.data_type, schema::DataType::Int32 as i32);
    }

    #[test]
    fn test_half_precision_golden_tensors() {
        let tensor = GoldenTensor::new("half", vec![2], &[f16::from_f32(1.0), f16::from_f32(-2.0)]).unwrap();
        assert_eq!(tensor.data(), &[0x00, 0x3c, 0x00, 0xc0]);
        let tensor = GoldenTensor::new("brain", vec![1], &[bf16::from_f32(1.0)]).unwrap();
        assert_eq!(tensor.data_type(), DataType::BFloat16);
        assert_eq!(tensor.data(), &[0x80, 0x3f]);
    }

    #[test]
    fn test_golden_tensor_strides() {
        assert_eq!(row_major_strides(&[]), Vec::<i64>::new());
        assert_eq!(row_major_strides(&[5]), vec![1]);
        assert_eq!(row_major_strides(&[2, 3, 4]), vec![12, 4, 1]);
        let scalar = GoldenTensor::new("scalar", Vec::new(), &[7.5f32]).unwrap();
        assert_eq!(scalar.data(), &7.5f32.to_le_bytes());
    }

    #[test]
    fn test_golden_tensor_shape_mismatch() {
        assert_eq!(
            GoldenTensor::new("bad", vec![2, 2], &[1u8, 2, 3]),
            Err(LoweringError::InvalidGoldenTensor { name: "bad".into(), shape: vec![2, 2], length: 3, expected: 4 }),
        );
        assert!(matches!(
            GoldenTensor::new("negative", vec![-1], &[1u8]),
            Err(LoweringError::InvalidGoldenTensor { expected: 0, .. }),
        ));
    }
}
