use bytemuck::Pod;

use crate::{Error, Result};

pub(crate) fn compress_tile_data<T: Pod>(source: &[T]) -> Vec<u8> {
    lz4_flex::compress(bytemuck::cast_slice(source))
}

pub(crate) fn decompress_tile_data<T: Pod>(element_count: usize, source: &[u8]) -> Result<Vec<T>> {
    let mut data = vec![T::zeroed(); element_count];
    let data_bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut data);
    let expected = data_bytes.len();

    match lz4_flex::decompress_into(source, data_bytes) {
        Ok(size) if size == expected => Ok(data),
        Ok(size) => Err(Error::Decode(format!(
            "Decompressed tile data size mismatch: expected {expected}, got {size}"
        ))),
        Err(err) => Err(Error::Decode(format!("Failed to decompress tile data: {err}"))),
    }
}
