// Parquet encoding of the combined dataset and decoding of stored or
// engine-produced Parquet files.

mod reader;
mod writer;

pub use reader::decode_parquet;
pub use writer::{encode_parquet, writer_properties, EncodedParquet};
