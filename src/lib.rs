pub mod checksum;
pub mod codec;
pub mod dma;
pub mod rom;

pub use codec::{Codec, CodecError, CodecId, Registry};
pub use dma::{DmaEntry, DmaTable};
pub use rom::{decompress_file, decompress_rom, dest_capacity};
