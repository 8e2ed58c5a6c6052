//! 协议解码与输出格式化

pub mod common;
pub mod decode;
pub mod dns;
pub mod render;

pub use common::{DecodedLayer, DnsKind, DnsLayer, LayerKind};
pub use decode::{DecodedFrame, Decoder};
