mod hmac;

pub use hmac::HmacSignatureFactory;
