pub mod codec;
pub mod crop;
pub mod pdf;
pub mod rotate;
