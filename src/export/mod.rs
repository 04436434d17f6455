pub mod docx;
pub mod element;
