pub mod folder;
pub mod natural_order;
pub mod scan;
