pub mod calibrate;
pub mod dskinfo;
pub mod grid;
pub mod import;
pub mod labels;
pub mod mosaic;
