pub mod file_header;
pub mod matrix;
pub mod row;

pub use file_header::{FileHeader, FileHeaderBuilder, FirstStripInfo};
pub use matrix::BitMatrix;
pub use row::{DecodedRow, DibitRow, GroupedRow, Pattern, PatternLine};
