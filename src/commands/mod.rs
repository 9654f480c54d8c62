pub mod apply;
pub mod data;
pub mod kinds;
pub mod object;
