pub mod capture;
pub mod csv;
pub mod text;
