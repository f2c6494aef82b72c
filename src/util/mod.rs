pub mod iso;
pub mod unicode;
