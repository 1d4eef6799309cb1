pub mod balanced;
pub mod condensed;
